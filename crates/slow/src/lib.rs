//! # SLOW
//!
//! Client engine for the SLOW protocol: a reliable-message transport over
//! UDP with a 32-byte little-endian header, cumulative acknowledgments, a
//! peer-advertised flow-control window, fragmentation and resumable
//! ("revivable") sessions.
//!
//! The layers, leaves first:
//!
//! - [`slow_protocol`] — the wire codec
//! - [`slow_session`] — per-connection state and persistence
//! - [`slow_transport`] — send / receive / retransmission
//! - this crate — the connect, revive and disconnect exchanges, and the
//!   [`SlowClient`] façade that ties them together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slow::prelude::*;
//!
//! # async fn run() -> Result<(), SlowError> {
//! let mut client = SlowClient::builder()
//!     .remote("127.0.0.1:7033".parse().unwrap())
//!     .build()
//!     .await?;
//!
//! client.establish().await?;
//! client.send(b"hello".to_vec()).await?;
//! while let Some(message) = client.receive().await? {
//!     println!("{} bytes from peer", message.payload.len());
//! }
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod lifecycle;
pub mod telemetry;

pub use client::{ClientConfig, SlowClient, SlowClientBuilder};
pub use error::SlowError;
pub use lifecycle::{REVIVE_ACCEPTANCE, RevivePolicy};

pub use slow_protocol;
pub use slow_session;
pub use slow_transport;

/// Common imports for applications driving a [`SlowClient`].
pub mod prelude {
    pub use crate::{ClientConfig, RevivePolicy, SlowClient, SlowClientBuilder, SlowError};
    pub use slow_protocol::{Flags, Message, SessionId};
    pub use slow_session::{ConnectionState, Session, SessionConfig};
    pub use slow_transport::{SendOutcome, TransportConfig, TransportError};
}
