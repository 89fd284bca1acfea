//! Session state for SLOW clients.
//!
//! This crate holds the bookkeeping of one connection:
//!
//! 1. **Identity** — the peer-issued [`SessionId`](slow_protocol::SessionId)
//! 2. **Sequencing** — local and peer sequence counters
//! 3. **Flow control** — both windows and the bytes still in flight
//! 4. **Persistence** — saving a session so a later process can revive it
//!    ([`store`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Lifecycle (above)  ← drives ConnectionState transitions
//!     ↕
//! Transport          ← admits sends against the window, releases acked bytes
//!     ↕
//! Session (this crate)  ← plain data, passed by `&mut` into every call
//!     ↕
//! Protocol (below)   ← Message, Flags, SessionId
//! ```

mod error;
mod session;
pub mod store;

pub use error::SessionError;
pub use session::{ConnectionState, Session, SessionConfig};
