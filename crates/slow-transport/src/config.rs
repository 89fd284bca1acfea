//! Transport tuning knobs.

use std::time::Duration;

use slow_protocol::MAX_DATA;
use tracing::warn;

/// Configuration for a [`TransportEngine`](crate::TransportEngine).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Largest payload per datagram; larger messages are fragmented.
    /// Capped at [`MAX_DATA`].
    pub max_data: usize,
    /// How long the oldest unacknowledged datagram may wait before it is
    /// sent again.
    pub retry_interval: Duration,
    /// Retransmissions allowed per datagram before it is dropped.
    pub max_tries: u32,
    /// Upper bound on a single `receive` wait.
    pub recv_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_data: MAX_DATA,
            retry_interval: Duration::from_millis(500),
            max_tries: 5,
            recv_timeout: Duration::from_millis(500),
        }
    }
}

impl TransportConfig {
    /// Shortest accepted receive wait.
    pub const MIN_RECV_TIMEOUT: Duration = Duration::from_millis(1);

    /// Clamp any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TransportEngine::new`](crate::TransportEngine::new).
    /// - `max_data` forced into `1..=MAX_DATA`.
    /// - `recv_timeout` raised to [`Self::MIN_RECV_TIMEOUT`]; a zero wait
    ///   would turn `receive` into a busy loop.
    pub fn validated(mut self) -> Self {
        if self.max_data == 0 || self.max_data > MAX_DATA {
            warn!(
                max_data = self.max_data,
                limit = MAX_DATA,
                "max_data out of range, clamping"
            );
            self.max_data = self.max_data.clamp(1, MAX_DATA);
        }
        if self.recv_timeout < Self::MIN_RECV_TIMEOUT {
            warn!(
                recv_timeout_ms = self.recv_timeout.as_secs_f64() * 1000.0,
                "recv_timeout too small, raising to 1 ms"
            );
            self.recv_timeout = Self::MIN_RECV_TIMEOUT;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_protocol_constants() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.max_data, 1440);
        assert_eq!(cfg.retry_interval, Duration::from_millis(500));
        assert_eq!(cfg.max_tries, 5);
        assert_eq!(cfg.recv_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_validated_clamps_max_data() {
        let too_big = TransportConfig {
            max_data: 9000,
            ..TransportConfig::default()
        };
        assert_eq!(too_big.validated().max_data, MAX_DATA);

        let zero = TransportConfig {
            max_data: 0,
            ..TransportConfig::default()
        };
        assert_eq!(zero.validated().max_data, 1);
    }

    #[test]
    fn test_validated_raises_zero_recv_timeout() {
        let cfg = TransportConfig {
            recv_timeout: Duration::ZERO,
            ..TransportConfig::default()
        };
        assert_eq!(cfg.validated().recv_timeout, TransportConfig::MIN_RECV_TIMEOUT);
    }

    #[test]
    fn test_validated_keeps_sane_values() {
        let cfg = TransportConfig {
            max_data: 500,
            retry_interval: Duration::from_millis(20),
            max_tries: 2,
            recv_timeout: Duration::from_millis(20),
        }
        .validated();
        assert_eq!(cfg.max_data, 500);
        assert_eq!(cfg.max_tries, 2);
    }
}
