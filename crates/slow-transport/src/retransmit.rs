//! The outbound retransmission queue.
//!
//! Every datagram that needs an answer (anything carrying payload, plus
//! CONNECT and REVIVE requests) is kept here, in send order, until a
//! cumulative acknowledgment covers it or it runs out of retries.
//!
//! Only the head of the queue is ever retransmitted. Later entries wait
//! their turn, so retries go out in the same order as the originals.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// One transmitted datagram awaiting acknowledgment.
#[derive(Debug, Clone)]
pub struct PendingSend {
    /// The exact bytes that went on the wire; retries resend them as-is.
    pub raw: Vec<u8>,
    /// Sequence number of the datagram.
    pub seq: u32,
    /// Payload bytes counted in `bytes_in_flight` for this datagram.
    pub payload_size: usize,
    /// Time of the most recent transmission.
    pub sent_at: Instant,
    /// Retransmissions performed so far (the original send is not counted).
    pub attempts: u32,
}

impl PendingSend {
    /// Records a datagram that was just transmitted.
    pub fn new(raw: Vec<u8>, seq: u32, payload_size: usize, sent_at: Instant) -> Self {
        Self {
            raw,
            seq,
            payload_size,
            sent_at,
            attempts: 0,
        }
    }
}

/// A datagram abandoned after reaching the retry ceiling.
///
/// The protocol has no negative acknowledgment, so higher layers only
/// learn about the gap through this report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LostMessage {
    /// Sequence number of the lost datagram.
    pub seq: u32,
    /// Payload bytes released from `bytes_in_flight`.
    pub payload_size: usize,
    /// Retransmissions performed before giving up.
    pub attempts: u32,
}

/// What one retransmission tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was due.
    Idle,
    /// The head entry was sent again.
    Retransmitted {
        /// Sequence number of the resent datagram.
        seq: u32,
        /// Retransmission count after this resend.
        attempt: u32,
    },
    /// The head entry hit the retry ceiling and was dropped.
    Dropped(LostMessage),
}

/// The action due for the head of the queue.
pub(crate) enum Due<'a> {
    /// Resend this entry's bytes, then call [`RetransmitQueue::mark_resent`].
    Resend(&'a PendingSend),
    /// The entry was removed for exceeding the retry ceiling.
    Exhausted(PendingSend),
}

/// FIFO of [`PendingSend`] entries in sequence order.
#[derive(Debug, Default)]
pub struct RetransmitQueue {
    entries: VecDeque<PendingSend>,
}

impl RetransmitQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a freshly transmitted datagram.
    pub fn push(&mut self, entry: PendingSend) {
        self.entries.push_back(entry);
    }

    /// Applies a cumulative acknowledgment: removes every entry with
    /// `seq <= ack` from the front of the queue.
    ///
    /// Returns the total payload size of the removed entries, which the
    /// caller releases from `bytes_in_flight`.
    pub fn acknowledge(&mut self, ack: u32) -> usize {
        let mut released = 0;
        while let Some(head) = self.entries.front() {
            if head.seq > ack {
                break;
            }
            released += head.payload_size;
            self.entries.pop_front();
        }
        released
    }

    /// Decides what, if anything, the head entry needs at `now`.
    ///
    /// - younger than `retry_interval` → `None`
    /// - fewer than `max_tries` retransmissions → [`Due::Resend`]
    /// - otherwise the entry is removed → [`Due::Exhausted`]
    pub(crate) fn due(
        &mut self,
        now: Instant,
        retry_interval: Duration,
        max_tries: u32,
    ) -> Option<Due<'_>> {
        let head = self.entries.front()?;
        if now.saturating_duration_since(head.sent_at) < retry_interval {
            return None;
        }
        if head.attempts >= max_tries {
            return self.entries.pop_front().map(Due::Exhausted);
        }
        self.entries.front().map(Due::Resend)
    }

    /// Records a retransmission of the head entry at `now`.
    ///
    /// Returns the new attempt count.
    pub(crate) fn mark_resent(&mut self, now: Instant) -> u32 {
        match self.entries.front_mut() {
            Some(head) => {
                head.attempts += 1;
                head.sent_at = now;
                head.attempts
            }
            None => 0,
        }
    }

    /// Returns `true` if a datagram with this sequence number is still
    /// awaiting acknowledgment.
    pub fn contains(&self, seq: u32) -> bool {
        self.entries.iter().any(|e| e.seq == seq)
    }

    /// Removes every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    /// Number of entries awaiting acknowledgment.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is awaiting acknowledgment.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The oldest unacknowledged entry.
    pub fn head(&self) -> Option<&PendingSend> {
        self.entries.front()
    }
}
