//! Fragmentation helpers.
//!
//! A payload larger than one datagram is cut into pieces that share a
//! random group id and carry ordinals 0, 1, 2, ... Each piece is sized
//! `min(max_data, remaining, free_window)`, so a narrow peer window yields
//! smaller pieces rather than an overdrawn window.

use rand::Rng;

/// Largest number of pieces one message can be split into; the ordinal is
/// a single byte.
pub(crate) const MAX_FRAGMENTS: usize = u8::MAX as usize + 1;

/// Draws a fresh fragment group id.
///
/// Zero is reserved for unfragmented messages.
pub(crate) fn next_group_id() -> u8 {
    rand::rng().random_range(1..=u8::MAX)
}

/// Largest payload that can be fragmented with pieces of `max_data` bytes.
pub(crate) fn max_message_len(max_data: usize) -> usize {
    max_data * MAX_FRAGMENTS
}

/// Size of the next piece, or 0 if the window is closed or nothing remains.
pub(crate) fn chunk_len(max_data: usize, remaining: usize, free_window: u32) -> usize {
    let free = usize::try_from(free_window).unwrap_or(usize::MAX);
    max_data.min(remaining).min(free)
}
