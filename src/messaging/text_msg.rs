// TextMsgBuffer - bounded string pool addressed by the `miscmsg` byte
//
// A CommandBlock cannot carry text, so strings are parked in a numbered
// slot and the slot number travels in `miscmsg`. Fetching is destructive.
// Empty slots hold an empty string, so an empty message is never stored.
// Every slot keeps its capacity for life: the audio thread pushes and
// fetches without touching the allocator.

use std::sync::{Mutex, TryLockError};
use thiserror::Error;

/// Slot id meaning "no message"
pub const NO_MSG: u8 = 255;

const NUM_SLOTS: usize = NO_MSG as usize;

/// Longest message in bytes; longer text is cut at a char boundary
pub const MAX_MSG_LEN: usize = 128;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TextMsgError {
    #[error("TextMsgBuffer is full")]
    Full,
    #[error("TextMsgBuffer is busy")]
    Busy,
}

pub struct TextMsgBuffer {
    slots: Mutex<Vec<String>>,
}

impl TextMsgBuffer {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(
                (0..NUM_SLOTS)
                    .map(|_| String::with_capacity(MAX_MSG_LEN))
                    .collect(),
            ),
        }
    }

    /// Store `text` and return its slot, `NO_MSG` for an empty string
    pub fn push(&self, text: &str) -> Result<u8, TextMsgError> {
        if text.is_empty() {
            return Ok(NO_MSG);
        }
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = Self::store(&mut slots, text);
        if result.is_err() {
            tracing::warn!("TextMsgBuffer is full");
        }
        result
    }

    /// Non-blocking push for the audio thread; never logs
    pub fn try_push(&self, text: &str) -> Result<u8, TextMsgError> {
        if text.is_empty() {
            return Ok(NO_MSG);
        }
        let mut slots = match self.slots.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(TextMsgError::Busy),
        };
        Self::store(&mut slots, text)
    }

    /// Take the message out of `id`; unknown or `NO_MSG` ids give an empty string
    pub fn fetch(&self, id: u8) -> String {
        if id == NO_MSG {
            return String::new();
        }
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match slots.get_mut(id as usize) {
            Some(slot) => {
                let text = slot.as_str().to_owned();
                slot.clear();
                text
            }
            None => String::new(),
        }
    }

    /// Non-blocking fetch into `dest`, which is cleared first.
    ///
    /// `dest` should have `MAX_MSG_LEN` capacity so nothing is allocated.
    /// Returns false when the pool is busy; `dest` is then left untouched.
    pub fn try_fetch_into(&self, id: u8, dest: &mut String) -> bool {
        if id == NO_MSG {
            dest.clear();
            return true;
        }
        let mut slots = match self.slots.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        dest.clear();
        if let Some(slot) = slots.get_mut(id as usize) {
            dest.push_str(slot);
            slot.clear();
        }
        true
    }

    /// Drop every parked message (leaked ids are reclaimed)
    pub fn clear(&self) {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.iter_mut().for_each(String::clear);
    }

    pub fn in_use(&self) -> usize {
        match self.slots.lock() {
            Ok(slots) => slots.iter().filter(|s| !s.is_empty()).count(),
            Err(poisoned) => poisoned.into_inner().iter().filter(|s| !s.is_empty()).count(),
        }
    }

    fn store(slots: &mut [String], text: &str) -> Result<u8, TextMsgError> {
        match slots.iter_mut().enumerate().find(|(_, s)| s.is_empty()) {
            Some((idx, slot)) => {
                slot.push_str(truncated(text, MAX_MSG_LEN));
                Ok(idx as u8)
            }
            None => Err(TextMsgError::Full),
        }
    }
}

/// Longest prefix of `text` within `max` bytes
fn truncated(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl Default for TextMsgBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_fetch_is_destructive() {
        let pool = TextMsgBuffer::new();
        let id = pool.push("Piano").unwrap();
        assert_ne!(id, NO_MSG);
        assert_eq!(pool.fetch(id), "Piano");
        assert_eq!(pool.fetch(id), "");
    }

    #[test]
    fn test_empty_text_is_no_msg() {
        let pool = TextMsgBuffer::new();
        assert_eq!(pool.push(""), Ok(NO_MSG));
        assert_eq!(pool.fetch(NO_MSG), "");
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_full_pool_is_distinct_from_empty() {
        let pool = TextMsgBuffer::new();
        for n in 0..NUM_SLOTS {
            assert_eq!(pool.push(&format!("msg {}", n)), Ok(n as u8));
        }
        assert_eq!(pool.push("one too many"), Err(TextMsgError::Full));
        assert_eq!(pool.try_push("again"), Err(TextMsgError::Full));

        // Freeing one slot makes room again, at the lowest free id
        assert_eq!(pool.fetch(7), "msg 7");
        assert_eq!(pool.push("reuse"), Ok(7));

        pool.clear();
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_slots_keep_their_capacity() {
        let pool = TextMsgBuffer::new();
        let mut name = String::with_capacity(MAX_MSG_LEN);
        let buffer = name.as_ptr();
        for round in 0..4 {
            let id = pool.try_push("Strings").unwrap();
            assert!(pool.try_fetch_into(id, &mut name));
            assert_eq!(name, "Strings");
            // same slot, same storage
            assert_eq!(pool.try_push("Brass"), Ok(id), "round {}", round);
            assert_eq!(pool.fetch(id), "Brass");
        }
        assert_eq!(name.as_ptr(), buffer);
        assert_eq!(name.capacity(), MAX_MSG_LEN);
        let slots = pool.slots.lock().unwrap();
        assert!(slots.iter().all(|slot| slot.capacity() >= MAX_MSG_LEN));
    }

    #[test]
    fn test_long_text_is_cut() {
        let pool = TextMsgBuffer::new();
        let long = "é".repeat(MAX_MSG_LEN);
        let id = pool.push(&long).unwrap();
        let text = pool.fetch(id);
        assert!(text.len() <= MAX_MSG_LEN);
        assert!(long.starts_with(&text));

        let mut dest = String::with_capacity(MAX_MSG_LEN);
        dest.push_str("old");
        assert!(pool.try_fetch_into(NO_MSG, &mut dest));
        assert!(dest.is_empty());
    }
}
