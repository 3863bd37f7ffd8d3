// Lifecycle state of a synth instance, shared between threads

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Registered, not started yet
    Pending = 0,
    /// Engine built, probing drivers
    Booting = 1,
    Running = 2,
    /// Shutdown requested, client closing
    Waning = 3,
    /// Safe to erase
    Defunct = 4,
}

impl From<u8> for LifecycleState {
    fn from(value: u8) -> Self {
        match value {
            0 => LifecycleState::Pending,
            1 => LifecycleState::Booting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Waning,
            _ => LifecycleState::Defunct,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Booting => "booting",
            LifecycleState::Running => "running",
            LifecycleState::Waning => "waning",
            LifecycleState::Defunct => "defunct",
        };
        f.write_str(name)
    }
}

/// Atomic wrapper pour partager l'état entre threads
#[derive(Clone)]
pub struct AtomicLifecycle {
    inner: Arc<AtomicU8>,
}

impl AtomicLifecycle {
    pub fn new(state: LifecycleState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(state as u8)),
        }
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: LifecycleState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`; false if another thread moved it first
    pub fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.inner
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicLifecycle {
    fn default() -> Self {
        Self::new(LifecycleState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_only_from_expected_state() {
        let state = AtomicLifecycle::default();
        assert!(!state.transition(LifecycleState::Booting, LifecycleState::Running));
        assert!(state.transition(LifecycleState::Pending, LifecycleState::Booting));
        assert_eq!(state.get(), LifecycleState::Booting);

        let shared = state.clone();
        shared.set(LifecycleState::Waning);
        assert_eq!(state.get(), LifecycleState::Waning);
        assert_eq!(LifecycleState::from(42), LifecycleState::Defunct);
    }
}
