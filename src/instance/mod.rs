// Module instance - registre des moteurs, cycle de vie et démarrage des clients

pub mod boot;
pub mod manager;
pub mod signals;
pub mod state;

pub use manager::{Instance, InstanceManager};
pub use state::{AtomicLifecycle, LifecycleState};

use thiserror::Error;

/// Concurrent instances per process; ids are `0..MAX_INSTANCES`, 0 is the primary
pub const MAX_INSTANCES: usize = 32;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InstanceError {
    #[error("Instance limit reached ({MAX_INSTANCES} running)")]
    LimitReached,

    #[error("No instance with id {0}")]
    UnknownId(u32),

    #[error("Instance {0} failed to boot")]
    BootFailed(u32),
}
