// rtsynth - Library exports for the binary, tests and benchmarks

pub mod audio;
pub mod config;
pub mod control;
pub mod effects;
pub mod instance;
pub mod interchange;
pub mod messaging;
pub mod midi;
pub mod params;
pub mod synth;

// Re-export commonly used types for convenience
pub use config::{AudioDriver, Config, MidiDriver, RuntimeSettings};
pub use control::ControlContext;
pub use effects::{EffectKind, EffectMgr};
pub use instance::{InstanceError, InstanceManager, LifecycleState, MAX_INSTANCES};
pub use interchange::{ControlHandle, Endpoints, Interchange, SendError, Shared};
pub use messaging::channels::{create_command_channel, create_notification_channel};
pub use messaging::command::{CommandBlock, LimitRequest, Origin};
pub use params::base::{ParamBase, ParamsUpdate};
pub use synth::SynthEngine;
