// Configuration - persisted settings and the live copy the engine reads
//
// The file lives at <config_dir>/rtsynth/config.ron. The command protocol
// reaches the live values through the config section (0xF8); they are
// written back to disk on shutdown.

use crate::messaging::controls::config as controls;
use crate::params::limits::Limits;
use crate::synth::oscil_gen::{DEFAULT_OSCIL_SIZE, MAX_OSCIL_SIZE, MIN_OSCIL_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use thiserror::Error;

pub const MIN_BUFFER_SIZE: usize = 16;
pub const MAX_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioDriver {
    Jack,
    Alsa,
    /// Timer driven, no sound card
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiDriver {
    Jack,
    Alsa,
    None,
}

impl std::fmt::Display for AudioDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioDriver::Jack => write!(f, "jack"),
            AudioDriver::Alsa => write!(f, "alsa"),
            AudioDriver::None => write!(f, "no"),
        }
    }
}

impl std::fmt::Display for MidiDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MidiDriver::Jack => write!(f, "jack"),
            MidiDriver::Alsa => write!(f, "alsa"),
            MidiDriver::None => write!(f, "no"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio_driver: AudioDriver,
    pub midi_driver: MidiDriver,
    /// Substring of the MIDI input port name, first port when unset
    pub midi_port: Option<String>,
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub oscil_size: usize,
    pub enable_gui: bool,
    pub enable_cli: bool,
    pub enable_auto_instance: bool,
    /// Bit n set = instance n was running at the last shutdown
    pub active_instances: u32,
    /// Ring capacities, in CommandBlocks
    pub cli_capacity: usize,
    pub gui_capacity: usize,
    pub midi_capacity: usize,
    pub reply_capacity: usize,
    /// Blocks applied per audio callback at most
    pub mediate_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_driver: AudioDriver::Alsa,
            midi_driver: MidiDriver::Alsa,
            midi_port: None,
            sample_rate: 48000,
            buffer_size: DEFAULT_BUFFER_SIZE,
            oscil_size: DEFAULT_OSCIL_SIZE,
            enable_gui: false,
            enable_cli: true,
            enable_auto_instance: false,
            active_instances: 1,
            cli_capacity: 1024,
            gui_capacity: 1024,
            midi_capacity: 1024,
            reply_capacity: 1024,
            mediate_budget: 256,
        }
    }
}

impl Config {
    /// `<config_dir>/rtsynth/config.ron`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("rtsynth")
            .join("config.ron")
    }

    /// Read `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Config = ron::from_str(&contents)?;
        Ok(config.sanitized())
    }

    /// Same as `load`, falling back to defaults with a warning
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Config {} unusable ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let pretty = ron::ser::PrettyConfig::default();
        let contents = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Values pulled back into their valid ranges
    pub fn sanitized(mut self) -> Self {
        self.buffer_size = self.buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE);
        self.oscil_size = self.oscil_size.clamp(MIN_OSCIL_SIZE, MAX_OSCIL_SIZE);
        self.sample_rate = self.sample_rate.clamp(8000, 192_000);
        self.cli_capacity = self.cli_capacity.max(1);
        self.gui_capacity = self.gui_capacity.max(1);
        self.midi_capacity = self.midi_capacity.max(1);
        self.reply_capacity = self.reply_capacity.max(1);
        self.mediate_budget = self.mediate_budget.max(1);
        // the primary instance always runs
        self.active_instances |= 1;
        self
    }
}

/// Limits of the config section
pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        controls::OSCILLATOR_SIZE => Limits::int(
            MIN_OSCIL_SIZE as i32,
            MAX_OSCIL_SIZE as i32,
            DEFAULT_OSCIL_SIZE as i32,
        )
        .fixed(),
        controls::BUFFER_SIZE => Limits::int(
            MIN_BUFFER_SIZE as i32,
            MAX_BUFFER_SIZE as i32,
            DEFAULT_BUFFER_SIZE as i32,
        )
        .fixed(),
        controls::ENABLE_GUI => Limits::toggle(false),
        controls::ENABLE_CLI => Limits::toggle(true),
        controls::ENABLE_AUTO_INSTANCE => Limits::toggle(false),
        _ => return None,
    };
    Some(limits)
}

/// Settings shared between an instance's audio side and the control side.
///
/// Atomics only: the audio thread applies config writes without locking.
#[derive(Debug)]
pub struct RuntimeSettings {
    oscil_size: AtomicUsize,
    buffer_size: AtomicUsize,
    enable_gui: AtomicBool,
    enable_cli: AtomicBool,
    enable_auto_instance: AtomicBool,
    active_instances: AtomicU32,
    changed: AtomicBool,
}

impl RuntimeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            oscil_size: AtomicUsize::new(config.oscil_size),
            buffer_size: AtomicUsize::new(config.buffer_size),
            enable_gui: AtomicBool::new(config.enable_gui),
            enable_cli: AtomicBool::new(config.enable_cli),
            enable_auto_instance: AtomicBool::new(config.enable_auto_instance),
            active_instances: AtomicU32::new(config.active_instances),
            changed: AtomicBool::new(false),
        }
    }

    pub fn read(&self, control: u8) -> Option<f32> {
        let value = match control {
            controls::OSCILLATOR_SIZE => self.oscil_size() as f32,
            controls::BUFFER_SIZE => self.buffer_size.load(Ordering::Relaxed) as f32,
            controls::ENABLE_GUI => self.enable_gui.load(Ordering::Relaxed) as u8 as f32,
            controls::ENABLE_CLI => self.enable_cli.load(Ordering::Relaxed) as u8 as f32,
            controls::ENABLE_AUTO_INSTANCE => self.auto_instance() as u8 as f32,
            _ => return None,
        };
        Some(value)
    }

    /// Store an already clamped value; buffer size takes effect on restart
    pub fn apply(&self, control: u8, value: f32) -> bool {
        let flag = value >= 0.5;
        match control {
            controls::OSCILLATOR_SIZE => {
                self.oscil_size.store(value as usize, Ordering::Relaxed)
            }
            controls::BUFFER_SIZE => self.buffer_size.store(value as usize, Ordering::Relaxed),
            controls::ENABLE_GUI => self.enable_gui.store(flag, Ordering::Relaxed),
            controls::ENABLE_CLI => self.enable_cli.store(flag, Ordering::Relaxed),
            controls::ENABLE_AUTO_INSTANCE => {
                self.enable_auto_instance.store(flag, Ordering::Relaxed)
            }
            _ => return false,
        }
        self.mark_changed();
        true
    }

    pub fn oscil_size(&self) -> usize {
        self.oscil_size.load(Ordering::Relaxed)
    }

    pub fn auto_instance(&self) -> bool {
        self.enable_auto_instance.load(Ordering::Relaxed)
    }

    pub fn active_instances(&self) -> u32 {
        self.active_instances.load(Ordering::Relaxed)
    }

    pub fn set_active_instances(&self, bits: u32) {
        self.active_instances.store(bits | 1, Ordering::Relaxed);
    }

    pub fn mark_changed(&self) {
        self.changed.store(true, Ordering::Relaxed);
    }

    pub fn is_changed(&self) -> bool {
        self.changed.load(Ordering::Relaxed)
    }

    /// Copy the live values into `config` for saving
    pub fn store_into(&self, config: &mut Config) {
        config.oscil_size = self.oscil_size();
        config.buffer_size = self.buffer_size.load(Ordering::Relaxed);
        config.enable_gui = self.enable_gui.load(Ordering::Relaxed);
        config.enable_cli = self.enable_cli.load(Ordering::Relaxed);
        config.enable_auto_instance = self.auto_instance();
        config.active_instances = self.active_instances();
    }
}
