// Effects - the eight slot effects and the manager that swaps them
//
// Architecture:
// - Effect trait: common interface, shared state lives in EffectCore
// - EffectKind: closed list of effect types, with their preset and limit tables
// - EffectMgr: one slot (system, insertion or part), owns the output buffers
//
// Real-time constraints:
// - `out()` never allocates; delay lines are sized at construction
// - Only the audio thread touches an installed effect

pub mod alienwah;
pub mod chorus;
pub mod core;
pub mod distortion;
pub mod dynamic_filter;
pub mod echo;
pub mod eq;
pub mod lfo;
pub mod manager;
pub mod phaser;
pub mod reverb;

use crate::messaging::command::{CommandBlock, UNUSED};
use crate::messaging::controls::{effect, section};
use crate::params::filter::FilterParams;
use crate::params::limits::Limits;

pub use self::core::{EffectCore, VolumeCurve, unpack_preset};
pub use manager::{DefaultEffectFactory, EffectFactory, EffectMgr};

/// Number of effect types, "none" included
pub const NUM_EFFECT_TYPES: u8 = 9;

/// Control id of the preset selector
pub const PRESET_CONTROL: u8 = effect::PRESET;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Reverb,
    Echo,
    Chorus,
    Phaser,
    Alienwah,
    Distortion,
    Eq,
    DynamicFilter,
}

impl EffectKind {
    pub const ALL: [EffectKind; 8] = [
        EffectKind::Reverb,
        EffectKind::Echo,
        EffectKind::Chorus,
        EffectKind::Phaser,
        EffectKind::Alienwah,
        EffectKind::Distortion,
        EffectKind::Eq,
        EffectKind::DynamicFilter,
    ];

    /// Effect type from its index (1..8); 0 and unknown values give `None`
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1..=8 => Some(Self::ALL[index as usize - 1]),
            _ => None,
        }
    }

    /// Effect type addressed by a `kit` byte (0x80 + index)
    pub fn from_kit(kit: u8) -> Option<Self> {
        if kit >= effect::NONE {
            Self::from_index(kit - effect::NONE)
        } else {
            None
        }
    }

    pub fn index(self) -> u8 {
        match self {
            EffectKind::Reverb => 1,
            EffectKind::Echo => 2,
            EffectKind::Chorus => 3,
            EffectKind::Phaser => 4,
            EffectKind::Alienwah => 5,
            EffectKind::Distortion => 6,
            EffectKind::Eq => 7,
            EffectKind::DynamicFilter => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Reverb => "Reverb",
            EffectKind::Echo => "Echo",
            EffectKind::Chorus => "Chorus",
            EffectKind::Phaser => "Phaser",
            EffectKind::Alienwah => "AlienWah",
            EffectKind::Distortion => "Distortion",
            EffectKind::Eq => "EQ",
            EffectKind::DynamicFilter => "DynFilter",
        }
    }

    pub fn presets(self) -> &'static [&'static [u8]] {
        match self {
            EffectKind::Reverb => reverb::PRESETS,
            EffectKind::Echo => echo::PRESETS,
            EffectKind::Chorus => chorus::PRESETS,
            EffectKind::Phaser => phaser::PRESETS,
            EffectKind::Alienwah => alienwah::PRESETS,
            EffectKind::Distortion => distortion::PRESETS,
            EffectKind::Eq => eq::PRESETS,
            EffectKind::DynamicFilter => dynamic_filter::PRESETS,
        }
    }

    pub fn curve(self) -> VolumeCurve {
        match self {
            EffectKind::Reverb | EffectKind::Echo | EffectKind::Distortion => VolumeCurve::Boosted,
            EffectKind::Eq => VolumeCurve::Equalizer,
            _ => VolumeCurve::Linear,
        }
    }

    /// Wet level follows a square law on insertion slots
    pub fn squared_wet(self) -> bool {
        matches!(self, EffectKind::Reverb | EffectKind::Echo)
    }

    /// Volume stored by a preset recall: each type lowers its preset level
    /// on one kind of slot.
    pub fn preset_volume(self, value: u8, insertion: bool) -> u8 {
        match self {
            EffectKind::Reverb | EffectKind::Echo if insertion => value / 2,
            EffectKind::Alienwah | EffectKind::DynamicFilter if !insertion => value / 2,
            EffectKind::Distortion if !insertion => (value as f32 * 0.7).round() as u8,
            _ => value,
        }
    }

    /// Range of an effect control. `block.engine` names the preset used for
    /// defaults, `block.part` tells a system slot from an insertion one.
    pub fn limits(self, block: &CommandBlock) -> Option<Limits> {
        let limits = match self {
            EffectKind::Reverb => reverb::limits(block.control),
            EffectKind::Echo => echo::limits(block.control),
            EffectKind::Chorus => chorus::limits(block.control),
            EffectKind::Phaser => phaser::limits(block.control),
            EffectKind::Alienwah => alienwah::limits(block.control),
            EffectKind::Distortion => distortion::limits(block.control),
            EffectKind::Eq => return eq::limits(block.control),
            EffectKind::DynamicFilter => dynamic_filter::limits(block.control),
        }?;
        if block.control == PRESET_CONTROL {
            let last = self.presets().len() as i32 - 1;
            return Some(Limits::int(0, last, 0).fixed());
        }
        Some(limits.with_default(self.preset_default(block)))
    }

    fn preset_default(self, block: &CommandBlock) -> f32 {
        let presets = self.presets();
        let preset = if block.engine == UNUSED {
            0
        } else {
            (block.engine as usize).min(presets.len() - 1)
        };
        let value = presets[preset]
            .get(block.control as usize)
            .copied()
            .unwrap_or(0);
        if block.control == 0 {
            self.preset_volume(value, block.part != section::SYSTEM_EFFECTS) as f32
        } else {
            value as f32
        }
    }

    /// Build a fresh effect of this type with its first preset loaded
    pub fn build(self, insertion: bool, sample_rate: f32, buffer_size: usize) -> Box<dyn Effect> {
        let mut efx: Box<dyn Effect> = match self {
            EffectKind::Reverb => Box::new(reverb::Reverb::new(insertion, sample_rate, buffer_size)),
            EffectKind::Echo => Box::new(echo::Echo::new(insertion, sample_rate, buffer_size)),
            EffectKind::Chorus => Box::new(chorus::Chorus::new(insertion, sample_rate, buffer_size)),
            EffectKind::Phaser => Box::new(phaser::Phaser::new(insertion, sample_rate, buffer_size)),
            EffectKind::Alienwah => {
                Box::new(alienwah::Alienwah::new(insertion, sample_rate, buffer_size))
            }
            EffectKind::Distortion => {
                Box::new(distortion::Distortion::new(insertion, sample_rate, buffer_size))
            }
            EffectKind::Eq => Box::new(eq::Equalizer::new(insertion, sample_rate, buffer_size)),
            EffectKind::DynamicFilter => Box::new(dynamic_filter::DynamicFilter::new(
                insertion,
                sample_rate,
                buffer_size,
            )),
        };
        efx.set_preset(0);
        efx.core_mut().settle();
        efx
    }
}

/// Common interface of the slot effects.
///
/// Parameters are addressed by index with byte values, the same numbering
/// the preset tables use. Volume, panning and L/R cross are owned by the
/// shared `EffectCore`.
pub trait Effect: Send {
    fn kind(&self) -> EffectKind;

    fn core(&self) -> &EffectCore;

    fn core_mut(&mut self) -> &mut EffectCore;

    /// Render one buffer. Every sample of `efx_l`/`efx_r` is written.
    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]);

    fn change_par(&mut self, npar: usize, value: u8);

    fn get_par(&self, npar: usize) -> u8;

    /// Silence delay lines and filter states
    fn cleanup(&mut self);

    /// Called after a whole preset was loaded
    fn preset_loaded(&mut self, _preset: usize) {}

    /// Recall a whole preset (`npreset < 0xF`) or one packed
    /// (parameter, preset) pair.
    fn set_preset(&mut self, npreset: u8) {
        let kind = self.kind();
        let presets = kind.presets();
        let insertion = self.core().insertion;
        let (preset, param) = unpack_preset(npreset, presets.len());
        let values = presets[preset];

        match param {
            None => {
                for (n, &value) in values.iter().enumerate() {
                    let value = if n == 0 {
                        kind.preset_volume(value, insertion)
                    } else {
                        value
                    };
                    self.change_par(n, value);
                }
                self.core_mut().preset = preset as u8;
                self.preset_loaded(preset);
            }
            Some(n) => {
                if let Some(&value) = values.get(n) {
                    let value = if n == 0 {
                        kind.preset_volume(value, insertion)
                    } else {
                        value
                    };
                    self.change_par(n, value);
                }
            }
        }
        self.core_mut().changed = false;
    }

    /// Filter parameters owned by the effect (DynamicFilter)
    fn filter_params(&self) -> Option<&FilterParams> {
        None
    }

    fn filter_params_mut(&mut self) -> Option<&mut FilterParams> {
        None
    }

    /// Magnitude response at `freq`, only meaningful for the EQ
    fn response(&self, _freq: f32) -> f32 {
        0.0
    }
}

/// Effect parameter value from a clamped float
#[inline]
pub(crate) fn par_value(value: f32) -> u8 {
    value.round().clamp(0.0, 127.0) as u8
}
