// LFO parameters (amplitude, frequency and filter LFOs of a kit item)

use super::base::ParamBase;
use super::limits::Limits;
use super::{ParamGroup, to_u8};
use crate::messaging::command::CommandBlock;
use crate::messaging::controls::{insert_type, lfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoKind {
    Amplitude,
    Frequency,
    Filter,
}

impl LfoKind {
    pub fn from_parameter(parameter: u8) -> Option<Self> {
        match parameter {
            insert_type::AMPLITUDE => Some(LfoKind::Amplitude),
            insert_type::FREQUENCY => Some(LfoKind::Frequency),
            insert_type::FILTER => Some(LfoKind::Filter),
            _ => None,
        }
    }

    /// Default speed (0..1)
    fn default_speed(self) -> f32 {
        match self {
            LfoKind::Frequency => 70.0 / 127.0,
            LfoKind::Amplitude | LfoKind::Filter => 80.0 / 127.0,
        }
    }
}

/// LFO waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfoShape {
    Sine,
    Triangle,
    Square,
    RampUp,
    RampDown,
    Exp1,
    Exp2,
}

impl From<u8> for LfoShape {
    fn from(value: u8) -> Self {
        match value {
            1 => LfoShape::Triangle,
            2 => LfoShape::Square,
            3 => LfoShape::RampUp,
            4 => LfoShape::RampDown,
            5 => LfoShape::Exp1,
            6 => LfoShape::Exp2,
            _ => LfoShape::Sine,
        }
    }
}

pub struct LfoParams {
    base: ParamBase,
    kind: LfoKind,
    /// 0..1, mapped exponentially to Hz by the consumer
    pub speed: f32,
    pub depth: u8,
    pub delay: u8,
    pub start_phase: u8,
    pub amp_randomness: u8,
    pub shape: u8,
    pub continuous: bool,
    pub freq_randomness: u8,
    pub stretch: u8,
}

impl LfoParams {
    pub fn new(kind: LfoKind) -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            kind,
            speed: 0.0,
            depth: 0,
            delay: 0,
            start_phase: 64,
            amp_randomness: 0,
            shape: 0,
            continuous: false,
            freq_randomness: 0,
            stretch: 64,
        };
        params.defaults();
        params
    }

    pub fn kind(&self) -> LfoKind {
        self.kind
    }

    /// Base frequency in Hz
    pub fn frequency(&self) -> f32 {
        (2.0f32.powf(self.speed * 10.0) - 1.0) / 12.0
    }
}

impl ParamGroup for LfoParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        let kind = LfoKind::from_parameter(block.parameter)?;
        let limits = match block.control {
            lfo::SPEED => Limits::float(0.0, 1.0, kind.default_speed()),
            lfo::DEPTH | lfo::DELAY | lfo::AMPLITUDE_RANDOMNESS | lfo::FREQUENCY_RANDOMNESS => {
                Limits::int(0, 127, 0)
            }
            lfo::START | lfo::STRETCH => Limits::int(0, 127, 64),
            lfo::TYPE => Limits::int(0, 6, 0).fixed(),
            lfo::CONTINUOUS => Limits::toggle(false),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let value = match block.control {
            lfo::SPEED => self.speed,
            lfo::DEPTH => self.depth as f32,
            lfo::DELAY => self.delay as f32,
            lfo::START => self.start_phase as f32,
            lfo::AMPLITUDE_RANDOMNESS => self.amp_randomness as f32,
            lfo::TYPE => self.shape as f32,
            lfo::CONTINUOUS => self.continuous as u8 as f32,
            lfo::FREQUENCY_RANDOMNESS => self.freq_randomness as f32,
            lfo::STRETCH => self.stretch as f32,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        match block.control {
            lfo::SPEED => self.speed = value,
            lfo::DEPTH => self.depth = to_u8(value),
            lfo::DELAY => self.delay = to_u8(value),
            lfo::START => self.start_phase = to_u8(value),
            lfo::AMPLITUDE_RANDOMNESS => self.amp_randomness = to_u8(value),
            lfo::TYPE => self.shape = to_u8(value),
            lfo::CONTINUOUS => self.continuous = value >= 0.5,
            lfo::FREQUENCY_RANDOMNESS => self.freq_randomness = to_u8(value),
            lfo::STRETCH => self.stretch = to_u8(value),
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.speed = self.kind.default_speed();
        self.depth = 0;
        self.delay = 0;
        self.start_phase = 64;
        self.amp_randomness = 0;
        self.shape = 0;
        self.continuous = false;
        self.freq_randomness = 0;
        self.stretch = 64;
        self.base.params_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::command::LimitRequest;

    #[test]
    fn test_defaults_depend_on_kind() {
        let block = CommandBlock::limits(lfo::SPEED, 0, LimitRequest::Default)
            .with_parameter(insert_type::FREQUENCY);
        let limits = LfoParams::limits(&block).unwrap();
        assert!((limits.def - 70.0 / 127.0).abs() < 1e-6);
        assert!(!limits.integer);
    }

    #[test]
    fn test_unknown_group_or_control() {
        let block = CommandBlock::limits(lfo::SPEED, 0, LimitRequest::Default).with_parameter(7);
        assert!(LfoParams::limits(&block).is_none());

        let block = CommandBlock::limits(42, 0, LimitRequest::Default).with_parameter(0);
        assert!(LfoParams::limits(&block).is_none());
    }

    #[test]
    fn test_write_bumps_version() {
        let mut params = LfoParams::new(LfoKind::Amplitude);
        let before = params.base().updated_at();
        assert!(params.apply(&CommandBlock::write(lfo::DEPTH, 0, 90.0)));
        assert_ne!(params.base().updated_at(), before);
        assert_eq!(params.read(&CommandBlock::read(lfo::DEPTH, 0)), Some(90.0));

        let before = params.base().updated_at();
        assert!(!params.apply(&CommandBlock::write(99, 0, 1.0)));
        assert_eq!(params.base().updated_at(), before);
    }

    #[test]
    fn test_frequency_mapping() {
        let mut params = LfoParams::new(LfoKind::Amplitude);
        params.speed = 0.0;
        assert_eq!(params.frequency(), 0.0);
        params.speed = 1.0;
        assert!(params.frequency() > 80.0);
    }
}
