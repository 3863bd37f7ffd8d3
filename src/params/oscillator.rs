// Oscillator parameters - base function and harmonic tables of one add voice

use super::base::ParamBase;
use super::limits::Limits;
use super::{ParamGroup, to_i8, to_u8};
use crate::messaging::command::CommandBlock;
use crate::messaging::controls::{MAX_HARMONICS, insert, oscillator};

/// Number of selectable base functions
pub const BASE_FUNCTIONS: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseFunction {
    Sine,
    Triangle,
    Pulse,
    Saw,
    Power,
    Gauss,
    Diode,
    AbsSine,
}

impl From<u8> for BaseFunction {
    fn from(value: u8) -> Self {
        match value {
            1 => BaseFunction::Triangle,
            2 => BaseFunction::Pulse,
            3 => BaseFunction::Saw,
            4 => BaseFunction::Power,
            5 => BaseFunction::Gauss,
            6 => BaseFunction::Diode,
            7 => BaseFunction::AbsSine,
            _ => BaseFunction::Sine,
        }
    }
}

pub struct OscilParams {
    base: ParamBase,
    /// 64 = silent, 127 = full positive, 0 = full negative
    pub harmonic_mag: [u8; MAX_HARMONICS],
    /// 64 = no shift
    pub harmonic_phase: [u8; MAX_HARMONICS],
    pub phase_randomness: u8,
    /// Linear, -40 dB, -60 dB, -80 dB, -100 dB
    pub mag_type: u8,
    pub base_function: u8,
    pub base_function_par: i8,
    pub harmonic_shift: i8,
}

impl OscilParams {
    pub fn new() -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            harmonic_mag: [64; MAX_HARMONICS],
            harmonic_phase: [64; MAX_HARMONICS],
            phase_randomness: 0,
            mag_type: 0,
            base_function: 0,
            base_function_par: 0,
            harmonic_shift: 0,
        };
        params.defaults();
        params
    }

    pub fn base_function(&self) -> BaseFunction {
        BaseFunction::from(self.base_function)
    }

    /// Signed amplitude of harmonic `n` after the magnitude curve
    pub fn harmonic_amplitude(&self, n: usize) -> f32 {
        let raw = self.harmonic_mag[n] as f32 - 64.0;
        if raw == 0.0 {
            return 0.0;
        }
        let norm = (raw.abs() / 64.0).min(1.0);
        let magnitude = match self.mag_type {
            1 => db_curve(norm, 40.0),
            2 => db_curve(norm, 60.0),
            3 => db_curve(norm, 80.0),
            4 => db_curve(norm, 100.0),
            _ => norm,
        };
        magnitude.copysign(raw)
    }

    /// Phase offset of harmonic `n` in radians
    pub fn harmonic_phase_offset(&self, n: usize) -> f32 {
        (self.harmonic_phase[n] as f32 - 64.0) / 64.0 * std::f32::consts::PI / (n as f32 + 1.0)
    }

    /// Limits of the harmonic tables (inserts 6 and 7)
    fn harmonic_limits(block: &CommandBlock) -> Option<Limits> {
        if block.control as usize >= MAX_HARMONICS {
            return None;
        }
        let def = if block.insert == insert::HARMONIC_AMPLITUDE && block.control == 0 {
            127
        } else {
            64
        };
        Some(Limits::int(0, 127, def))
    }
}

impl Default for OscilParams {
    fn default() -> Self {
        Self::new()
    }
}

fn db_curve(norm: f32, range_db: f32) -> f32 {
    // norm 1.0 => 0 dB, norm 0.0 => -range_db
    10.0f32.powf((1.0 - norm) * -range_db / 20.0)
}

impl ParamGroup for OscilParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        if matches!(
            block.insert,
            insert::HARMONIC_AMPLITUDE | insert::HARMONIC_PHASE_BANDWIDTH
        ) {
            return Self::harmonic_limits(block);
        }
        let limits = match block.control {
            oscillator::PHASE_RANDOMNESS => Limits::int(0, 127, 0),
            oscillator::MAG_TYPE => Limits::int(0, 4, 0).fixed(),
            oscillator::BASE_FUNCTION_PARAMETER => Limits::int(-64, 63, 0),
            oscillator::BASE_FUNCTION_TYPE => Limits::int(0, BASE_FUNCTIONS as i32 - 1, 0).fixed(),
            oscillator::HARMONIC_SHIFT => Limits::int(-64, 64, 0),
            oscillator::CLEAR_HARMONIC_SHIFT | oscillator::CLEAR_HARMONICS => {
                Limits::int(0, 1, 0).fixed()
            }
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let n = block.control as usize;
        match block.insert {
            insert::HARMONIC_AMPLITUDE => return self.harmonic_mag.get(n).map(|&v| v as f32),
            insert::HARMONIC_PHASE_BANDWIDTH => {
                return self.harmonic_phase.get(n).map(|&v| v as f32);
            }
            _ => {}
        }
        let value = match block.control {
            oscillator::PHASE_RANDOMNESS => self.phase_randomness as f32,
            oscillator::MAG_TYPE => self.mag_type as f32,
            oscillator::BASE_FUNCTION_PARAMETER => self.base_function_par as f32,
            oscillator::BASE_FUNCTION_TYPE => self.base_function as f32,
            oscillator::HARMONIC_SHIFT => self.harmonic_shift as f32,
            oscillator::CLEAR_HARMONIC_SHIFT | oscillator::CLEAR_HARMONICS => 0.0,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let n = block.control as usize;
        match block.insert {
            insert::HARMONIC_AMPLITUDE | insert::HARMONIC_PHASE_BANDWIDTH => {
                if n >= MAX_HARMONICS {
                    return false;
                }
                if block.insert == insert::HARMONIC_AMPLITUDE {
                    self.harmonic_mag[n] = to_u8(block.value);
                } else {
                    self.harmonic_phase[n] = to_u8(block.value);
                }
                self.base.params_changed();
                return true;
            }
            _ => {}
        }
        match block.control {
            oscillator::PHASE_RANDOMNESS => self.phase_randomness = to_u8(block.value),
            oscillator::MAG_TYPE => self.mag_type = to_u8(block.value),
            oscillator::BASE_FUNCTION_PARAMETER => self.base_function_par = to_i8(block.value),
            oscillator::BASE_FUNCTION_TYPE => self.base_function = to_u8(block.value),
            oscillator::HARMONIC_SHIFT => self.harmonic_shift = to_i8(block.value),
            oscillator::CLEAR_HARMONIC_SHIFT => self.harmonic_shift = 0,
            oscillator::CLEAR_HARMONICS => {
                self.harmonic_mag = [64; MAX_HARMONICS];
                self.harmonic_phase = [64; MAX_HARMONICS];
                self.harmonic_mag[0] = 127;
            }
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.harmonic_mag = [64; MAX_HARMONICS];
        self.harmonic_mag[0] = 127;
        self.harmonic_phase = [64; MAX_HARMONICS];
        self.phase_randomness = 0;
        self.mag_type = 0;
        self.base_function = 0;
        self.base_function_par = 0;
        self.harmonic_shift = 0;
        self.base.params_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::command::LimitRequest;

    #[test]
    fn test_harmonic_defaults() {
        let first = CommandBlock::limits(0, 0, LimitRequest::Default)
            .with_insert(insert::HARMONIC_AMPLITUDE);
        let other = CommandBlock::limits(5, 0, LimitRequest::Default)
            .with_insert(insert::HARMONIC_AMPLITUDE);
        let phase = CommandBlock::limits(0, 0, LimitRequest::Default)
            .with_insert(insert::HARMONIC_PHASE_BANDWIDTH);
        assert_eq!(OscilParams::limits(&first).unwrap().def, 127.0);
        assert_eq!(OscilParams::limits(&other).unwrap().def, 64.0);
        assert_eq!(OscilParams::limits(&phase).unwrap().def, 64.0);

        let beyond = CommandBlock::limits(MAX_HARMONICS as u8, 0, LimitRequest::Default)
            .with_insert(insert::HARMONIC_AMPLITUDE);
        assert!(OscilParams::limits(&beyond).is_none());
    }

    #[test]
    fn test_harmonic_amplitude_curve() {
        let mut params = OscilParams::new();
        assert_eq!(params.harmonic_amplitude(0), 1.0);
        assert_eq!(params.harmonic_amplitude(1), 0.0);

        params.harmonic_mag[1] = 0;
        assert_eq!(params.harmonic_amplitude(1), -1.0);

        params.mag_type = 1;
        params.harmonic_mag[2] = 96;
        let amp = params.harmonic_amplitude(2);
        assert!((amp - 0.1).abs() < 1e-3, "half scale on a 40 dB curve: {amp}");
    }

    #[test]
    fn test_clear_harmonics() {
        let mut params = OscilParams::new();
        params.harmonic_mag[4] = 20;
        let before = params.base().updated_at();
        let block = CommandBlock::write(oscillator::CLEAR_HARMONICS, 0, 1.0)
            .with_insert(insert::OSCILLATOR_GROUP);
        assert!(params.apply(&block));
        assert_eq!(params.harmonic_mag[4], 64);
        assert_ne!(params.base().updated_at(), before);
    }
}
