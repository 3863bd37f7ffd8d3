// Main section parameters (section 0xF0)

use super::base::ParamBase;
use super::limits::Limits;
use super::part::volume_to_gain;
use super::{ParamGroup, to_i8, to_u8};
use crate::instance::MAX_INSTANCES;
use crate::messaging::command::CommandBlock;
use crate::messaging::controls::{NUM_MIDI_PARTS, main};

pub const DEFAULT_AVAILABLE_PARTS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoloType {
    Off,
    Row,
    Column,
    Loop,
    TwoWay,
}

impl From<u8> for SoloType {
    fn from(value: u8) -> Self {
        match value {
            1 => SoloType::Row,
            2 => SoloType::Column,
            3 => SoloType::Loop,
            4 => SoloType::TwoWay,
            _ => SoloType::Off,
        }
    }
}

pub struct MasterParams {
    base: ParamBase,
    pub volume: f32,
    pub current_part: u8,
    /// 16, 32 or 64
    pub available_parts: u8,
    /// 64 = no detune, one step per cent
    pub detune: u8,
    pub key_shift: i8,
    pub mono: bool,
    pub solo_type: u8,
    pub solo_cc: u8,
}

impl MasterParams {
    pub fn new() -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            volume: 90.0,
            current_part: 0,
            available_parts: DEFAULT_AVAILABLE_PARTS,
            detune: 64,
            key_shift: 0,
            mono: false,
            solo_type: 0,
            solo_cc: 115,
        };
        params.defaults();
        params
    }

    pub fn gain(&self) -> f32 {
        volume_to_gain(self.volume)
    }

    /// Global fine tuning in cents
    pub fn detune_cents(&self) -> f32 {
        self.detune as f32 - 64.0
    }

    pub fn solo_type(&self) -> SoloType {
        SoloType::from(self.solo_type)
    }

    /// True for the controls that trigger an action instead of storing a value
    pub fn is_action(control: u8) -> bool {
        matches!(
            control,
            main::MASTER_RESET
                | main::MASTER_RESET_AND_MLEARN
                | main::START_INSTANCE
                | main::STOP_INSTANCE
                | main::STOP_SOUND
        )
    }
}

impl Default for MasterParams {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamGroup for MasterParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        let limits = match block.control {
            main::VOLUME => Limits::float(0.0, 127.0, 90.0),
            main::PART_NUMBER => Limits::int(0, NUM_MIDI_PARTS as i32 - 1, 0).fixed(),
            main::AVAILABLE_PARTS => {
                Limits::int(16, NUM_MIDI_PARTS as i32, DEFAULT_AVAILABLE_PARTS as i32).fixed()
            }
            main::DETUNE => Limits::int(0, 127, 64),
            main::KEY_SHIFT => Limits::int(-36, 36, 0).fixed(),
            main::MONO => Limits::toggle(false),
            main::SOLO_TYPE => Limits::int(0, 4, 0).fixed(),
            main::SOLO_CC => Limits::int(14, 119, 115).fixed(),
            main::MASTER_RESET | main::MASTER_RESET_AND_MLEARN | main::STOP_SOUND => {
                Limits::int(0, 0, 0).fixed()
            }
            main::START_INSTANCE => Limits::int(0, MAX_INSTANCES as i32 - 1, 0).fixed(),
            main::STOP_INSTANCE => Limits::int(1, MAX_INSTANCES as i32 - 1, 1).fixed(),
            main::READ_PART_PEAK | main::READ_MAIN_LR_PEAK => Limits::float(0.0, 1.0, 0.0).fixed(),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let value = match block.control {
            main::VOLUME => self.volume,
            main::PART_NUMBER => self.current_part as f32,
            main::AVAILABLE_PARTS => self.available_parts as f32,
            main::DETUNE => self.detune as f32,
            main::KEY_SHIFT => self.key_shift as f32,
            main::MONO => self.mono as u8 as f32,
            main::SOLO_TYPE => self.solo_type as f32,
            main::SOLO_CC => self.solo_cc as f32,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        match block.control {
            main::VOLUME => self.volume = value,
            main::PART_NUMBER => {
                let part = to_u8(value);
                if part >= self.available_parts {
                    return false;
                }
                self.current_part = part;
            }
            main::AVAILABLE_PARTS => {
                let parts = to_u8(value);
                if !matches!(parts, 16 | 32 | 64) {
                    return false;
                }
                self.available_parts = parts;
                if self.current_part >= parts {
                    self.current_part = 0;
                }
            }
            main::DETUNE => self.detune = to_u8(value),
            main::KEY_SHIFT => self.key_shift = to_i8(value),
            main::MONO => self.mono = value >= 0.5,
            main::SOLO_TYPE => self.solo_type = to_u8(value),
            main::SOLO_CC => self.solo_cc = to_u8(value),
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.volume = 90.0;
        self.current_part = 0;
        self.available_parts = DEFAULT_AVAILABLE_PARTS;
        self.detune = 64;
        self.key_shift = 0;
        self.mono = false;
        self.solo_type = 0;
        self.solo_cc = 115;
        self.base.params_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_parts_accepts_only_banks() {
        let mut params = MasterParams::new();
        assert!(!params.apply(&CommandBlock::write(main::AVAILABLE_PARTS, 0xF0, 20.0)));
        assert_eq!(params.available_parts, 16);
        assert!(params.apply(&CommandBlock::write(main::AVAILABLE_PARTS, 0xF0, 32.0)));
        assert_eq!(params.available_parts, 32);
    }

    #[test]
    fn test_part_number_bounded_by_available_parts() {
        let mut params = MasterParams::new();
        assert!(!params.apply(&CommandBlock::write(main::PART_NUMBER, 0xF0, 20.0)));
        params.apply(&CommandBlock::write(main::AVAILABLE_PARTS, 0xF0, 64.0));
        assert!(params.apply(&CommandBlock::write(main::PART_NUMBER, 0xF0, 20.0)));

        // shrinking the bank resets the selection
        params.apply(&CommandBlock::write(main::AVAILABLE_PARTS, 0xF0, 16.0));
        assert_eq!(params.current_part, 0);
    }

    #[test]
    fn test_actions_are_not_stored() {
        assert!(MasterParams::is_action(main::STOP_SOUND));
        assert!(!MasterParams::is_action(main::VOLUME));
        let mut params = MasterParams::new();
        assert!(!params.apply(&CommandBlock::write(main::STOP_SOUND, 0xF0, 0.0)));
    }
}
