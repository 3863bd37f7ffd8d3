// Part parameters - part scalars, MIDI controllers and kit items

use super::add::AddSynthParams;
use super::base::ParamBase;
use super::limits::Limits;
use super::{ParamGroup, to_i8, to_u8};
use crate::messaging::command::CommandBlock;
use crate::messaging::controls::{NUM_KIT_ITEMS, NUM_MIDI_CHANNELS, NUM_PART_EFX, kit, part};
use crate::messaging::text_msg::MAX_MSG_LEN;

/// Upper bound of the per-part note limit
pub const MAX_PART_NOTES: u8 = 64;

/// Part volume/ main volume curve: 96 = 0 dB, 40 dB span
pub fn volume_to_gain(volume: f32) -> f32 {
    let db = (volume - 96.0) / 96.0 * 40.0;
    10.0f32.powf(db / 20.0)
}

/// Left/right gains of a 0..127 panning value
pub fn pan_gains(panning: u8) -> (f32, f32) {
    let t = if panning > 0 {
        (panning as f32 - 1.0) / 126.0
    } else {
        0.0
    };
    let left = (t * std::f32::consts::FRAC_PI_2).cos();
    let right = ((1.0 - t) * std::f32::consts::FRAC_PI_2).cos();
    (left, right)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Poly,
    Mono,
    Legato,
}

impl From<u8> for KeyMode {
    fn from(value: u8) -> Self {
        match value {
            1 => KeyMode::Mono,
            2 => KeyMode::Legato,
            _ => KeyMode::Poly,
        }
    }
}

pub struct PartParams {
    base: ParamBase,
    number: u8,
    pub enabled: bool,
    pub volume: f32,
    pub velocity_sense: u8,
    pub panning: u8,
    pub velocity_offset: u8,
    pub midi_channel: u8,
    pub key_mode: u8,
    pub portamento: bool,
    pub min_note: u8,
    pub max_note: u8,
    pub max_notes: u8,
    pub key_shift: i8,
    /// Send level to each system effect
    pub sys_efx_send: [u8; 4],
    pub humanise: u8,
    pub drum_mode: bool,
    pub kit_mode: u8,
    /// Part effect the UI is editing
    pub effect_number: u8,
    /// 0 = next effect, 1 = part out, 2 = dry out
    pub effect_destination: [u8; NUM_PART_EFX],
    pub effect_bypass: [bool; NUM_PART_EFX],
    pub name: String,
}

impl PartParams {
    pub fn new(number: u8) -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            number,
            enabled: false,
            volume: 96.0,
            velocity_sense: 64,
            panning: 64,
            velocity_offset: 64,
            midi_channel: 0,
            key_mode: 0,
            portamento: false,
            min_note: 0,
            max_note: 127,
            max_notes: 20,
            key_shift: 0,
            sys_efx_send: [0; 4],
            humanise: 0,
            drum_mode: false,
            kit_mode: 0,
            effect_number: 0,
            effect_destination: [0; NUM_PART_EFX],
            effect_bypass: [false; NUM_PART_EFX],
            name: String::with_capacity(MAX_MSG_LEN),
        };
        params.defaults();
        params
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn key_mode(&self) -> KeyMode {
        KeyMode::from(self.key_mode)
    }

    pub fn gain(&self) -> f32 {
        volume_to_gain(self.volume)
    }

    pub fn accepts_note(&self, note: u8) -> bool {
        note >= self.min_note && note <= self.max_note
    }

    /// System effect send level for `efx` as a linear gain
    pub fn send_gain(&self, efx: usize) -> f32 {
        match self.sys_efx_send.get(efx) {
            Some(&0) | None => 0.0,
            Some(&level) => 0.1f32.powf((1.0 - level as f32 / 96.0) * 2.0),
        }
    }
}

impl ParamGroup for PartParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        let part_index = block.part as usize;
        let limits = match block.control {
            part::VOLUME => Limits::float(0.0, 127.0, 96.0),
            part::VELOCITY_SENSE | part::PANNING | part::VELOCITY_OFFSET => {
                Limits::int(0, 127, 64)
            }
            part::MIDI_CHANNEL => Limits::int(
                0,
                NUM_MIDI_CHANNELS as i32 - 1,
                (part_index % NUM_MIDI_CHANNELS) as i32,
            )
            .fixed(),
            part::KEY_MODE => Limits::int(0, 2, 0).fixed(),
            part::PORTAMENTO => Limits::int(0, 1, 0),
            part::ENABLE => Limits::int(0, 1, (part_index == 0) as i32),
            part::MIN_NOTE => Limits::int(0, 127, 0).fixed(),
            part::MAX_NOTE => Limits::int(0, 127, 127).fixed(),
            part::MAX_NOTES => Limits::int(1, MAX_PART_NOTES as i32, 20).fixed(),
            part::KEY_SHIFT => Limits::int(-36, 36, 0).fixed(),
            part::PART_TO_SYSTEM_EFFECT_1..=part::PART_TO_SYSTEM_EFFECT_4 => Limits::int(0, 127, 0),
            part::HUMANISE => Limits::int(0, 50, 0),
            part::DRUM_MODE => Limits::toggle(false),
            part::KIT_MODE => Limits::int(0, 3, 0).fixed(),
            part::EFFECT_NUMBER => Limits::int(0, NUM_PART_EFX as i32 - 1, 0).fixed(),
            part::EFFECT_TYPE => Limits::int(0, 8, 0).fixed(),
            part::EFFECT_DESTINATION => Limits::int(0, 2, 0).fixed(),
            part::EFFECT_BYPASS => Limits::toggle(false),
            // text travels through the message pool
            part::INSTRUMENT_NAME => Limits::int(0, 0, 0).fixed(),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let efx = self.effect_number as usize;
        let value = match block.control {
            part::VOLUME => self.volume,
            part::VELOCITY_SENSE => self.velocity_sense as f32,
            part::PANNING => self.panning as f32,
            part::VELOCITY_OFFSET => self.velocity_offset as f32,
            part::MIDI_CHANNEL => self.midi_channel as f32,
            part::KEY_MODE => self.key_mode as f32,
            part::PORTAMENTO => self.portamento as u8 as f32,
            part::ENABLE => self.enabled as u8 as f32,
            part::MIN_NOTE => self.min_note as f32,
            part::MAX_NOTE => self.max_note as f32,
            part::MAX_NOTES => self.max_notes as f32,
            part::KEY_SHIFT => self.key_shift as f32,
            part::PART_TO_SYSTEM_EFFECT_1..=part::PART_TO_SYSTEM_EFFECT_4 => {
                self.sys_efx_send[(block.control - part::PART_TO_SYSTEM_EFFECT_1) as usize] as f32
            }
            part::HUMANISE => self.humanise as f32,
            part::DRUM_MODE => self.drum_mode as u8 as f32,
            part::KIT_MODE => self.kit_mode as f32,
            part::EFFECT_NUMBER => self.effect_number as f32,
            part::EFFECT_DESTINATION => self.effect_destination[efx] as f32,
            part::EFFECT_BYPASS => self.effect_bypass[efx] as u8 as f32,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        let efx = self.effect_number as usize;
        match block.control {
            part::VOLUME => self.volume = value,
            part::VELOCITY_SENSE => self.velocity_sense = to_u8(value),
            part::PANNING => self.panning = to_u8(value),
            part::VELOCITY_OFFSET => self.velocity_offset = to_u8(value),
            part::MIDI_CHANNEL => self.midi_channel = to_u8(value),
            part::KEY_MODE => self.key_mode = to_u8(value),
            part::PORTAMENTO => self.portamento = value >= 0.5,
            part::ENABLE => self.enabled = value >= 0.5,
            part::MIN_NOTE => self.min_note = to_u8(value).min(self.max_note),
            part::MAX_NOTE => self.max_note = to_u8(value).max(self.min_note),
            part::MAX_NOTES => self.max_notes = to_u8(value),
            part::KEY_SHIFT => self.key_shift = to_i8(value),
            part::PART_TO_SYSTEM_EFFECT_1..=part::PART_TO_SYSTEM_EFFECT_4 => {
                self.sys_efx_send[(block.control - part::PART_TO_SYSTEM_EFFECT_1) as usize] =
                    to_u8(value)
            }
            part::HUMANISE => self.humanise = to_u8(value),
            part::DRUM_MODE => self.drum_mode = value >= 0.5,
            part::KIT_MODE => self.kit_mode = to_u8(value),
            part::EFFECT_NUMBER => self.effect_number = to_u8(value),
            part::EFFECT_DESTINATION => self.effect_destination[efx] = to_u8(value),
            part::EFFECT_BYPASS => self.effect_bypass[efx] = value >= 0.5,
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        let number = self.number as usize;
        self.enabled = number == 0;
        self.volume = 96.0;
        self.velocity_sense = 64;
        self.panning = 64;
        self.velocity_offset = 64;
        self.midi_channel = (number % NUM_MIDI_CHANNELS) as u8;
        self.key_mode = 0;
        self.portamento = false;
        self.min_note = 0;
        self.max_note = 127;
        self.max_notes = 20;
        self.key_shift = 0;
        self.sys_efx_send = [0; 4];
        self.humanise = 0;
        self.drum_mode = false;
        self.kit_mode = 0;
        self.effect_number = 0;
        self.effect_destination = [0; NUM_PART_EFX];
        self.effect_bypass = [false; NUM_PART_EFX];
        self.name.clear();
        self.base.params_changed();
    }
}

/// MIDI controller settings of a part, plus the live controller values
pub struct ControllerParams {
    base: ParamBase,
    pub volume_range: u8,
    pub volume_enable: bool,
    pub panning_width: u8,
    pub mod_wheel_depth: u8,
    pub exponential_mod_wheel: bool,
    pub expression_enable: bool,
    pub sustain_pedal_enable: bool,
    /// Cents
    pub pitch_wheel_range: i16,
    pub filter_q_depth: u8,
    pub filter_cutoff_depth: u8,
    pub portamento_time: u8,
    pub portamento_time_stretch: u8,
    pub portamento_threshold: u8,
    pub portamento_threshold_type: u8,
    pub receive_portamento: bool,

    // live values, driven by MIDI
    pub volume: f32,
    pub expression: f32,
    pub mod_wheel: f32,
    pub pan: f32,
    pub sustain: bool,
}

impl ControllerParams {
    pub fn new() -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            volume_range: 96,
            volume_enable: true,
            panning_width: 64,
            mod_wheel_depth: 80,
            exponential_mod_wheel: false,
            expression_enable: true,
            sustain_pedal_enable: true,
            pitch_wheel_range: 200,
            filter_q_depth: 64,
            filter_cutoff_depth: 64,
            portamento_time: 64,
            portamento_time_stretch: 64,
            portamento_threshold: 3,
            portamento_threshold_type: 1,
            receive_portamento: true,
            volume: 1.0,
            expression: 1.0,
            mod_wheel: 0.0,
            pan: 0.0,
            sustain: false,
        };
        params.defaults();
        params
    }

    /// Reset the live values only (MIDI "reset all controllers")
    pub fn reset_all(&mut self) {
        self.set_volume(100);
        self.expression = 1.0;
        self.mod_wheel = 0.0;
        self.pan = 0.0;
        self.sustain = false;
    }

    pub fn set_volume(&mut self, value: u8) {
        self.volume = if self.volume_enable {
            let range = self.volume_range as f32 / 127.0;
            (1.0 - range) + range * value as f32 / 127.0
        } else {
            1.0
        };
    }

    pub fn set_expression(&mut self, value: u8) {
        self.expression = if self.expression_enable {
            value as f32 / 127.0
        } else {
            1.0
        };
    }

    pub fn set_pan(&mut self, value: u8) {
        self.pan = (value as f32 / 128.0 - 0.5) * (self.panning_width as f32 / 64.0);
    }

    pub fn set_mod_wheel(&mut self, value: u8) {
        let depth = self.mod_wheel_depth as f32 / 127.0;
        self.mod_wheel = if self.exponential_mod_wheel {
            depth * (value as f32 / 127.0).powi(2)
        } else {
            depth * value as f32 / 127.0
        };
    }

    pub fn set_sustain(&mut self, value: u8) {
        self.sustain = self.sustain_pedal_enable && value >= 64;
    }

    /// Combined gain of volume and expression
    pub fn gain(&self) -> f32 {
        self.volume * self.expression
    }
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamGroup for ControllerParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        let plain = Limits::int(0, 127, 64).fixed();
        let limits = match block.control {
            part::VOLUME_RANGE => Limits::int(64, 127, 96).fixed(),
            part::VOLUME_ENABLE
            | part::EXPRESSION_ENABLE
            | part::SUSTAIN_PEDAL_ENABLE
            | part::RECEIVE_PORTAMENTO => Limits::toggle(true),
            part::PANNING_WIDTH => Limits::int(0, 64, 64),
            part::MOD_WHEEL_DEPTH => plain.with_default(80.0),
            part::EXPONENTIAL_MOD_WHEEL => Limits::toggle(false),
            part::PITCH_WHEEL_RANGE => Limits::int(-6400, 6400, 200),
            part::FILTER_Q_DEPTH | part::FILTER_CUTOFF_DEPTH => plain,
            part::PORTAMENTO_TIME | part::PORTAMENTO_TIME_STRETCH => Limits::int(0, 127, 64),
            part::PORTAMENTO_THRESHOLD => Limits::int(0, 127, 3),
            part::PORTAMENTO_THRESHOLD_TYPE => Limits::toggle(true),
            part::RESET_ALL_CONTROLLERS => Limits::int(0, 0, 0).fixed(),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let value = match block.control {
            part::VOLUME_RANGE => self.volume_range as f32,
            part::VOLUME_ENABLE => self.volume_enable as u8 as f32,
            part::PANNING_WIDTH => self.panning_width as f32,
            part::MOD_WHEEL_DEPTH => self.mod_wheel_depth as f32,
            part::EXPONENTIAL_MOD_WHEEL => self.exponential_mod_wheel as u8 as f32,
            part::EXPRESSION_ENABLE => self.expression_enable as u8 as f32,
            part::SUSTAIN_PEDAL_ENABLE => self.sustain_pedal_enable as u8 as f32,
            part::PITCH_WHEEL_RANGE => self.pitch_wheel_range as f32,
            part::FILTER_Q_DEPTH => self.filter_q_depth as f32,
            part::FILTER_CUTOFF_DEPTH => self.filter_cutoff_depth as f32,
            part::PORTAMENTO_TIME => self.portamento_time as f32,
            part::PORTAMENTO_TIME_STRETCH => self.portamento_time_stretch as f32,
            part::PORTAMENTO_THRESHOLD => self.portamento_threshold as f32,
            part::PORTAMENTO_THRESHOLD_TYPE => self.portamento_threshold_type as f32,
            part::RECEIVE_PORTAMENTO => self.receive_portamento as u8 as f32,
            part::RESET_ALL_CONTROLLERS => 0.0,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        match block.control {
            part::VOLUME_RANGE => self.volume_range = to_u8(value),
            part::VOLUME_ENABLE => self.volume_enable = value >= 0.5,
            part::PANNING_WIDTH => self.panning_width = to_u8(value),
            part::MOD_WHEEL_DEPTH => self.mod_wheel_depth = to_u8(value),
            part::EXPONENTIAL_MOD_WHEEL => self.exponential_mod_wheel = value >= 0.5,
            part::EXPRESSION_ENABLE => self.expression_enable = value >= 0.5,
            part::SUSTAIN_PEDAL_ENABLE => self.sustain_pedal_enable = value >= 0.5,
            part::PITCH_WHEEL_RANGE => self.pitch_wheel_range = value.round() as i16,
            part::FILTER_Q_DEPTH => self.filter_q_depth = to_u8(value),
            part::FILTER_CUTOFF_DEPTH => self.filter_cutoff_depth = to_u8(value),
            part::PORTAMENTO_TIME => self.portamento_time = to_u8(value),
            part::PORTAMENTO_TIME_STRETCH => self.portamento_time_stretch = to_u8(value),
            part::PORTAMENTO_THRESHOLD => self.portamento_threshold = to_u8(value),
            part::PORTAMENTO_THRESHOLD_TYPE => self.portamento_threshold_type = to_u8(value),
            part::RECEIVE_PORTAMENTO => self.receive_portamento = value >= 0.5,
            part::RESET_ALL_CONTROLLERS => self.reset_all(),
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.volume_range = 96;
        self.volume_enable = true;
        self.panning_width = 64;
        self.mod_wheel_depth = 80;
        self.exponential_mod_wheel = false;
        self.expression_enable = true;
        self.sustain_pedal_enable = true;
        self.pitch_wheel_range = 200;
        self.filter_q_depth = 64;
        self.filter_cutoff_depth = 64;
        self.portamento_time = 64;
        self.portamento_time_stretch = 64;
        self.portamento_threshold = 3;
        self.portamento_threshold_type = 1;
        self.receive_portamento = true;
        self.reset_all();
        self.base.params_changed();
    }
}

/// One kit item: note range, mute, part effect routing and its AddSynth engine
pub struct KitItemParams {
    base: ParamBase,
    index: usize,
    pub enabled: bool,
    pub muted: bool,
    pub min_note: u8,
    pub max_note: u8,
    /// 0 = no part effect, n = part effect n-1
    pub effect_num: u8,
    pub add: AddSynthParams,
}

impl KitItemParams {
    pub fn new(index: usize) -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            index,
            enabled: index == 0,
            muted: false,
            min_note: 0,
            max_note: 127,
            effect_num: 0,
            add: AddSynthParams::new(),
        };
        params.defaults();
        params
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Sounds for `note` (enabled, not muted, note in range)
    pub fn plays(&self, note: u8) -> bool {
        self.enabled && !self.muted && note >= self.min_note && note <= self.max_note
    }
}

impl ParamGroup for KitItemParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        if block.kit as usize >= NUM_KIT_ITEMS {
            return None;
        }
        let first = block.kit == 0;
        let limits = match block.control {
            // le premier élément du kit reste toujours actif
            kit::ENABLE if first => Limits::int(1, 1, 1).fixed(),
            kit::ENABLE => Limits::toggle(false),
            kit::MUTE => Limits::toggle(false),
            kit::MIN_NOTE => Limits::int(0, 127, 0).fixed(),
            kit::MAX_NOTE => Limits::int(0, 127, 127).fixed(),
            kit::EFFECT_NUM => Limits::int(0, NUM_PART_EFX as i32, 0).fixed(),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let value = match block.control {
            kit::ENABLE => self.enabled as u8,
            kit::MUTE => self.muted as u8,
            kit::MIN_NOTE => self.min_note,
            kit::MAX_NOTE => self.max_note,
            kit::EFFECT_NUM => self.effect_num,
            _ => return None,
        };
        Some(value as f32)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        match block.control {
            kit::ENABLE => self.enabled = self.index == 0 || value >= 0.5,
            kit::MUTE => self.muted = value >= 0.5,
            kit::MIN_NOTE => self.min_note = to_u8(value),
            kit::MAX_NOTE => self.max_note = to_u8(value),
            kit::EFFECT_NUM => self.effect_num = to_u8(value),
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.enabled = self.index == 0;
        self.muted = false;
        self.min_note = 0;
        self.max_note = 127;
        self.effect_num = 0;
        self.add.defaults();
        self.base.params_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::command::LimitRequest;
    use crate::messaging::controls::insert;

    #[test]
    fn test_volume_curve() {
        assert!((volume_to_gain(96.0) - 1.0).abs() < 1e-6);
        assert!(volume_to_gain(0.0) < 0.011);
        assert!(volume_to_gain(127.0) > 1.0);
    }

    #[test]
    fn test_pan_law() {
        let (l, r) = pan_gains(64);
        assert!((l - r).abs() < 0.02);
        let (l, r) = pan_gains(1);
        assert!((l - 1.0).abs() < 1e-6);
        assert!(r.abs() < 1e-6);
    }

    #[test]
    fn test_part_defaults_depend_on_number() {
        let block = CommandBlock::limits(part::ENABLE, 0, LimitRequest::Default);
        assert_eq!(PartParams::limits(&block).unwrap().def, 1.0);
        let block = CommandBlock::limits(part::MIDI_CHANNEL, 17, LimitRequest::Default);
        assert_eq!(PartParams::limits(&block).unwrap().def, 1.0);

        let params = PartParams::new(3);
        assert!(!params.enabled);
        assert_eq!(params.midi_channel, 3);
    }

    #[test]
    fn test_controller_limits() {
        let block = CommandBlock::limits(part::PITCH_WHEEL_RANGE, 0, LimitRequest::Minimum);
        let limits = ControllerParams::limits(&block).unwrap();
        assert_eq!(limits.min, -6400.0);
        assert!(limits.learnable);

        let block = CommandBlock::limits(part::VOLUME_RANGE, 0, LimitRequest::Default);
        let limits = ControllerParams::limits(&block).unwrap();
        assert_eq!((limits.min, limits.def), (64.0, 96.0));
        assert!(!limits.learnable);

        let block = CommandBlock::limits(141, 0, LimitRequest::Default);
        assert!(ControllerParams::limits(&block).is_none());
    }

    #[test]
    fn test_reset_all_controllers_is_a_write() {
        let mut params = ControllerParams::new();
        params.set_sustain(127);
        params.set_mod_wheel(127);
        assert!(params.sustain);
        assert!(params.apply(&CommandBlock::write(part::RESET_ALL_CONTROLLERS, 0, 0.0)));
        assert!(!params.sustain);
        assert_eq!(params.mod_wheel, 0.0);
    }

    #[test]
    fn test_first_kit_item_cannot_be_disabled() {
        let block = CommandBlock::limits(kit::ENABLE, 0, LimitRequest::Minimum)
            .with_kit(0)
            .with_insert(insert::KIT_GROUP);
        assert_eq!(KitItemParams::limits(&block).unwrap().min, 1.0);

        let mut item = KitItemParams::new(0);
        item.apply(&CommandBlock::write(kit::ENABLE, 0, 0.0));
        assert!(item.enabled);

        let mut item = KitItemParams::new(4);
        assert!(!item.plays(60));
        item.apply(&CommandBlock::write(kit::ENABLE, 0, 1.0));
        item.apply(&CommandBlock::write(kit::MAX_NOTE, 0, 50.0));
        assert!(item.plays(40));
        assert!(!item.plays(60));
    }
}
