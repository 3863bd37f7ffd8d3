// Filter parameters (kit item filter and the dynamic filter effect)

use super::base::ParamBase;
use super::limits::Limits;
use super::{ParamGroup, to_u8};
use crate::messaging::command::CommandBlock;
use crate::messaging::controls::filter;

/// Filter family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCategory {
    Analog,
    Formant,
    StateVariable,
}

impl From<u8> for FilterCategory {
    fn from(value: u8) -> Self {
        match value {
            1 => FilterCategory::Formant,
            2 => FilterCategory::StateVariable,
            _ => FilterCategory::Analog,
        }
    }
}

pub struct FilterParams {
    base: ParamBase,
    def_freq: f32,
    def_q: u8,
    def_type: u8,
    /// 0..127 (float), 64 is about 1 kHz
    pub center_freq: f32,
    pub q: u8,
    pub freq_tracking: u8,
    pub velocity_sense: u8,
    pub velocity_curve: u8,
    pub gain: u8,
    /// Extra stages (0 = one stage)
    pub stages: u8,
    pub category: u8,
    /// LPF1, HPF1, LPF2, HPF2, BPF2, NF2, PkF2, LSh2, HSh2
    pub analog_type: u8,
    /// LPF, HPF, BPF, NF
    pub sv_type: u8,
    pub tracking_range: bool,
}

impl FilterParams {
    pub fn new(analog_type: u8, freq: f32, q: u8) -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            def_freq: freq,
            def_q: q,
            def_type: analog_type,
            center_freq: freq,
            q,
            freq_tracking: 64,
            velocity_sense: 0,
            velocity_curve: 64,
            gain: 64,
            stages: 0,
            category: 0,
            analog_type,
            sv_type: 0,
            tracking_range: false,
        };
        params.defaults();
        params
    }

    pub fn category(&self) -> FilterCategory {
        FilterCategory::from(self.category)
    }

    /// Center frequency in Hz
    pub fn frequency_hz(&self) -> f32 {
        let octaves = (self.center_freq / 64.0 - 1.0) * 5.0;
        2.0f32.powf(octaves + 9.96578428) // 1000 Hz at 64
    }

    pub fn q_value(&self) -> f32 {
        (30.0f32.powf(self.q as f32 / 127.0) - 1.0).max(0.0) * 0.25 + 0.5
    }

    pub fn gain_db(&self) -> f32 {
        (self.gain as f32 / 64.0 - 1.0) * 30.0
    }

    /// Octaves of cutoff shift per octave above middle C
    pub fn tracking(&self) -> f32 {
        let range = if self.tracking_range { 2.0 } else { 1.0 };
        (self.freq_tracking as f32 - 64.0) / 64.0 * range
    }

    /// Record direct field edits made outside `apply`
    pub fn params_changed(&mut self) {
        self.base.params_changed();
    }

    /// Restore the defaults this group was created with
    pub fn set_defaults(&mut self, analog_type: u8, freq: f32, q: u8) {
        self.def_type = analog_type;
        self.def_freq = freq;
        self.def_q = q;
        self.defaults();
    }
}

impl ParamGroup for FilterParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        let limits = match block.control {
            filter::CENTER_FREQUENCY => Limits::float(0.0, 127.0, 94.0),
            filter::Q => Limits::int(0, 127, 40),
            filter::FREQUENCY_TRACKING | filter::VELOCITY_CURVE | filter::GAIN => {
                Limits::int(0, 127, 64)
            }
            filter::VELOCITY_SENSITIVITY => Limits::int(0, 127, 0),
            filter::STAGES => Limits::int(0, 4, 0).fixed(),
            filter::BASE_TYPE => Limits::int(0, 2, 0).fixed(),
            filter::ANALOG_TYPE => Limits::int(0, 8, 2).fixed(),
            filter::STATE_VARIABLE_TYPE => Limits::int(0, 3, 0).fixed(),
            filter::FREQUENCY_TRACKING_RANGE => Limits::toggle(false),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let value = match block.control {
            filter::CENTER_FREQUENCY => self.center_freq,
            filter::Q => self.q as f32,
            filter::FREQUENCY_TRACKING => self.freq_tracking as f32,
            filter::VELOCITY_SENSITIVITY => self.velocity_sense as f32,
            filter::VELOCITY_CURVE => self.velocity_curve as f32,
            filter::GAIN => self.gain as f32,
            filter::STAGES => self.stages as f32,
            filter::BASE_TYPE => self.category as f32,
            filter::ANALOG_TYPE => self.analog_type as f32,
            filter::STATE_VARIABLE_TYPE => self.sv_type as f32,
            filter::FREQUENCY_TRACKING_RANGE => self.tracking_range as u8 as f32,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        match block.control {
            filter::CENTER_FREQUENCY => self.center_freq = value,
            filter::Q => self.q = to_u8(value),
            filter::FREQUENCY_TRACKING => self.freq_tracking = to_u8(value),
            filter::VELOCITY_SENSITIVITY => self.velocity_sense = to_u8(value),
            filter::VELOCITY_CURVE => self.velocity_curve = to_u8(value),
            filter::GAIN => self.gain = to_u8(value),
            filter::STAGES => self.stages = to_u8(value),
            filter::BASE_TYPE => self.category = to_u8(value),
            filter::ANALOG_TYPE => self.analog_type = to_u8(value),
            filter::STATE_VARIABLE_TYPE => self.sv_type = to_u8(value),
            filter::FREQUENCY_TRACKING_RANGE => self.tracking_range = value >= 0.5,
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.center_freq = self.def_freq;
        self.q = self.def_q;
        self.analog_type = self.def_type;
        self.freq_tracking = 64;
        self.velocity_sense = 0;
        self.velocity_curve = 64;
        self.gain = 64;
        self.stages = 0;
        self.category = 0;
        self.sv_type = 0;
        self.tracking_range = false;
        self.base.params_changed();
    }
}
