// Envelope parameters - ADSR/ASR shapes and the free-mode point list

use super::base::ParamBase;
use super::limits::Limits;
use super::{ParamGroup, to_u8};
use crate::messaging::command::CommandBlock;
use crate::messaging::controls::{envelope, insert_type};

pub const MAX_ENVELOPE_POINTS: usize = 40;
pub const MIN_ENVELOPE_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Amplitude,
    Frequency,
    Filter,
}

impl EnvelopeKind {
    pub fn from_parameter(parameter: u8) -> Option<Self> {
        match parameter {
            insert_type::AMPLITUDE => Some(EnvelopeKind::Amplitude),
            insert_type::FREQUENCY => Some(EnvelopeKind::Frequency),
            insert_type::FILTER => Some(EnvelopeKind::Filter),
            _ => None,
        }
    }
}

/// Default values per kind, in control order
struct Shape {
    a_val: u8,
    a_dt: u8,
    d_val: u8,
    d_dt: u8,
    s_val: u8,
    r_dt: u8,
    r_val: u8,
    stretch: u8,
    forced_release: bool,
}

const AMP_SHAPE: Shape = Shape {
    a_val: 64,
    a_dt: 0,
    d_val: 64,
    d_dt: 40,
    s_val: 127,
    r_dt: 25,
    r_val: 64,
    stretch: 64,
    forced_release: true,
};

const FREQ_SHAPE: Shape = Shape {
    a_val: 64,
    a_dt: 50,
    d_val: 64,
    d_dt: 10,
    s_val: 64,
    r_dt: 60,
    r_val: 64,
    stretch: 0,
    forced_release: false,
};

const FILTER_SHAPE: Shape = Shape {
    a_val: 64,
    a_dt: 40,
    d_val: 64,
    d_dt: 70,
    s_val: 64,
    r_dt: 60,
    r_val: 64,
    stretch: 0,
    forced_release: true,
};

impl EnvelopeKind {
    fn shape(self) -> &'static Shape {
        match self {
            EnvelopeKind::Amplitude => &AMP_SHAPE,
            EnvelopeKind::Frequency => &FREQ_SHAPE,
            EnvelopeKind::Filter => &FILTER_SHAPE,
        }
    }

    /// Controls that exist for this kind in ADSR mode
    fn has_control(self, control: u8) -> bool {
        use envelope::*;
        match control {
            ATTACK_TIME | RELEASE_TIME | STRETCH | FORCED_RELEASE | ENABLE_FREE_MODE | POINTS
            | SUSTAIN_POINT => true,
            DECAY_TIME => self != EnvelopeKind::Frequency,
            SUSTAIN_LEVEL | LINEAR_ENVELOPE => self == EnvelopeKind::Amplitude,
            ATTACK_LEVEL | RELEASE_LEVEL => self != EnvelopeKind::Amplitude,
            DECAY_LEVEL => self == EnvelopeKind::Filter,
            _ => false,
        }
    }
}

pub struct EnvelopeParams {
    base: ParamBase,
    kind: EnvelopeKind,
    pub a_val: u8,
    pub a_dt: u8,
    pub d_val: u8,
    pub d_dt: u8,
    pub s_val: u8,
    pub r_dt: u8,
    pub r_val: u8,
    pub stretch: u8,
    pub forced_release: bool,
    pub linear: bool,
    pub free_mode: bool,
    point_count: usize,
    pub sustain_point: usize,
    point_dt: [u8; MAX_ENVELOPE_POINTS],
    point_val: [u8; MAX_ENVELOPE_POINTS],
}

impl EnvelopeParams {
    pub fn new(kind: EnvelopeKind) -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            kind,
            a_val: 64,
            a_dt: 10,
            d_val: 64,
            d_dt: 10,
            s_val: 64,
            r_dt: 10,
            r_val: 64,
            stretch: 64,
            forced_release: false,
            linear: false,
            free_mode: false,
            point_count: 1,
            sustain_point: 1,
            point_dt: [32; MAX_ENVELOPE_POINTS],
            point_val: [64; MAX_ENVELOPE_POINTS],
        };
        params.defaults();
        params
    }

    pub fn kind(&self) -> EnvelopeKind {
        self.kind
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// (dt, value) of point `index`
    pub fn point(&self, index: usize) -> Option<(u8, u8)> {
        (index < self.point_count).then(|| (self.point_dt[index], self.point_val[index]))
    }

    /// Segment duration in milliseconds
    pub fn dt_ms(&self, index: usize) -> f32 {
        let dt = self.point_dt.get(index).copied().unwrap_or(0);
        (2.0f32.powf(dt as f32 / 127.0 * 12.0) - 1.0) * 10.0
    }

    /// Rebuild the point list from the ADSR/ASR values
    fn convert_to_free(&mut self) {
        self.point_dt[0] = 0;
        match self.kind {
            EnvelopeKind::Amplitude => {
                self.point_count = 4;
                self.sustain_point = 2;
                self.point_val[0] = 0;
                self.point_dt[1] = self.a_dt;
                self.point_val[1] = 127;
                self.point_dt[2] = self.d_dt;
                self.point_val[2] = self.s_val;
                self.point_dt[3] = self.r_dt;
                self.point_val[3] = 0;
            }
            EnvelopeKind::Frequency => {
                self.point_count = 3;
                self.sustain_point = 1;
                self.point_val[0] = self.a_val;
                self.point_dt[1] = self.a_dt;
                self.point_val[1] = 64;
                self.point_dt[2] = self.r_dt;
                self.point_val[2] = self.r_val;
            }
            EnvelopeKind::Filter => {
                self.point_count = 4;
                self.sustain_point = 2;
                self.point_val[0] = self.a_val;
                self.point_dt[1] = self.a_dt;
                self.point_val[1] = self.d_val;
                self.point_dt[2] = self.d_dt;
                self.point_val[2] = 64;
                self.point_dt[3] = self.r_dt;
                self.point_val[3] = self.r_val;
            }
        }
    }

    /// Insert a point before `index` (free mode only); returns the new count
    pub fn add_point(&mut self, index: usize, dt: u8, value: u8) -> Option<usize> {
        if !self.free_mode
            || self.point_count >= MAX_ENVELOPE_POINTS
            || index == 0
            || index >= self.point_count
        {
            return None;
        }
        for i in (index..self.point_count).rev() {
            self.point_dt[i + 1] = self.point_dt[i];
            self.point_val[i + 1] = self.point_val[i];
        }
        self.point_dt[index] = dt;
        self.point_val[index] = value;
        self.point_count += 1;
        if index <= self.sustain_point {
            self.sustain_point += 1;
        }
        self.base.params_changed();
        Some(self.point_count)
    }

    /// Remove an inner point (free mode only); returns the new count
    pub fn delete_point(&mut self, index: usize) -> Option<usize> {
        if !self.free_mode
            || self.point_count <= MIN_ENVELOPE_POINTS
            || index == 0
            || index >= self.point_count - 1
        {
            return None;
        }
        for i in index..self.point_count - 1 {
            self.point_dt[i] = self.point_dt[i + 1];
            self.point_val[i] = self.point_val[i + 1];
        }
        self.point_count -= 1;
        if index <= self.sustain_point && self.sustain_point > 1 {
            self.sustain_point -= 1;
        }
        self.base.params_changed();
        Some(self.point_count)
    }

    pub fn change_point(&mut self, index: usize, dt: u8, value: u8) -> bool {
        if index >= self.point_count {
            return false;
        }
        // first point has no duration
        if index > 0 {
            self.point_dt[index] = dt;
        }
        self.point_val[index] = value;
        self.base.params_changed();
        true
    }
}

impl ParamGroup for EnvelopeParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        let kind = EnvelopeKind::from_parameter(block.parameter)?;
        if !kind.has_control(block.control) {
            return None;
        }
        let shape = kind.shape();
        let limits = match block.control {
            envelope::ATTACK_LEVEL => Limits::int(0, 127, shape.a_val as i32),
            envelope::ATTACK_TIME => Limits::int(0, 127, shape.a_dt as i32),
            envelope::DECAY_LEVEL => Limits::int(0, 127, shape.d_val as i32),
            envelope::DECAY_TIME => Limits::int(0, 127, shape.d_dt as i32),
            envelope::SUSTAIN_LEVEL => Limits::int(0, 127, shape.s_val as i32),
            envelope::RELEASE_TIME => Limits::int(0, 127, shape.r_dt as i32),
            envelope::RELEASE_LEVEL => Limits::int(0, 127, shape.r_val as i32),
            envelope::STRETCH => Limits::int(0, 127, shape.stretch as i32),
            envelope::FORCED_RELEASE => Limits::toggle(shape.forced_release),
            envelope::LINEAR_ENVELOPE => Limits::toggle(false),
            envelope::ENABLE_FREE_MODE => Limits::int(0, 1, 0),
            envelope::POINTS => Limits::int(
                MIN_ENVELOPE_POINTS as i32,
                MAX_ENVELOPE_POINTS as i32,
                if kind == EnvelopeKind::Frequency { 3 } else { 4 },
            )
            .fixed(),
            envelope::SUSTAIN_POINT => Limits::int(
                0,
                MAX_ENVELOPE_POINTS as i32 - 1,
                if kind == EnvelopeKind::Frequency { 1 } else { 2 },
            )
            .fixed(),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        if !self.kind.has_control(block.control) {
            return None;
        }
        let value = match block.control {
            envelope::ATTACK_LEVEL => self.a_val,
            envelope::ATTACK_TIME => self.a_dt,
            envelope::DECAY_LEVEL => self.d_val,
            envelope::DECAY_TIME => self.d_dt,
            envelope::SUSTAIN_LEVEL => self.s_val,
            envelope::RELEASE_TIME => self.r_dt,
            envelope::RELEASE_LEVEL => self.r_val,
            envelope::STRETCH => self.stretch,
            envelope::FORCED_RELEASE => self.forced_release as u8,
            envelope::LINEAR_ENVELOPE => self.linear as u8,
            envelope::ENABLE_FREE_MODE => self.free_mode as u8,
            envelope::POINTS => self.point_count as u8,
            envelope::SUSTAIN_POINT => self.sustain_point as u8,
            _ => return None,
        };
        Some(value as f32)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        if !self.kind.has_control(block.control) {
            return false;
        }
        let value = to_u8(block.value);
        match block.control {
            envelope::ATTACK_LEVEL => self.a_val = value,
            envelope::ATTACK_TIME => self.a_dt = value,
            envelope::DECAY_LEVEL => self.d_val = value,
            envelope::DECAY_TIME => self.d_dt = value,
            envelope::SUSTAIN_LEVEL => self.s_val = value,
            envelope::RELEASE_TIME => self.r_dt = value,
            envelope::RELEASE_LEVEL => self.r_val = value,
            envelope::STRETCH => self.stretch = value,
            envelope::FORCED_RELEASE => self.forced_release = value != 0,
            envelope::LINEAR_ENVELOPE => self.linear = value != 0,
            envelope::ENABLE_FREE_MODE => self.free_mode = value != 0,
            envelope::SUSTAIN_POINT => {
                self.sustain_point = (value as usize).min(self.point_count.saturating_sub(1))
            }
            // la liste de points se modifie via les inserts dédiés
            envelope::POINTS => return false,
            _ => return false,
        }
        if !self.free_mode {
            self.convert_to_free();
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        let shape = self.kind.shape();
        self.a_val = shape.a_val;
        self.a_dt = shape.a_dt;
        self.d_val = shape.d_val;
        self.d_dt = shape.d_dt;
        self.s_val = shape.s_val;
        self.r_dt = shape.r_dt;
        self.r_val = shape.r_val;
        self.stretch = shape.stretch;
        self.forced_release = shape.forced_release;
        self.linear = false;
        self.free_mode = false;
        self.convert_to_free();
        self.base.params_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::command::LimitRequest;

    #[test]
    fn test_adsr_points() {
        let params = EnvelopeParams::new(EnvelopeKind::Amplitude);
        assert_eq!(params.point_count(), 4);
        assert_eq!(params.point(1), Some((0, 127)));
        assert_eq!(params.point(2), Some((40, 127)));
        assert_eq!(params.point(3), Some((25, 0)));
        assert_eq!(params.point(4), None);
    }

    #[test]
    fn test_kind_specific_controls() {
        let freq = CommandBlock::limits(envelope::SUSTAIN_LEVEL, 0, LimitRequest::Default)
            .with_parameter(insert_type::FREQUENCY);
        assert!(EnvelopeParams::limits(&freq).is_none());

        let filter = CommandBlock::limits(envelope::DECAY_TIME, 0, LimitRequest::Default)
            .with_parameter(insert_type::FILTER);
        assert_eq!(EnvelopeParams::limits(&filter).unwrap().def, 70.0);
    }

    #[test]
    fn test_point_editing_requires_free_mode() {
        let mut params = EnvelopeParams::new(EnvelopeKind::Amplitude);
        assert_eq!(params.add_point(1, 20, 100), None);

        params.apply(&CommandBlock::write(envelope::ENABLE_FREE_MODE, 0, 1.0));
        assert_eq!(params.add_point(1, 20, 100), Some(5));
        assert_eq!(params.point(1), Some((20, 100)));
        assert_eq!(params.sustain_point, 3);

        assert_eq!(params.delete_point(1), Some(4));
        assert_eq!(params.sustain_point, 2);
        // first and last points stay
        assert_eq!(params.delete_point(0), None);
        assert_eq!(params.delete_point(3), None);
    }

    #[test]
    fn test_minimum_point_count() {
        let mut params = EnvelopeParams::new(EnvelopeKind::Frequency);
        params.free_mode = true;
        assert_eq!(params.point_count(), MIN_ENVELOPE_POINTS);
        assert_eq!(params.delete_point(1), None);
    }
}
