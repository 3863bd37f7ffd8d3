// Envelope generator of a voice
//
// Walks the point list of its EnvelopeParams one buffer at a time. Point
// times and values are copied out of the parameter group only when it
// reports a change.

use crate::params::ParamGroup;
use crate::params::base::ParamsUpdate;
use crate::params::envelope::{EnvelopeKind, EnvelopeParams, MAX_ENVELOPE_POINTS};

/// Amplitude range of the logarithmic curve
const AMPLITUDE_RANGE_DB: f32 = 40.0;

/// State of the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    /// No note is playing
    Idle,
    /// Moving towards the sustain point
    Running,
    /// Holding at the sustain point
    Sustaining,
    /// Note released, heading for the last point
    Releasing,
    /// Last point reached
    Finished,
}

pub struct Envelope {
    update: ParamsUpdate,
    sample_rate: f32,
    buffer_size: usize,

    kind: EnvelopeKind,
    linear: bool,
    forced_release: bool,
    stretch: f32,
    count: usize,
    sustain: usize,
    /// Segment length in seconds, index = segment end point
    dt: [f32; MAX_ENVELOPE_POINTS],
    val: [f32; MAX_ENVELOPE_POINTS],

    state: EnvelopeState,
    note_freq: f32,
    segment: usize,
    from: f32,
    t: f32,
    current: f32,
    recomputes: u64,
}

impl Envelope {
    pub fn new(params: &EnvelopeParams, sample_rate: f32, buffer_size: usize) -> Self {
        let mut envelope = Self {
            update: ParamsUpdate::stale(params.base()),
            sample_rate,
            buffer_size: buffer_size.max(1),
            kind: params.kind(),
            linear: false,
            forced_release: false,
            stretch: 0.0,
            count: 0,
            sustain: 0,
            dt: [0.0; MAX_ENVELOPE_POINTS],
            val: [0.0; MAX_ENVELOPE_POINTS],
            state: EnvelopeState::Idle,
            note_freq: 440.0,
            segment: 1,
            from: 0.0,
            t: 0.0,
            current: 0.0,
            recomputes: 0,
        };
        envelope.update(params);
        envelope
    }

    /// Point at another parameter group (voice reuse)
    pub fn rebind(&mut self, params: &EnvelopeParams) {
        self.update.change_params(params.base());
        self.update(params);
    }

    /// Copy the point list if the parameters changed
    pub fn update(&mut self, params: &EnvelopeParams) -> bool {
        if !self.update.check_updated(params.base()) {
            return false;
        }
        self.kind = params.kind();
        self.linear = params.linear;
        self.forced_release = params.forced_release;
        self.stretch = params.stretch as f32 / 64.0;
        self.count = params.point_count().clamp(1, MAX_ENVELOPE_POINTS);
        self.sustain = params.sustain_point.min(self.count - 1);
        for i in 0..self.count {
            let (_, value) = params.point(i).unwrap_or((0, 64));
            self.dt[i] = params.dt_ms(i) / 1000.0;
            self.val[i] = value as f32;
        }
        if self.segment >= self.count && self.state != EnvelopeState::Idle {
            self.state = EnvelopeState::Finished;
            self.current = self.val[self.count - 1];
        }
        self.recomputes += 1;
        true
    }

    pub fn note_on(&mut self, note_freq: f32) {
        self.note_freq = note_freq.max(1.0);
        self.state = EnvelopeState::Running;
        self.segment = 1;
        self.from = self.val[0];
        self.current = self.val[0];
        self.t = 0.0;
        if self.count < 2 {
            self.state = EnvelopeState::Finished;
        }
    }

    pub fn note_off(&mut self) {
        match self.state {
            EnvelopeState::Idle | EnvelopeState::Finished | EnvelopeState::Releasing => {}
            _ => {
                self.state = EnvelopeState::Releasing;
                if self.sustain == 0 {
                    return;
                }
                if self.forced_release || self.segment > self.sustain {
                    if self.segment <= self.sustain {
                        self.segment = self.sustain + 1;
                        self.from = self.current;
                        self.t = 0.0;
                    }
                    if self.segment >= self.count {
                        self.state = EnvelopeState::Finished;
                    }
                }
            }
        }
    }

    /// Buffers needed to cross `segment`
    fn segment_step(&self, segment: usize) -> f32 {
        let stretch = (440.0 / self.note_freq).powf(self.stretch);
        let seconds = self.dt[segment] * stretch;
        let buffer_seconds = self.buffer_size as f32 / self.sample_rate;
        if seconds <= buffer_seconds * 0.5 {
            1.0
        } else {
            buffer_seconds / seconds
        }
    }

    /// Raw point-domain value (0..127) for this buffer, then advance
    fn advance(&mut self) -> f32 {
        match self.state {
            EnvelopeState::Idle => return self.val[0],
            EnvelopeState::Finished | EnvelopeState::Sustaining => return self.current,
            EnvelopeState::Running | EnvelopeState::Releasing => {}
        }
        let released = self.state == EnvelopeState::Releasing;
        if self.sustain > 0 && self.segment == self.sustain + 1 && !released {
            self.state = EnvelopeState::Sustaining;
            return self.current;
        }

        self.t += self.segment_step(self.segment);
        if self.t >= 1.0 {
            self.current = self.val[self.segment];
            self.from = self.current;
            self.t = 0.0;
            self.segment += 1;
            if self.segment >= self.count {
                self.state = EnvelopeState::Finished;
            } else if self.sustain > 0 && self.segment == self.sustain + 1 && !released {
                self.state = EnvelopeState::Sustaining;
            }
        } else {
            self.current = self.from + (self.val[self.segment] - self.from) * self.t;
        }
        self.current
    }

    /// Envelope value for this buffer in the unit of its kind:
    /// linear gain for amplitude, octaves for frequency and filter
    pub fn out(&mut self) -> f32 {
        let raw = self.advance();
        match self.kind {
            EnvelopeKind::Amplitude => {
                if self.linear {
                    raw / 127.0
                } else if raw <= 0.0 {
                    0.0
                } else {
                    10.0f32.powf((raw / 127.0 - 1.0) * AMPLITUDE_RANGE_DB / 20.0)
                }
            }
            EnvelopeKind::Frequency => {
                let x = (raw - 64.0) / 64.0;
                (2.0f32.powf(x.abs() * 6.0) - 1.0).copysign(x) / 12.0
            }
            EnvelopeKind::Filter => (raw - 64.0) / 64.0 * 4.0,
        }
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn finished(&self) -> bool {
        self.state == EnvelopeState::Finished
    }

    pub fn is_releasing(&self) -> bool {
        matches!(
            self.state,
            EnvelopeState::Releasing | EnvelopeState::Finished
        )
    }

    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }
}
