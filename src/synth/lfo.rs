// LFO (Low Frequency Oscillator) of a voice
//
// Evaluated once per buffer. Speed, depth and shape come from the bound
// LfoParams and are only recomputed when that group reports a change.

use crate::params::ParamGroup;
use crate::params::base::ParamsUpdate;
use crate::params::lfo::{LfoKind, LfoParams, LfoShape};
use rand::Rng;
use std::f32::consts::TAU;

/// Longest LFO delay in seconds
const MAX_DELAY_SECONDS: f32 = 4.0;

pub struct Lfo {
    update: ParamsUpdate,
    sample_rate: f32,
    buffer_size: usize,

    kind: LfoKind,
    shape: LfoShape,
    /// Output scale in the unit of the destination
    depth: f32,
    incx: f32,
    phase: f32,
    start_phase: u8,
    continuous: bool,
    stretch: f32,
    amp_randomness: f32,
    freq_randomness: f32,
    delay_buffers: u32,

    note_freq: f32,
    delay_left: u32,
    amp1: f32,
    amp2: f32,
    incrnd: f32,
    recomputes: u64,
}

impl Lfo {
    pub fn new(params: &LfoParams, sample_rate: f32, buffer_size: usize) -> Self {
        let mut lfo = Self {
            update: ParamsUpdate::stale(params.base()),
            sample_rate,
            buffer_size: buffer_size.max(1),
            kind: params.kind(),
            shape: LfoShape::Sine,
            depth: 0.0,
            incx: 0.0,
            phase: 0.0,
            start_phase: 64,
            continuous: false,
            stretch: 1.0,
            amp_randomness: 0.0,
            freq_randomness: 0.0,
            delay_buffers: 0,
            note_freq: 440.0,
            delay_left: 0,
            amp1: 1.0,
            amp2: 1.0,
            incrnd: 1.0,
            recomputes: 0,
        };
        lfo.update(params);
        lfo
    }

    /// Point at another parameter group (voice reuse)
    pub fn rebind(&mut self, params: &LfoParams) {
        self.update.change_params(params.base());
        self.update(params);
    }

    /// Pick up parameter changes; true when something was recomputed
    pub fn update(&mut self, params: &LfoParams) -> bool {
        if !self.update.check_updated(params.base()) {
            return false;
        }
        self.kind = params.kind();
        self.shape = LfoShape::from(params.shape);
        let intensity = params.depth as f32 / 127.0;
        self.depth = match self.kind {
            LfoKind::Amplitude => intensity,
            // en cents, ramené en octaves
            LfoKind::Frequency => (2.0f32.powf(intensity * 11.0) - 1.0) / 1200.0,
            LfoKind::Filter => intensity * 4.0,
        };
        self.start_phase = params.start_phase;
        self.continuous = params.continuous;
        self.stretch = (params.stretch as f32 - 64.0) / 63.0;
        self.amp_randomness = params.amp_randomness as f32 / 127.0;
        self.freq_randomness = params.freq_randomness as f32 / 127.0;
        let buffer_seconds = self.buffer_size as f32 / self.sample_rate;
        self.delay_buffers =
            (params.delay as f32 / 127.0 * MAX_DELAY_SECONDS / buffer_seconds) as u32;
        self.recompute_speed(params.frequency());
        self.recomputes += 1;
        true
    }

    fn recompute_speed(&mut self, frequency: f32) {
        let stretch = (self.note_freq / 440.0).powf(self.stretch);
        self.incx = (frequency * stretch * self.buffer_size as f32 / self.sample_rate)
            .abs()
            .min(0.499);
    }

    /// Restart for a new note at `note_freq` Hz
    pub fn note_on<R: Rng>(&mut self, params: &LfoParams, note_freq: f32, rng: &mut R) {
        self.note_freq = note_freq.max(1.0);
        self.recompute_speed(params.frequency());
        if !self.continuous {
            self.phase = if self.start_phase == 0 {
                rng.r#gen::<f32>()
            } else {
                ((self.start_phase as f32 - 64.0) / 127.0 + 1.0).rem_euclid(1.0)
            };
        }
        self.delay_left = self.delay_buffers;
        self.amp1 = 1.0 - self.amp_randomness * rng.r#gen::<f32>();
        self.amp2 = 1.0 - self.amp_randomness * rng.r#gen::<f32>();
        self.incrnd = 1.0;
    }

    fn shape_value(&self, x: f32) -> f32 {
        match self.shape {
            LfoShape::Sine => (x * TAU).cos(),
            LfoShape::Triangle => {
                if x < 0.25 {
                    x * 4.0
                } else if x < 0.75 {
                    2.0 - x * 4.0
                } else {
                    x * 4.0 - 4.0
                }
            }
            LfoShape::Square => {
                if x < 0.5 {
                    -1.0
                } else {
                    1.0
                }
            }
            LfoShape::RampUp => (x - 0.5) * 2.0,
            LfoShape::RampDown => (0.5 - x) * 2.0,
            LfoShape::Exp1 => 0.05f32.powf(x) * 2.0 - 1.0,
            LfoShape::Exp2 => 0.001f32.powf(x) * 2.0 - 1.0,
        }
    }

    /// Value for the current buffer, then advance one buffer
    pub fn out<R: Rng>(&mut self, rng: &mut R) -> f32 {
        if self.delay_left > 0 {
            self.delay_left -= 1;
            return 0.0;
        }
        let mut out = self.shape_value(self.phase) * self.depth;
        if self.kind == LfoKind::Amplitude {
            // tremolo stays on the positive side
            out = (out + self.depth) * 0.5;
        }
        out *= self.amp1 + (self.amp2 - self.amp1) * self.phase;

        self.phase += self.incx * self.incrnd;
        if self.phase >= 1.0 {
            self.phase = self.phase.fract();
            self.amp1 = self.amp2;
            self.amp2 = 1.0 - self.amp_randomness * rng.r#gen::<f32>();
            self.incrnd = 2.0f32.powf((rng.r#gen::<f32>() * 2.0 - 1.0) * self.freq_randomness);
        }
        out
    }

    pub fn kind(&self) -> LfoKind {
        self.kind
    }

    /// Parameter pick-ups since construction
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::command::CommandBlock;
    use crate::messaging::controls::{insert_type, lfo};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TEST_SAMPLE_RATE: f32 = 48000.0;

    fn write(params: &mut LfoParams, control: u8, value: f32) {
        let block = CommandBlock::write(control, 0, value).with_parameter(insert_type::FREQUENCY);
        assert!(params.apply(&block));
    }

    #[test]
    fn test_zero_depth_is_silent() {
        let params = LfoParams::new(LfoKind::Frequency);
        let mut rng = StdRng::seed_from_u64(1);
        let mut lfo = Lfo::new(&params, TEST_SAMPLE_RATE, 256);
        lfo.note_on(&params, 440.0, &mut rng);
        for _ in 0..100 {
            assert_eq!(lfo.out(&mut rng), 0.0);
        }
    }

    #[test]
    fn test_output_stays_within_depth() {
        let mut params = LfoParams::new(LfoKind::Filter);
        params.depth = 127;
        params.speed = 0.8;
        let mut rng = StdRng::seed_from_u64(7);
        let mut lfo = Lfo::new(&params, TEST_SAMPLE_RATE, 128);
        lfo.note_on(&params, 220.0, &mut rng);
        for _ in 0..2000 {
            let value = lfo.out(&mut rng);
            assert!((-4.0..=4.0).contains(&value), "LFO value {value} out of range");
        }
    }

    #[test]
    fn test_edits_are_picked_up_once() {
        let mut params = LfoParams::new(LfoKind::Frequency);
        let mut lfo = Lfo::new(&params, TEST_SAMPLE_RATE, 256);
        assert_eq!(lfo.recomputes(), 1);
        assert!(!lfo.update(&params));

        write(&mut params, lfo::DEPTH, 40.0);
        write(&mut params, lfo::SPEED, 0.3);
        assert!(lfo.update(&params));
        assert!(!lfo.update(&params));
        assert_eq!(lfo.recomputes(), 2);
    }

    #[test]
    fn test_delay_holds_the_output() {
        let mut params = LfoParams::new(LfoKind::Amplitude);
        params.depth = 127;
        params.delay = 127;
        let mut rng = StdRng::seed_from_u64(3);
        let mut lfo = Lfo::new(&params, 44100.0, 441);
        lfo.note_on(&params, 440.0, &mut rng);
        // 4 s of 10 ms buffers
        for _ in 0..399 {
            assert_eq!(lfo.out(&mut rng), 0.0);
        }
    }

    #[test]
    fn test_rebind_forces_a_recompute() {
        let first = LfoParams::new(LfoKind::Amplitude);
        let second = LfoParams::new(LfoKind::Filter);
        let mut lfo = Lfo::new(&first, TEST_SAMPLE_RATE, 256);
        lfo.rebind(&second);
        assert_eq!(lfo.kind(), LfoKind::Filter);
        assert_eq!(lfo.recomputes(), 2);
        // same group again: nothing to do
        lfo.rebind(&second);
        assert_eq!(lfo.recomputes(), 2);
    }
}
