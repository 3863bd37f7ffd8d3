// Filter - biquad and state variable sections, plus the per-voice consumer
//
// `Filter` is bound to one FilterParams group and only recomputes its
// coefficients when that group reports a change through its ParamsUpdate.
//
// References:
// - Robert Bristow-Johnson, "Audio EQ Cookbook"
// - Hal Chamberlin, "Musical Applications of Microprocessors" (1985)

use crate::params::ParamGroup;
use crate::params::base::ParamsUpdate;
use crate::params::filter::{FilterCategory, FilterParams};
use std::f32::consts::PI;

/// Maximum number of cascaded sections
pub const MAX_FILTER_STAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiquadKind {
    Lpf1,
    Hpf1,
    #[default]
    Lpf2,
    Hpf2,
    Bpf2,
    Notch2,
    Peak2,
    LowShelf2,
    HighShelf2,
}

impl From<u8> for BiquadKind {
    fn from(value: u8) -> Self {
        match value {
            0 => BiquadKind::Lpf1,
            1 => BiquadKind::Hpf1,
            3 => BiquadKind::Hpf2,
            4 => BiquadKind::Bpf2,
            5 => BiquadKind::Notch2,
            6 => BiquadKind::Peak2,
            7 => BiquadKind::LowShelf2,
            8 => BiquadKind::HighShelf2,
            _ => BiquadKind::Lpf2,
        }
    }
}

/// One normalised second order section (transposed direct form II)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        // passe-tout
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }
}

impl Biquad {
    pub fn new(kind: BiquadKind, freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let mut biquad = Self::default();
        biquad.set(kind, freq, q, gain_db, sample_rate);
        biquad
    }

    pub fn set(&mut self, kind: BiquadKind, freq: f32, q: f32, gain_db: f32, sample_rate: f32) {
        let freq = freq.clamp(10.0, sample_rate * 0.49);
        let q = q.max(0.01);

        if matches!(kind, BiquadKind::Lpf1 | BiquadKind::Hpf1) {
            let k = (PI * freq / sample_rate).tan();
            let a1 = (k - 1.0) / (k + 1.0);
            let (b0, b1) = if kind == BiquadKind::Lpf1 {
                (k / (1.0 + k), k / (1.0 + k))
            } else {
                (1.0 / (1.0 + k), -1.0 / (1.0 + k))
            };
            self.b0 = b0;
            self.b1 = b1;
            self.b2 = 0.0;
            self.a1 = a1;
            self.a2 = 0.0;
            return;
        }

        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let a = 10.0f32.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            BiquadKind::Hpf2 => (
                (1.0 + cos) / 2.0,
                -(1.0 + cos),
                (1.0 + cos) / 2.0,
                1.0 + alpha,
                -2.0 * cos,
                1.0 - alpha,
            ),
            BiquadKind::Bpf2 => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha),
            BiquadKind::Notch2 => (1.0, -2.0 * cos, 1.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha),
            BiquadKind::Peak2 => (
                1.0 + alpha * a,
                -2.0 * cos,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos,
                1.0 - alpha / a,
            ),
            BiquadKind::LowShelf2 => {
                let sq = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos + sq),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                    a * ((a + 1.0) - (a - 1.0) * cos - sq),
                    (a + 1.0) + (a - 1.0) * cos + sq,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                    (a + 1.0) + (a - 1.0) * cos - sq,
                )
            }
            BiquadKind::HighShelf2 => {
                let sq = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos + sq),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                    a * ((a + 1.0) + (a - 1.0) * cos - sq),
                    (a + 1.0) - (a - 1.0) * cos + sq,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos),
                    (a + 1.0) - (a - 1.0) * cos - sq,
                )
            }
            _ => (
                (1.0 - cos) / 2.0,
                1.0 - cos,
                (1.0 - cos) / 2.0,
                1.0 + alpha,
                -2.0 * cos,
                1.0 - alpha,
            ),
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Magnitude response at `freq`
    pub fn response(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * freq / sample_rate;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SvfMode {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl From<u8> for SvfMode {
    fn from(value: u8) -> Self {
        match value {
            1 => SvfMode::HighPass,
            2 => SvfMode::BandPass,
            3 => SvfMode::Notch,
            _ => SvfMode::LowPass,
        }
    }
}

/// Chamberlin state variable filter (12 dB/oct)
#[derive(Debug, Clone, Copy, Default)]
pub struct StateVariableFilter {
    mode: SvfMode,
    low: f32,
    band: f32,
    f: f32,
    q: f32,
}

impl StateVariableFilter {
    pub fn set(&mut self, mode: SvfMode, cutoff: f32, resonance: f32, sample_rate: f32) {
        self.mode = mode;
        // stable jusqu'à ~Fs/6
        let cutoff = cutoff.clamp(20.0, sample_rate / 6.0);
        self.f = 2.0 * (PI * cutoff / sample_rate).sin();
        self.q = (1.0 / resonance.clamp(0.5, 20.0)).clamp(0.01, 2.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let high = input - self.low - self.q * self.band;
        self.band += self.f * high;
        self.low += self.f * self.band;
        match self.mode {
            SvfMode::LowPass => self.low,
            SvfMode::HighPass => high,
            SvfMode::BandPass => self.band,
            SvfMode::Notch => input - self.q * self.band,
        }
    }

    pub fn reset(&mut self) {
        self.low = 0.0;
        self.band = 0.0;
    }
}

/// Filter driven by a FilterParams group
pub struct Filter {
    update: ParamsUpdate,
    sample_rate: f32,
    category: FilterCategory,
    analog: BiquadKind,
    svf: SvfMode,
    stages: usize,
    q: f32,
    gain_db: f32,
    base_freq: f32,
    biquads: [Biquad; MAX_FILTER_STAGES],
    svfs: [StateVariableFilter; MAX_FILTER_STAGES],
    recomputes: u64,
}

impl Filter {
    pub fn new(params: &FilterParams, sample_rate: f32) -> Self {
        let mut filter = Self {
            update: ParamsUpdate::stale(params.base()),
            sample_rate,
            category: FilterCategory::Analog,
            analog: BiquadKind::default(),
            svf: SvfMode::default(),
            stages: 1,
            q: 0.707,
            gain_db: 0.0,
            base_freq: 1000.0,
            biquads: [Biquad::default(); MAX_FILTER_STAGES],
            svfs: [StateVariableFilter::default(); MAX_FILTER_STAGES],
            recomputes: 0,
        };
        filter.update(params);
        filter
    }

    /// Pick up parameter changes; true when the coefficients were rebuilt
    pub fn update(&mut self, params: &FilterParams) -> bool {
        if !self.update.check_updated(params.base()) {
            return false;
        }
        self.category = params.category();
        self.analog = BiquadKind::from(params.analog_type);
        self.svf = SvfMode::from(params.sv_type);
        self.stages = (params.stages as usize + 1).min(MAX_FILTER_STAGES);
        self.q = params.q_value();
        self.gain_db = params.gain_db();
        self.base_freq = params.frequency_hz();
        self.set_frequency(self.base_freq);
        self.recomputes += 1;
        true
    }

    /// Rebind to another parameter group (voice reuse)
    pub fn rebind(&mut self, params: &FilterParams) {
        self.update.change_params(params.base());
        self.update(params);
    }

    pub fn base_frequency(&self) -> f32 {
        self.base_freq
    }

    /// Coefficient rebuilds caused by parameter changes
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    /// Move the cutoff without touching the other settings (modulation)
    pub fn set_frequency(&mut self, freq: f32) {
        for stage in 0..self.stages {
            match self.category {
                FilterCategory::StateVariable => {
                    self.svfs[stage].set(self.svf, freq, self.q, self.sample_rate)
                }
                // formant banks are rendered as a single band-pass per stage
                FilterCategory::Formant => self.biquads[stage].set(
                    BiquadKind::Bpf2,
                    freq,
                    self.q,
                    0.0,
                    self.sample_rate,
                ),
                FilterCategory::Analog => self.biquads[stage].set(
                    self.analog,
                    freq,
                    self.q,
                    self.gain_db,
                    self.sample_rate,
                ),
            }
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut x = input;
        match self.category {
            FilterCategory::StateVariable => {
                for svf in &mut self.svfs[..self.stages] {
                    x = svf.process(x);
                }
            }
            _ => {
                for biquad in &mut self.biquads[..self.stages] {
                    x = biquad.process(x);
                }
            }
        }
        x
    }

    pub fn process_buffer(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn reset(&mut self) {
        for biquad in &mut self.biquads {
            biquad.reset();
        }
        for svf in &mut self.svfs {
            svf.reset();
        }
    }
}
