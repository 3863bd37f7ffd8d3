// Reverb - Freeverb-style reverb effect
//
// This module implements the reverb based on the Freeverb algorithm
// by Jezar at Dreampoint (public domain).
//
// Architecture:
// - Initial delay with feedback in front of the tank
// - Optional low-pass / high-pass on the (mono) input
// - 8 parallel comb filters per channel, damped in the feedback loop
// - 4 series allpass filters per channel
//
// Real-time constraints:
// - Input buffer and initial delay are sized at creation
// - Comb and allpass lines are only resized when the type or room size
//   changes; plain parameter moves never allocate

use super::core::{EffectCore, VolumeCurve};
use super::{Effect, EffectKind};
use crate::audio::dsp_utils::InterpolatedValue;
use crate::params::limits::{DEFAULT_LIMITS, Limits};
use crate::synth::filter::{Biquad, BiquadKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const REV_COMBS: usize = 8;
const REV_APS: usize = 4;

/// Longest initial delay: (50)^2 - 1 ms
const MAX_IDELAY_MS: f32 = 2499.0;

const COMB_TUNINGS: [usize; REV_COMBS] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNINGS: [usize; REV_APS] = [225, 341, 441, 556];

pub static PRESETS: &[&[u8]] = &[
    // Cathedral1
    &[80, 64, 63, 24, 0, 0, 0, 85, 5, 83, 1, 64, 20],
    // Cathedral2
    &[80, 64, 69, 35, 0, 0, 0, 127, 0, 71, 0, 64, 20],
    // Cathedral3
    &[80, 64, 69, 24, 0, 0, 0, 127, 75, 78, 1, 85, 20],
    // Hall1
    &[90, 64, 51, 10, 0, 0, 0, 127, 21, 78, 1, 64, 20],
    // Hall2
    &[90, 64, 53, 20, 0, 0, 0, 127, 75, 71, 1, 64, 20],
    // Room1
    &[100, 64, 33, 0, 0, 0, 0, 127, 0, 106, 0, 30, 20],
    // Room2
    &[100, 64, 21, 26, 0, 0, 0, 62, 0, 77, 1, 45, 20],
    // Basement
    &[110, 64, 14, 0, 0, 0, 0, 127, 5, 71, 0, 25, 20],
    // Tunnel
    &[85, 80, 84, 20, 42, 0, 0, 51, 0, 78, 1, 105, 20],
    // Echoed1
    &[95, 64, 26, 60, 71, 0, 0, 114, 0, 64, 1, 64, 20],
    // Echoed2
    &[90, 64, 40, 88, 71, 0, 0, 114, 0, 88, 1, 64, 20],
    // VeryLong1
    &[90, 64, 93, 15, 0, 0, 0, 114, 0, 77, 0, 95, 20],
    // VeryLong2
    &[90, 64, 111, 30, 0, 0, 0, 114, 90, 74, 1, 80, 20],
];

pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        0..=4 | 7 | 8 | 12 | 16 => DEFAULT_LIMITS,
        9 => Limits::int(64, 127, 0),
        10 => Limits::int(0, 2, 0).fixed(),
        11 => DEFAULT_LIMITS.fixed(),
        _ => return None,
    };
    Some(limits)
}

/// Comb filter with damping in the feedback path
struct CombFilter {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    lowpass: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            index: 0,
            feedback: -0.97,
            lowpass: 0.0,
        }
    }

    fn resize(&mut self, length: usize) {
        self.buffer.resize(length, 0.0);
        self.mute();
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    fn process(&mut self, input: f32, damp: f32) -> f32 {
        let mut fbout = self.buffer[self.index] * self.feedback;
        fbout = fbout * (1.0 - damp) + self.lowpass * damp;
        self.lowpass = fbout;
        self.buffer[self.index] = input + fbout;
        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }
        fbout
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
        self.lowpass = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    index: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            index: 0,
        }
    }

    fn resize(&mut self, length: usize) {
        self.buffer.resize(length, 0.0);
        self.mute();
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let bufout = self.buffer[self.index];
        self.buffer[self.index] = 0.7 * bufout + input;
        let output = bufout - 0.7 * self.buffer[self.index];
        self.index += 1;
        if self.index >= self.buffer.len() {
            self.index = 0;
        }
        // petit biais DC contre les dénormaux
        output + 1e-20
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
        self.index = 0;
    }
}

pub struct Reverb {
    core: EffectCore,
    p_time: u8,
    p_idelay: u8,
    p_idelayfb: u8,
    p_lpf: u8,
    p_hpf: u8,
    p_lohidamp: u8,
    p_type: u8,
    p_roomsize: u8,
    p_bandwidth: u8,

    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
    lohifb: f32,
    roomsize: f32,
    rs: f32,

    idelay: Vec<f32>,
    idelay_len: usize,
    idelay_pos: usize,
    idelayfb: f32,

    lpf: Option<Biquad>,
    hpf: Option<Biquad>,
    lpf_freq: InterpolatedValue,
    hpf_freq: InterpolatedValue,

    input: Vec<f32>,
    rng: StdRng,
}

impl Reverb {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(0x5245_5642);
        let combs = (0..REV_COMBS * 2)
            .map(|_| CombFilter::new(800 + rng.gen_range(0..1400)))
            .collect();
        let allpasses = (0..REV_APS * 2)
            .map(|_| AllpassFilter::new(500 + rng.gen_range(0..500)))
            .collect();
        let max_idelay = (sample_rate * MAX_IDELAY_MS / 1000.0).ceil() as usize + 1;

        let mut reverb = Self {
            core: EffectCore::new(insertion, VolumeCurve::Boosted, sample_rate, buffer_size),
            p_time: 64,
            p_idelay: 40,
            p_idelayfb: 0,
            p_lpf: 127,
            p_hpf: 0,
            p_lohidamp: 80,
            p_type: 1,
            p_roomsize: 64,
            p_bandwidth: 30,
            combs,
            allpasses,
            lohifb: 0.0,
            roomsize: 1.0,
            rs: 1.0,
            idelay: vec![0.0; max_idelay],
            idelay_len: 0,
            idelay_pos: 0,
            idelayfb: 0.0,
            lpf: None,
            hpf: None,
            lpf_freq: InterpolatedValue::new(20000.0, sample_rate),
            hpf_freq: InterpolatedValue::new(20.0, sample_rate),
            input: vec![0.0; buffer_size],
            rng,
        };
        reverb.core.set_volume(48);
        reverb.set_roomsize(64);
        reverb
    }

    fn set_time(&mut self, value: u8) {
        self.p_time = value;
        let t = 60.0f32.powf(value as f32 / 127.0) - 0.97;
        let sample_rate = self.core.sample_rate;
        for comb in &mut self.combs {
            comb.feedback = -(comb.len() as f32 / sample_rate * 0.001f32.ln() / t).exp();
        }
    }

    fn set_lohidamp(&mut self, value: u8) {
        self.p_lohidamp = value.max(64);
        if self.p_lohidamp == 64 {
            self.lohifb = 0.0;
        } else {
            let x = ((self.p_lohidamp as f32 - 64.0) / 64.1).abs();
            self.lohifb = x * x;
        }
    }

    fn set_idelay(&mut self, value: u8) {
        self.p_idelay = value;
        let delay = (50.0 * value as f32 / 127.0).powi(2) - 1.0;
        let len = (self.core.sample_rate * delay / 1000.0).round();
        self.idelay_len = if len > 1.0 {
            (len as usize).min(self.idelay.len())
        } else {
            0
        };
        self.idelay_pos = 0;
        self.idelay.fill(0.0);
    }

    fn set_lpf(&mut self, value: u8) {
        self.p_lpf = value;
        if value == 127 {
            self.lpf = None;
        } else {
            let freq = ((value as f32 / 127.0).sqrt() * 25000.0f32.ln()).exp() + 40.0;
            self.lpf_freq.set_target(freq);
            if self.lpf.is_none() {
                self.lpf_freq.reset(freq);
                self.lpf = Some(Biquad::new(BiquadKind::Lpf2, freq, 1.0, 0.0, self.core.sample_rate));
            }
        }
    }

    fn set_hpf(&mut self, value: u8) {
        self.p_hpf = value;
        if value == 0 {
            self.hpf = None;
        } else {
            let freq = ((value as f32 / 127.0).sqrt() * 10000.0f32.ln()).exp() + 20.0;
            self.hpf_freq.set_target(freq);
            if self.hpf.is_none() {
                self.hpf_freq.reset(freq);
                self.hpf = Some(Biquad::new(BiquadKind::Hpf2, freq, 1.0, 0.0, self.core.sample_rate));
            }
        }
    }

    fn set_type(&mut self, value: u8) {
        self.p_type = value.min(2);
        let rate_adjust = self.core.sample_rate / 44100.0;

        for i in 0..REV_COMBS * 2 {
            let mut len = if self.p_type == 0 {
                800.0 + self.rng.r#gen::<f32>() * 1400.0
            } else {
                COMB_TUNINGS[i % REV_COMBS] as f32
            };
            len *= self.roomsize;
            // stereo spread
            if i > REV_COMBS {
                len += 23.0;
            }
            len *= rate_adjust;
            self.combs[i].resize((len as usize).max(10));
        }
        for i in 0..REV_APS * 2 {
            let mut len = if self.p_type == 0 {
                500.0 + self.rng.r#gen::<f32>() * 500.0
            } else {
                ALLPASS_TUNINGS[i % REV_APS] as f32
            };
            len *= self.roomsize;
            if i > REV_APS {
                len += 23.0;
            }
            len *= rate_adjust;
            self.allpasses[i].resize((len as usize).max(10));
        }
        self.set_time(self.p_time);
        self.cleanup();
    }

    fn set_roomsize(&mut self, value: u8) {
        // 0 came from older files and means "default"
        self.p_roomsize = if value == 0 { 64 } else { value };
        let mut size = (self.p_roomsize as f32 - 64.0) / 64.0;
        if size > 0.0 {
            size *= 2.0;
        }
        self.roomsize = 10.0f32.powf(size);
        self.rs = self.roomsize.sqrt();
        self.set_type(self.p_type);
    }

    fn process_channel(&mut self, channel: usize, n: usize, output: &mut [f32]) {
        output[..n].fill(0.0);
        let damp = self.lohifb;
        for comb in &mut self.combs[REV_COMBS * channel..REV_COMBS * (channel + 1)] {
            for (out, &input) in output[..n].iter_mut().zip(&self.input[..n]) {
                *out += comb.process(input, damp);
            }
        }
        for allpass in &mut self.allpasses[REV_APS * channel..REV_APS * (channel + 1)] {
            for out in output[..n].iter_mut() {
                *out = allpass.process(*out);
            }
        }
    }
}

impl Effect for Reverb {
    fn kind(&self) -> EffectKind {
        EffectKind::Reverb
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let n = efx_l.len().min(self.input.len());
        if self.core.p_volume == 0 && self.core.insertion {
            efx_l.fill(0.0);
            efx_r.fill(0.0);
            return;
        }

        for i in 0..n {
            let mut input = (in_l[i] + in_r[i]) / 2.0;
            if self.idelay_len > 0 {
                let delayed = self.idelay[self.idelay_pos];
                self.idelay[self.idelay_pos] = input + delayed * self.idelayfb;
                input = delayed;
                self.idelay_pos += 1;
                if self.idelay_pos >= self.idelay_len {
                    self.idelay_pos = 0;
                }
            }
            self.input[i] = input;
        }

        let sample_rate = self.core.sample_rate;
        if let Some(lpf) = self.lpf.as_mut() {
            let before = self.lpf_freq.value();
            self.lpf_freq.advance_by(n as u32);
            if before != self.lpf_freq.value() {
                lpf.set(BiquadKind::Lpf2, self.lpf_freq.value(), 1.0, 0.0, sample_rate);
            }
            for sample in &mut self.input[..n] {
                *sample = lpf.process(*sample);
            }
        }
        if let Some(hpf) = self.hpf.as_mut() {
            let before = self.hpf_freq.value();
            self.hpf_freq.advance_by(n as u32);
            if before != self.hpf_freq.value() {
                hpf.set(BiquadKind::Hpf2, self.hpf_freq.value(), 1.0, 0.0, sample_rate);
            }
            for sample in &mut self.input[..n] {
                *sample = hpf.process(*sample);
            }
        }

        self.process_channel(0, n, efx_l);
        self.process_channel(1, n, efx_r);

        let mut lvol = self.rs / REV_COMBS as f32 * self.core.pan_l.get_and_advance();
        let mut rvol = self.rs / REV_COMBS as f32 * self.core.pan_r.get_and_advance();
        if self.core.insertion {
            lvol *= 2.0;
            rvol *= 2.0;
        }
        for (l, r) in efx_l[..n].iter_mut().zip(efx_r[..n].iter_mut()) {
            *l *= lvol;
            *r *= rvol;
        }
        efx_l[n..].fill(0.0);
        efx_r[n..].fill(0.0);
    }

    fn change_par(&mut self, npar: usize, value: u8) {
        match npar {
            0 => {
                if self.core.set_volume(value) {
                    self.cleanup();
                }
            }
            1 => self.core.set_panning(value),
            2 => self.set_time(value),
            3 => self.set_idelay(value),
            4 => {
                self.p_idelayfb = value;
                self.idelayfb = value as f32 / 128.0;
            }
            7 => self.set_lpf(value),
            8 => self.set_hpf(value),
            9 => self.set_lohidamp(value),
            10 => self.set_type(value),
            11 => self.set_roomsize(value),
            // only used by the diffusing type; kept for presets
            12 => self.p_bandwidth = value,
            _ => return,
        }
        self.core.changed = true;
    }

    fn get_par(&self, npar: usize) -> u8 {
        match npar {
            0 => self.core.p_volume,
            1 => self.core.p_panning,
            2 => self.p_time,
            3 => self.p_idelay,
            4 => self.p_idelayfb,
            7 => self.p_lpf,
            8 => self.p_hpf,
            9 => self.p_lohidamp,
            10 => self.p_type,
            11 => self.p_roomsize,
            12 => self.p_bandwidth,
            _ => 0,
        }
    }

    fn cleanup(&mut self) {
        for comb in &mut self.combs {
            comb.mute();
        }
        for allpass in &mut self.allpasses {
            allpass.mute();
        }
        self.idelay.fill(0.0);
        self.idelay_pos = 0;
        if let Some(lpf) = self.lpf.as_mut() {
            lpf.reset();
        }
        if let Some(hpf) = self.hpf.as_mut() {
            hpf.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44100.0;
    const BS: usize = 256;

    fn render(reverb: &mut Reverb, input: f32) -> (Vec<f32>, Vec<f32>) {
        let mut in_l = vec![0.0; BS];
        let mut in_r = vec![0.0; BS];
        in_l[0] = input;
        in_r[0] = input;
        let mut out_l = vec![0.0; BS];
        let mut out_r = vec![0.0; BS];
        reverb.out(&in_l, &in_r, &mut out_l, &mut out_r);
        (out_l, out_r)
    }

    #[test]
    fn test_tail_after_impulse() {
        let mut reverb = Reverb::new(false, SR, BS);
        reverb.set_preset(5);
        reverb.core.settle();
        render(&mut reverb, 1.0);

        let mut energy = 0.0;
        for _ in 0..40 {
            let (l, r) = render(&mut reverb, 0.0);
            energy += l.iter().chain(r.iter()).map(|x| x * x).sum::<f32>();
        }
        assert!(energy > 0.0);
        assert!(energy.is_finite());
    }

    #[test]
    fn test_cleanup_silences() {
        let mut reverb = Reverb::new(false, SR, BS);
        render(&mut reverb, 1.0);
        reverb.cleanup();
        for _ in 0..40 {
            let (l, r) = render(&mut reverb, 0.0);
            assert!(l.iter().chain(r.iter()).all(|x| x.abs() < 1e-6));
        }
    }

    #[test]
    fn test_lohidamp_floor() {
        let mut reverb = Reverb::new(false, SR, BS);
        reverb.change_par(9, 10);
        assert_eq!(reverb.get_par(9), 64);
        assert_eq!(reverb.lohifb, 0.0);
    }

    #[test]
    fn test_roomsize_zero_is_default() {
        let mut reverb = Reverb::new(false, SR, BS);
        reverb.change_par(11, 0);
        assert_eq!(reverb.get_par(11), 64);
        assert_eq!(reverb.roomsize, 1.0);
    }

    #[test]
    fn test_filters_follow_parameters() {
        let mut reverb = Reverb::new(false, SR, BS);
        reverb.change_par(7, 127);
        reverb.change_par(8, 0);
        assert!(reverb.lpf.is_none());
        assert!(reverb.hpf.is_none());
        reverb.change_par(7, 60);
        reverb.change_par(8, 20);
        assert!(reverb.lpf.is_some());
        assert!(reverb.hpf.is_some());
    }

    #[test]
    fn test_unused_parameters_ignored() {
        let mut reverb = Reverb::new(false, SR, BS);
        reverb.core.changed = false;
        reverb.change_par(5, 99);
        assert_eq!(reverb.get_par(5), 0);
        assert!(!reverb.core.changed);
    }

    #[test]
    fn test_limits_table() {
        assert!(limits(5).is_none());
        assert_eq!(limits(9).unwrap().min, 64.0);
        assert!(!limits(10).unwrap().learnable);
        assert_eq!(limits(10).unwrap().max, 2.0);
    }
}
