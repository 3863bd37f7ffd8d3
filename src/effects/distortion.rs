// Distortion - drive, wave shaper and a low/high-pass pair

use super::core::{EffectCore, VolumeCurve};
use super::{Effect, EffectKind};
use crate::audio::dsp_utils::db_to_gain;
use crate::params::limits::{DEFAULT_LIMITS, Limits};
use crate::synth::filter::{Biquad, BiquadKind};

/// Number of wave shaper curves
pub const NUM_SHAPES: u8 = 14;

pub static PRESETS: &[&[u8]] = &[
    // Overdrive 1
    &[127, 64, 35, 56, 70, 0, 0, 96, 0, 0, 0],
    // Overdrive 2
    &[127, 64, 35, 29, 75, 1, 0, 127, 0, 0, 0],
    // A. Exciter 1
    &[64, 64, 35, 75, 80, 5, 0, 127, 105, 1, 0],
    // A. Exciter 2
    &[64, 64, 35, 85, 62, 1, 0, 127, 118, 1, 0],
    // Guitar Amp
    &[127, 64, 35, 63, 75, 2, 0, 55, 0, 0, 0],
    // Quantisize
    &[127, 64, 35, 88, 75, 4, 0, 127, 0, 1, 0],
];

pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        0..=4 | 7 | 8 | 16 => DEFAULT_LIMITS,
        5 => Limits::int(0, NUM_SHAPES as i32 - 1, 0).fixed(),
        6 | 9 | 10 => Limits::int(0, 1, 0).fixed(),
        _ => return None,
    };
    Some(limits)
}

/// Shape `smps` in place with curve `shape` (0-based) at `drive` (0..127)
pub fn wave_shape(smps: &mut [f32], shape: u8, drive: u8) {
    let ws = drive as f32 / 127.0;
    match shape {
        // arctangent
        0 => {
            let ws = 10.0f32.powf(ws * ws * 3.0) - 1.0 + 0.001;
            let norm = ws.atan();
            for x in smps.iter_mut() {
                *x = (*x * ws).atan() / norm;
            }
        }
        // asymmetric
        1 => {
            let ws = ws * ws * 32.0 + 0.0001;
            let norm = if ws < 1.0 { ws.sin() + 0.1 } else { 1.1 };
            for x in smps.iter_mut() {
                *x = (*x * (0.1 + ws - ws * *x)).sin() / norm;
            }
        }
        // pow
        2 => {
            let ws = ws * ws * ws * 20.0 + 0.0001;
            for x in smps.iter_mut() {
                let y = *x * ws;
                *x = if y.abs() < 1.0 {
                    let y = (y - y * y * y) * 3.0;
                    if ws < 1.0 { y / ws } else { y }
                } else {
                    0.0
                };
            }
        }
        // sine
        3 => {
            let ws = ws * ws * ws * 32.0 + 0.0001;
            let norm = if ws < 1.57 { ws.sin() } else { 1.0 };
            for x in smps.iter_mut() {
                *x = (*x * ws).sin() / norm;
            }
        }
        // quantise
        4 => {
            let step = ws * ws + 0.000001;
            for x in smps.iter_mut() {
                *x = (*x / step + 0.5).floor() * step;
            }
        }
        // zigzag
        5 => {
            let ws = ws * ws * ws * 32.0 + 0.0001;
            let norm = if ws < 1.0 { ws.sin() } else { 1.0 };
            for x in smps.iter_mut() {
                *x = (*x * ws).sin().asin() / norm;
            }
        }
        // limiter
        6 => {
            let limit = 2.0f32.powf(-ws * ws * 8.0);
            for x in smps.iter_mut() {
                *x = x.clamp(-limit, limit);
            }
        }
        // upper limiter
        7 => {
            let limit = 2.0f32.powf(-ws * ws * 8.0);
            for x in smps.iter_mut() {
                *x = x.min(limit);
            }
        }
        // lower limiter
        8 => {
            let limit = 2.0f32.powf(-ws * ws * 8.0);
            for x in smps.iter_mut() {
                *x = x.max(-limit);
            }
        }
        // inverse limiter
        9 => {
            let limit = (2.0f32.powf(ws * 6.0) - 1.0) / 64.0;
            for x in smps.iter_mut() {
                *x = if *x > limit {
                    *x - limit
                } else if *x < -limit {
                    *x + limit
                } else {
                    0.0
                };
            }
        }
        // clip (folds back into -0.5..0.5)
        10 => {
            let ws = 5.0f32.powf(ws * ws) - 1.0;
            for x in smps.iter_mut() {
                let y = *x * (ws + 0.5) * 0.9999;
                *x = y - (y + 0.5).floor();
            }
        }
        // asym2
        11 => {
            let ws = ws * ws * ws * 30.0 + 0.001;
            let norm = ws.tanh();
            for x in smps.iter_mut() {
                let y = *x * ws;
                let shaped = if y >= 0.0 { y.tanh() } else { 0.5 * (y * 2.0).tanh() };
                *x = shaped / norm;
            }
        }
        // pow2
        12 => {
            let exponent = 1.0 / (1.0 + ws * 8.0);
            for x in smps.iter_mut() {
                *x = x.signum() * x.abs().powf(exponent);
            }
        }
        // sigmoid
        _ => {
            let ws = ws.powi(5) * 80.0 + 0.0001;
            let norm = if ws > 10.0 {
                0.5
            } else {
                0.5 - 1.0 / (ws.exp() + 1.0)
            };
            for x in smps.iter_mut() {
                *x = (1.0 / (1.0 + (-*x * ws).exp()) - 0.5) / norm;
            }
        }
    }
}

pub struct Distortion {
    core: EffectCore,
    p_drive: u8,
    p_level: u8,
    p_type: u8,
    p_negate: bool,
    p_lpf: u8,
    p_hpf: u8,
    p_stereo: bool,
    p_prefiltering: bool,

    lpf_l: Biquad,
    lpf_r: Biquad,
    hpf_l: Biquad,
    hpf_r: Biquad,
}

impl Distortion {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        let mut distortion = Self {
            core: EffectCore::new(insertion, VolumeCurve::Boosted, sample_rate, buffer_size),
            p_drive: 90,
            p_level: 64,
            p_type: 0,
            p_negate: false,
            p_lpf: 127,
            p_hpf: 0,
            p_stereo: true,
            p_prefiltering: false,
            lpf_l: Biquad::new(BiquadKind::Lpf2, 22000.0, 1.0, 0.0, sample_rate),
            lpf_r: Biquad::new(BiquadKind::Lpf2, 22000.0, 1.0, 0.0, sample_rate),
            hpf_l: Biquad::new(BiquadKind::Hpf2, 20.0, 1.0, 0.0, sample_rate),
            hpf_r: Biquad::new(BiquadKind::Hpf2, 20.0, 1.0, 0.0, sample_rate),
        };
        distortion.core.set_volume(50);
        distortion.core.set_lrcross(40);
        distortion
    }

    fn set_lpf(&mut self, value: u8) {
        self.p_lpf = value;
        let freq = ((value as f32 / 127.0).sqrt() * 25000.0f32.ln()).exp() + 40.0;
        let sr = self.core.sample_rate;
        self.lpf_l.set(BiquadKind::Lpf2, freq, 1.0, 0.0, sr);
        self.lpf_r.set(BiquadKind::Lpf2, freq, 1.0, 0.0, sr);
    }

    fn set_hpf(&mut self, value: u8) {
        self.p_hpf = value;
        let freq = ((value as f32 / 127.0).sqrt() * 25000.0f32.ln()).exp() + 20.0;
        let sr = self.core.sample_rate;
        self.hpf_l.set(BiquadKind::Hpf2, freq, 1.0, 0.0, sr);
        self.hpf_r.set(BiquadKind::Hpf2, freq, 1.0, 0.0, sr);
    }

    fn apply_filters(&mut self, efx_l: &mut [f32], efx_r: &mut [f32]) {
        for x in efx_l.iter_mut() {
            *x = self.hpf_l.process(self.lpf_l.process(*x));
        }
        for x in efx_r.iter_mut() {
            *x = self.hpf_r.process(self.lpf_r.process(*x));
        }
    }

    /// Gain in front of the wave shaper
    fn input_drive(&self) -> f32 {
        let drive = 5.0f32.powf((self.p_drive as f32 - 32.0) / 127.0);
        if self.p_negate { -drive } else { drive }
    }
}

impl Effect for Distortion {
    fn kind(&self) -> EffectKind {
        EffectKind::Distortion
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let drive = self.input_drive();
        let n = efx_l.len();

        if self.p_stereo {
            for i in 0..n {
                let (l, r) = self.core.pan(in_l[i], in_r[i]);
                efx_l[i] = l * drive;
                efx_r[i] = r * drive;
            }
        } else {
            for i in 0..n {
                let (l, r) = self.core.pan(in_l[i], in_r[i]);
                efx_l[i] = drive * (l + r) * 0.7;
            }
        }

        if self.p_prefiltering {
            self.apply_filters(efx_l, efx_r);
        }

        wave_shape(efx_l, self.p_type, self.p_drive);
        if self.p_stereo {
            wave_shape(efx_r, self.p_type, self.p_drive);
        }

        if !self.p_prefiltering {
            self.apply_filters(efx_l, efx_r);
        }

        if !self.p_stereo {
            efx_r.copy_from_slice(efx_l);
        }

        let level = db_to_gain(60.0 * self.p_level as f32 / 127.0 - 40.0);
        for i in 0..n {
            let (l, r) = self.core.cross(efx_l[i], efx_r[i]);
            efx_l[i] = l * 2.0 * level;
            efx_r[i] = r * 2.0 * level;
        }
    }

    fn change_par(&mut self, npar: usize, value: u8) {
        match npar {
            0 => {
                if self.core.set_volume(value) {
                    self.cleanup();
                }
            }
            1 => self.core.set_panning(value),
            2 => self.core.set_lrcross(value),
            3 => self.p_drive = value,
            4 => self.p_level = value,
            5 => self.p_type = value.min(NUM_SHAPES - 1),
            6 => self.p_negate = value > 0,
            7 => self.set_lpf(value),
            8 => self.set_hpf(value),
            9 => self.p_stereo = value > 0,
            10 => self.p_prefiltering = value > 0,
            _ => return,
        }
        self.core.changed = true;
    }

    fn get_par(&self, npar: usize) -> u8 {
        match npar {
            0 => self.core.p_volume,
            1 => self.core.p_panning,
            2 => self.core.p_lrcross,
            3 => self.p_drive,
            4 => self.p_level,
            5 => self.p_type,
            6 => self.p_negate as u8,
            7 => self.p_lpf,
            8 => self.p_hpf,
            9 => self.p_stereo as u8,
            10 => self.p_prefiltering as u8,
            _ => 0,
        }
    }

    fn cleanup(&mut self) {
        self.lpf_l.reset();
        self.lpf_r.reset();
        self.hpf_l.reset();
        self.hpf_r.reset();
    }

    fn preset_loaded(&mut self, _preset: usize) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(distortion: &mut Distortion, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut out_l = vec![0.0; input.len()];
        let mut out_r = vec![0.0; input.len()];
        distortion.out(input, input, &mut out_l, &mut out_r);
        (out_l, out_r)
    }

    #[test]
    fn test_every_shape_is_finite() {
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.05).sin() * 1.5).collect();
        for shape in 0..NUM_SHAPES {
            for drive in [0u8, 64, 127] {
                let mut smps = input.clone();
                wave_shape(&mut smps, shape, drive);
                assert!(smps.iter().all(|x| x.is_finite()), "shape {shape} drive {drive}");
            }
        }
    }

    #[test]
    fn test_arctangent_is_bounded() {
        let mut smps = vec![-100.0, -1.0, 0.0, 1.0, 100.0];
        wave_shape(&mut smps, 0, 127);
        assert!(smps.iter().all(|x| x.abs() <= 1.0 + 1e-5));
        assert_eq!(smps[2], 0.0);
    }

    #[test]
    fn test_mono_copies_left_into_right() {
        let mut distortion = Distortion::new(true, 44100.0, 64);
        distortion.change_par(9, 0);
        distortion.core.settle();
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin() * 0.5).collect();
        let (l, r) = render(&mut distortion, &input);
        // identical channels stay identical through the cross
        assert_eq!(l, r);
    }

    #[test]
    fn test_negate_flips_odd_shapes() {
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.3).sin() * 0.5).collect();
        let mut plain = Distortion::new(true, 44100.0, 64);
        plain.core.settle();
        let mut negated = Distortion::new(true, 44100.0, 64);
        negated.change_par(6, 1);
        negated.core.settle();
        let (a, _) = render(&mut plain, &input);
        let (b, _) = render(&mut negated, &input);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x + y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_type_is_clamped() {
        let mut distortion = Distortion::new(false, 44100.0, 64);
        distortion.change_par(5, 127);
        assert_eq!(distortion.get_par(5), NUM_SHAPES - 1);
        assert_eq!(limits(5).map(|l| l.max), Some(13.0));
        assert!(limits(11).is_none());
    }

    #[test]
    fn test_system_preset_volume_is_lowered() {
        let mut distortion = Distortion::new(false, 44100.0, 64);
        distortion.set_preset(0);
        assert_eq!(distortion.get_par(0), 89);
    }
}
