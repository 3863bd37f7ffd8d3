// AlienWah - complex-valued feedback comb swept by the effect LFO

use super::core::{EffectCore, VolumeCurve};
use super::lfo::EffectLfo;
use super::{Effect, EffectKind};
use crate::params::limits::{DEFAULT_LIMITS, Limits};
use std::f32::consts::{PI, TAU};

pub const MAX_ALIENWAH_DELAY: usize = 100;

pub static PRESETS: &[&[u8]] = &[
    // AlienWah1
    &[127, 64, 70, 0, 0, 62, 60, 105, 25, 0, 64],
    // AlienWah2
    &[127, 64, 73, 106, 0, 101, 60, 105, 17, 0, 64],
    // AlienWah3
    &[127, 64, 63, 0, 1, 100, 112, 105, 31, 0, 42],
    // AlienWah4
    &[93, 64, 25, 0, 1, 66, 101, 11, 47, 0, 86],
];

pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        0..=3 | 5..=7 | 9 | 10 | 16 => DEFAULT_LIMITS,
        4 => Limits::int(0, 1, 0).fixed(),
        8 => Limits::int(1, MAX_ALIENWAH_DELAY as i32, 20).fixed(),
        _ => return None,
    };
    Some(limits)
}

/// Minimal complex value for the feedback line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Complex {
    re: f32,
    im: f32,
}

impl Complex {
    fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    fn polar(magnitude: f32, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(cos * magnitude, sin * magnitude)
    }

    fn mul(self, other: Self) -> Self {
        Self::new(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        )
    }

    fn lerp(self, other: Self, x: f32) -> Self {
        Self::new(
            other.re * x + self.re * (1.0 - x),
            other.im * x + self.im * (1.0 - x),
        )
    }
}

pub struct Alienwah {
    core: EffectCore,
    lfo: EffectLfo,
    p_depth: u8,
    p_fb: u8,
    p_delay: u8,
    p_phase: u8,

    depth: f32,
    fb: f32,
    phase: f32,

    old_l: [Complex; MAX_ALIENWAH_DELAY],
    old_r: [Complex; MAX_ALIENWAH_DELAY],
    old_k: usize,
    old_clfo_l: Complex,
    old_clfo_r: Complex,
}

impl Alienwah {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        let mut wah = Self {
            core: EffectCore::new(insertion, VolumeCurve::Linear, sample_rate, buffer_size),
            lfo: EffectLfo::new(sample_rate, buffer_size),
            p_depth: 0,
            p_fb: 64,
            p_delay: 1,
            p_phase: 64,
            depth: 0.0,
            fb: 0.0,
            phase: 0.0,
            old_l: [Complex::default(); MAX_ALIENWAH_DELAY],
            old_r: [Complex::default(); MAX_ALIENWAH_DELAY],
            old_k: 0,
            old_clfo_l: Complex::default(),
            old_clfo_r: Complex::default(),
        };
        wah.set_fb(64);
        wah.old_clfo_l = Complex::new(wah.fb, 0.0);
        wah.old_clfo_r = Complex::new(wah.fb, 0.0);
        wah
    }

    fn set_fb(&mut self, value: u8) {
        self.p_fb = value;
        let fb = ((value as f32 - 64.0) / 64.1).abs().sqrt().max(0.4);
        self.fb = if value < 64 { -fb } else { fb };
    }

    fn set_delay(&mut self, value: u8) {
        self.p_delay = value.clamp(1, MAX_ALIENWAH_DELAY as u8);
        self.cleanup();
    }
}

impl Effect for Alienwah {
    fn kind(&self) -> EffectKind {
        EffectKind::Alienwah
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let (lfo_l, lfo_r) = self.lfo.out();
        let clfo_l = Complex::polar(self.fb, lfo_l * self.depth * TAU + self.phase);
        let clfo_r = Complex::polar(self.fb, lfo_r * self.depth * TAU + self.phase);
        let dry = 1.0 - self.fb.abs();
        let wet = 10.0 * (self.fb + 0.1);
        let delay = self.p_delay as usize;

        let n = efx_l.len();
        for i in 0..n {
            let x = i as f32 / n as f32;
            let (pan_l, pan_r) = self.core.pan(in_l[i], in_r[i]);

            let mut out = self.old_clfo_l.lerp(clfo_l, x).mul(self.old_l[self.old_k]);
            out.re += dry * pan_l;
            self.old_l[self.old_k] = out;
            let l = out.re * wet;

            let mut out = self.old_clfo_r.lerp(clfo_r, x).mul(self.old_r[self.old_k]);
            out.re += dry * pan_r;
            self.old_r[self.old_k] = out;
            let r = out.re * wet;

            self.old_k += 1;
            if self.old_k >= delay {
                self.old_k = 0;
            }
            let (l, r) = self.core.cross(l, r);
            efx_l[i] = l;
            efx_r[i] = r;
        }
        self.old_clfo_l = clfo_l;
        self.old_clfo_r = clfo_r;
    }

    fn change_par(&mut self, npar: usize, value: u8) {
        match npar {
            0 => {
                self.core.set_volume(value);
            }
            1 => self.core.set_panning(value),
            2 => {
                self.lfo.p_freq = value;
                self.lfo.update_params();
            }
            3 => {
                self.lfo.p_randomness = value;
                self.lfo.update_params();
            }
            4 => {
                self.lfo.p_type = value;
                self.lfo.update_params();
            }
            5 => {
                self.lfo.p_stereo = value;
                self.lfo.update_params();
            }
            6 => {
                self.p_depth = value;
                self.depth = value as f32 / 127.0;
            }
            7 => self.set_fb(value),
            8 => self.set_delay(value),
            9 => self.core.set_lrcross(value),
            10 => {
                self.p_phase = value;
                self.phase = (value as f32 - 64.0) / 64.0 * PI;
            }
            _ => return,
        }
        self.core.changed = true;
    }

    fn get_par(&self, npar: usize) -> u8 {
        match npar {
            0 => self.core.p_volume,
            1 => self.core.p_panning,
            2 => self.lfo.p_freq,
            3 => self.lfo.p_randomness,
            4 => self.lfo.p_type,
            5 => self.lfo.p_stereo,
            6 => self.p_depth,
            7 => self.p_fb,
            8 => self.p_delay,
            9 => self.core.p_lrcross,
            10 => self.p_phase,
            _ => 0,
        }
    }

    fn cleanup(&mut self) {
        self.old_l = [Complex::default(); MAX_ALIENWAH_DELAY];
        self.old_r = [Complex::default(); MAX_ALIENWAH_DELAY];
        self.old_k = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_floor_and_sign() {
        let mut wah = Alienwah::new(false, 44100.0, 128);
        wah.change_par(7, 64);
        assert!((wah.fb - 0.4).abs() < 1e-6);
        wah.change_par(7, 0);
        assert!(wah.fb < 0.0);
    }

    #[test]
    fn test_delay_bounds() {
        let mut wah = Alienwah::new(false, 44100.0, 128);
        wah.change_par(8, 0);
        assert_eq!(wah.get_par(8), 1);
        wah.change_par(8, 127);
        assert_eq!(wah.get_par(8), MAX_ALIENWAH_DELAY as u8);
    }

    #[test]
    fn test_system_preset_volume_is_lowered() {
        let mut wah = Alienwah::new(false, 44100.0, 128);
        wah.set_preset(0);
        assert_eq!(wah.get_par(0), 63);
        let mut wah = Alienwah::new(true, 44100.0, 128);
        wah.set_preset(0);
        assert_eq!(wah.get_par(0), 127);
    }

    #[test]
    fn test_renders_finite() {
        let mut wah = Alienwah::new(true, 44100.0, 128);
        wah.set_preset(2);
        let input: Vec<f32> = (0..128).map(|i| (i as f32 * 0.2).sin()).collect();
        let mut out_l = vec![0.0; 128];
        let mut out_r = vec![0.0; 128];
        for _ in 0..100 {
            wah.out(&input, &input, &mut out_l, &mut out_r);
        }
        assert!(out_l.iter().chain(out_r.iter()).all(|x| x.is_finite()));
    }
}
