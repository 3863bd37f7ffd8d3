// Chorus - LFO-modulated delay, also used as a flanger

use super::core::{EffectCore, VolumeCurve};
use super::lfo::EffectLfo;
use super::{Effect, EffectKind};
use crate::params::limits::{DEFAULT_LIMITS, Limits};

/// Longest modulated delay (ms)
const MAX_CHORUS_DELAY_MS: f32 = 250.0;

pub static PRESETS: &[&[u8]] = &[
    // Chorus1
    &[64, 64, 50, 0, 0, 90, 40, 85, 64, 119, 0, 0],
    // Chorus2
    &[64, 64, 45, 0, 0, 98, 56, 90, 64, 19, 0, 0],
    // Chorus3
    &[64, 64, 29, 0, 1, 42, 97, 95, 90, 127, 0, 0],
    // Celeste1
    &[64, 64, 26, 0, 0, 42, 115, 18, 90, 127, 0, 0],
    // Celeste2
    &[64, 64, 29, 117, 0, 50, 115, 9, 31, 127, 0, 1],
    // Flange1
    &[64, 64, 57, 0, 0, 60, 23, 3, 62, 0, 0, 0],
    // Flange2
    &[64, 64, 33, 34, 1, 40, 35, 3, 109, 0, 0, 0],
    // Flange3
    &[64, 64, 53, 34, 1, 94, 35, 3, 54, 0, 0, 1],
    // Flange4
    &[64, 64, 40, 0, 1, 62, 12, 19, 97, 0, 0, 0],
    // Flange5
    &[64, 64, 55, 105, 0, 24, 39, 19, 17, 0, 0, 1],
];

pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        0..=3 | 5..=9 | 16 => DEFAULT_LIMITS,
        4 | 10 | 11 => Limits::int(0, 1, 0).fixed(),
        _ => return None,
    };
    Some(limits)
}

pub struct Chorus {
    core: EffectCore,
    lfo: EffectLfo,
    p_depth: u8,
    p_delay: u8,
    p_fb: u8,
    p_flange_mode: bool,
    p_out_sub: bool,

    depth: f32,
    delay: f32,
    fb: f32,

    max_delay: usize,
    delay_l: Vec<f32>,
    delay_r: Vec<f32>,
    dlk: usize,
    drk: usize,
    dl1: f32,
    dl2: f32,
    dr1: f32,
    dr2: f32,
}

impl Chorus {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        let max_delay = ((MAX_CHORUS_DELAY_MS / 1000.0 * sample_rate) as usize).max(2);
        let mut chorus = Self {
            core: EffectCore::new(insertion, VolumeCurve::Linear, sample_rate, buffer_size),
            lfo: EffectLfo::new(sample_rate, buffer_size),
            p_depth: 0,
            p_delay: 0,
            p_fb: 64,
            p_flange_mode: false,
            p_out_sub: false,
            depth: 0.0,
            delay: 0.0,
            fb: 0.0,
            max_delay,
            delay_l: vec![0.0; max_delay],
            delay_r: vec![0.0; max_delay],
            dlk: 0,
            drk: 0,
            dl1: 0.0,
            dl2: 0.0,
            dr1: 0.0,
            dr2: 0.0,
        };
        let (lfo_l, lfo_r) = chorus.lfo.out();
        chorus.dl2 = chorus.delay_samples(lfo_l);
        chorus.dr2 = chorus.delay_samples(lfo_r);
        chorus
    }

    /// Delay in samples for an LFO position
    fn delay_samples(&self, xlfo: f32) -> f32 {
        let result = if self.p_flange_mode {
            0.0
        } else {
            (self.delay + xlfo * self.depth) * self.core.sample_rate
        };
        // depth and delay can ask for more than the line holds
        if result + 0.5 >= self.max_delay as f32 {
            self.max_delay as f32 - 1.0
        } else {
            result
        }
    }

    fn set_depth(&mut self, value: u8) {
        self.p_depth = value;
        // secondes
        self.depth = (8.0f32.powf(value as f32 / 127.0 * 2.0) - 1.0) / 1000.0;
    }

    fn set_delay(&mut self, value: u8) {
        self.p_delay = value;
        self.delay = (10.0f32.powf(value as f32 / 127.0 * 2.0) - 1.0) / 1000.0;
    }

    fn set_fb(&mut self, value: u8) {
        self.p_fb = value;
        self.fb = (value as f32 - 64.0) / 64.1;
    }

    /// Read a delay line `mdel` samples behind `pos` with linear interpolation
    #[inline]
    fn tap(line: &[f32], pos: usize, mdel: f32) -> f32 {
        let len = line.len();
        let tmp = pos as f32 - mdel + len as f32 * 2.0;
        let hi = tmp.trunc() as usize % len;
        let hi2 = (hi + len - 1) % len;
        let lo = 1.0 - tmp.fract();
        line[hi2] * lo + line[hi] * (1.0 - lo)
    }
}

impl Effect for Chorus {
    fn kind(&self) -> EffectKind {
        EffectKind::Chorus
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let n = efx_l.len();
        self.dl1 = self.dl2;
        self.dr1 = self.dr2;
        let (lfo_l, lfo_r) = self.lfo.out();
        self.dl2 = self.delay_samples(lfo_l);
        self.dr2 = self.delay_samples(lfo_r);

        for i in 0..n {
            let (input_l, input_r) = self.core.cross(in_l[i], in_r[i]);
            let frac = i as f32 / n as f32;

            let mdel = self.dl1 * (1.0 - frac) + self.dl2 * frac;
            self.dlk += 1;
            if self.dlk >= self.max_delay {
                self.dlk = 0;
            }
            efx_l[i] = Self::tap(&self.delay_l, self.dlk, mdel);
            self.delay_l[self.dlk] = input_l + efx_l[i] * self.fb;

            let mdel = self.dr1 * (1.0 - frac) + self.dr2 * frac;
            self.drk += 1;
            if self.drk >= self.max_delay {
                self.drk = 0;
            }
            efx_r[i] = Self::tap(&self.delay_r, self.drk, mdel);
            self.delay_r[self.drk] = input_r + efx_r[i] * self.fb;
        }

        let sign = if self.p_out_sub { -1.0 } else { 1.0 };
        let pan_l = self.core.pan_l.get_and_advance() * sign;
        let pan_r = self.core.pan_r.get_and_advance() * sign;
        for (l, r) in efx_l.iter_mut().zip(efx_r.iter_mut()) {
            *l *= pan_l;
            *r *= pan_r;
        }
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
            6 => self.set_depth(value),
            7 => self.set_delay(value),
            8 => self.set_fb(value),
            9 => self.core.set_lrcross(value),
            10 => self.p_flange_mode = value > 0,
            11 => self.p_out_sub = value > 0,
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
            7 => self.p_delay,
            8 => self.p_fb,
            9 => self.core.p_lrcross,
            10 => self.p_flange_mode as u8,
            11 => self.p_out_sub as u8,
            _ => 0,
        }
    }

    fn cleanup(&mut self) {
        self.delay_l.fill(0.0);
        self.delay_r.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_is_bounded() {
        let mut chorus = Chorus::new(false, 44100.0, 128);
        chorus.change_par(6, 127);
        chorus.change_par(7, 127);
        assert!(chorus.delay_samples(1.0) < chorus.max_delay as f32);
    }

    #[test]
    fn test_flange_mode_zero_delay() {
        let mut chorus = Chorus::new(false, 44100.0, 128);
        chorus.change_par(10, 1);
        assert_eq!(chorus.delay_samples(0.7), 0.0);
    }

    #[test]
    fn test_output_is_finite() {
        let mut chorus = Chorus::new(true, 44100.0, 128);
        chorus.set_preset(2);
        let input: Vec<f32> = (0..128).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut out_l = vec![0.0; 128];
        let mut out_r = vec![0.0; 128];
        for _ in 0..50 {
            chorus.out(&input, &input, &mut out_l, &mut out_r);
        }
        assert!(out_l.iter().chain(out_r.iter()).all(|x| x.is_finite()));
        assert!(out_l.iter().any(|x| x.abs() > 0.0));
    }

    #[test]
    fn test_switches_read_back() {
        let mut chorus = Chorus::new(true, 44100.0, 128);
        chorus.change_par(11, 5);
        assert_eq!(chorus.get_par(11), 1);
        assert_eq!(limits(11).unwrap().max, 1.0);
        assert!(limits(12).is_none());
    }
}
