// Echo - stereo feedback delay with high damping and L/R crossing
//
// Both delay lines are allocated once at their longest possible length
// (1.5 s of delay plus the largest L/R offset); parameter changes only move
// the active length.

use super::core::{EffectCore, VolumeCurve};
use super::{Effect, EffectKind};
use crate::params::limits::{DEFAULT_LIMITS, Limits};

/// Longest main delay in seconds
const MAX_DELAY_SECONDS: f32 = 1.5;
/// Largest L/R offset: 2^9 - 1 ms
const MAX_LR_DELAY_SECONDS: f32 = 0.511;

pub static PRESETS: &[&[u8]] = &[
    // Echo 1
    &[67, 64, 35, 64, 30, 59, 0],
    // Echo 2
    &[67, 64, 21, 64, 30, 59, 0],
    // Echo 3
    &[67, 75, 60, 64, 30, 59, 10],
    // Simple Echo
    &[67, 60, 44, 64, 30, 0, 0],
    // Canyon
    &[67, 60, 102, 50, 30, 82, 48],
    // Panning Echo 1
    &[67, 64, 44, 17, 0, 82, 24],
    // Panning Echo 2
    &[81, 60, 46, 118, 100, 68, 18],
    // Panning Echo 3
    &[81, 60, 26, 100, 127, 67, 36],
    // Feedback Echo
    &[62, 64, 28, 64, 100, 90, 55],
];

pub fn limits(control: u8) -> Option<Limits> {
    match control {
        0..=6 | 16 => Some(DEFAULT_LIMITS),
        _ => None,
    }
}

pub struct Echo {
    core: EffectCore,
    p_delay: u8,
    p_lrdelay: u8,
    p_fb: u8,
    p_hidamp: u8,

    delay: usize,
    lrdelay: isize,
    fb: f32,
    hidamp: f32,

    ldelay: Vec<f32>,
    rdelay: Vec<f32>,
    dl: usize,
    dr: usize,
    kl: usize,
    kr: usize,
    oldl: f32,
    oldr: f32,
}

impl Echo {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        let max_len =
            (sample_rate * (MAX_DELAY_SECONDS + MAX_LR_DELAY_SECONDS)).ceil() as usize + 2;
        let mut echo = Self {
            core: EffectCore::new(insertion, VolumeCurve::Boosted, sample_rate, buffer_size),
            p_delay: 60,
            p_lrdelay: 100,
            p_fb: 40,
            p_hidamp: 60,
            delay: 1,
            lrdelay: 0,
            fb: 0.0,
            hidamp: 0.0,
            ldelay: vec![0.0; max_len],
            rdelay: vec![0.0; max_len],
            dl: 1,
            dr: 1,
            kl: 0,
            kr: 0,
            oldl: 0.0,
            oldr: 0.0,
        };
        echo.core.set_volume(50);
        echo.set_delay(60);
        echo.set_lrdelay(100);
        echo.set_fb(40);
        echo.set_hidamp(60);
        echo.core.set_lrcross(100);
        echo
    }

    fn init_delays(&mut self) {
        self.kl = 0;
        self.kr = 0;
        let max = self.ldelay.len() as isize;
        self.dl = (self.delay as isize - self.lrdelay).clamp(1, max) as usize;
        self.dr = (self.delay as isize + self.lrdelay).clamp(1, max) as usize;
        self.cleanup();
    }

    fn set_delay(&mut self, value: u8) {
        self.p_delay = value;
        // 0 .. 1.5 s
        self.delay =
            1 + (value as f32 / 127.0 * self.core.sample_rate * MAX_DELAY_SECONDS) as usize;
        self.init_delays();
    }

    fn set_lrdelay(&mut self, value: u8) {
        self.p_lrdelay = value;
        let mut tmp = (2.0f32.powf((value as f32 - 64.0).abs() / 64.0 * 9.0) - 1.0) / 1000.0
            * self.core.sample_rate;
        if value < 64 {
            tmp = -tmp;
        }
        self.lrdelay = tmp as isize;
        self.init_delays();
    }

    fn set_fb(&mut self, value: u8) {
        self.p_fb = value;
        self.fb = value as f32 / 128.0;
    }

    fn set_hidamp(&mut self, value: u8) {
        self.p_hidamp = value;
        self.hidamp = 1.0 - value as f32 / 127.0;
    }

    /// Active left/right delay lengths in samples
    pub fn delay_lengths(&self) -> (usize, usize) {
        (self.dl, self.dr)
    }
}

impl Effect for Echo {
    fn kind(&self) -> EffectKind {
        EffectKind::Echo
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        for i in 0..efx_l.len() {
            let (l, r) = self.core.cross(self.ldelay[self.kl], self.rdelay[self.kr]);

            efx_l[i] = l * 2.0 - 1e-20;
            efx_r[i] = r * 2.0 - 1e-20;

            let (pan_l, pan_r) = self.core.pan(in_l[i], in_r[i]);
            let mut ldl = pan_l - l * self.fb;
            let mut rdl = pan_r - r * self.fb;

            // passe-bas
            ldl = ldl * self.hidamp + self.oldl * (1.0 - self.hidamp);
            rdl = rdl * self.hidamp + self.oldr * (1.0 - self.hidamp);
            self.ldelay[self.kl] = ldl;
            self.rdelay[self.kr] = rdl;
            self.oldl = ldl;
            self.oldr = rdl;

            self.kl += 1;
            if self.kl >= self.dl {
                self.kl = 0;
            }
            self.kr += 1;
            if self.kr >= self.dr {
                self.kr = 0;
            }
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
            2 => self.set_delay(value),
            3 => self.set_lrdelay(value),
            4 => self.core.set_lrcross(value),
            5 => self.set_fb(value),
            6 => self.set_hidamp(value),
            _ => return,
        }
        self.core.changed = true;
    }

    fn get_par(&self, npar: usize) -> u8 {
        match npar {
            0 => self.core.p_volume,
            1 => self.core.p_panning,
            2 => self.p_delay,
            3 => self.p_lrdelay,
            4 => self.core.p_lrcross,
            5 => self.p_fb,
            6 => self.p_hidamp,
            _ => 0,
        }
    }

    fn cleanup(&mut self) {
        self.ldelay[..self.dl].fill(0.0);
        self.rdelay[..self.dr].fill(0.0);
        self.oldl = 0.0;
        self.oldr = 0.0;
    }
}
