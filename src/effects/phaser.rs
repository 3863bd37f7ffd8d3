// Phaser - cascaded allpass stages swept by the effect LFO
//
// Two models:
// - Normal: first-order allpass chain with feedback and L/R crossing
// - Analog: FET-based allpass model (mismatched stages, optional distortion)

use super::core::{EffectCore, VolumeCurve};
use super::lfo::EffectLfo;
use super::{Effect, EffectKind};
use crate::params::limits::{DEFAULT_LIMITS, Limits};

pub const MAX_PHASER_STAGES: usize = 12;

const LFO_SHAPE: f32 = 2.0;
// jamais 0 ni 1 : stabilité des filtres
const ONE: f32 = 0.99999;
const ZERO: f32 = 0.00001;

/// Per-stage component mismatch of the analog model
const STAGE_OFFSETS: [f32; MAX_PHASER_STAGES] = [
    -0.2509303, 0.9408924, 0.998, -0.3486182, -0.2762545, -0.5215785, 0.2509303, -0.9408924,
    -0.998, 0.3486182, 0.2762545, 0.5215785,
];

// 2N5457 on resistance, parallel resistor, 50 nF
const R_MIN: f32 = 625.0;
const R_MAX: f32 = 22000.0;
const CAPACITANCE: f32 = 0.000_000_05;

pub static PRESETS: &[&[u8]] = &[
    &[64, 64, 36, 0, 0, 64, 110, 64, 1, 0, 0, 20, 0, 0, 0],
    &[64, 64, 35, 0, 0, 88, 40, 64, 3, 0, 0, 20, 0, 0, 0],
    &[64, 64, 31, 0, 0, 66, 68, 107, 2, 0, 0, 20, 0, 0, 0],
    &[39, 64, 22, 0, 0, 66, 67, 10, 5, 0, 1, 20, 0, 0, 0],
    &[64, 64, 20, 0, 1, 110, 67, 78, 10, 0, 0, 20, 0, 0, 0],
    &[64, 64, 53, 100, 0, 58, 37, 78, 3, 0, 0, 20, 0, 0, 0],
    // analog
    &[64, 64, 14, 0, 1, 64, 64, 40, 4, 10, 0, 110, 1, 20, 1],
    &[64, 64, 14, 5, 1, 64, 70, 40, 6, 10, 0, 110, 1, 20, 1],
    &[64, 64, 9, 0, 0, 64, 60, 40, 8, 10, 0, 40, 0, 20, 1],
    &[64, 64, 14, 10, 0, 64, 45, 80, 7, 10, 1, 110, 1, 20, 1],
    &[25, 64, 127, 10, 0, 64, 25, 16, 8, 100, 0, 25, 0, 20, 1],
    &[64, 64, 1, 10, 1, 64, 70, 40, 12, 10, 0, 110, 1, 20, 1],
];

pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        0..=3 | 5..=7 | 9 | 11 | 13 | 16 => DEFAULT_LIMITS,
        4 | 14 => Limits::int(0, 1, 0).fixed(),
        8 => Limits::int(1, MAX_PHASER_STAGES as i32, 1).fixed(),
        10 | 12 => Limits::int(0, 1, 0).fixed(),
        _ => return None,
    };
    Some(limits)
}

pub struct Phaser {
    core: EffectCore,
    lfo: EffectLfo,
    p_depth: u8,
    p_fb: u8,
    p_stages: u8,
    p_out_sub: bool,
    p_phase: u8,
    p_hyper: bool,
    p_distortion: u8,
    p_analog: bool,

    depth: f32,
    fb: f32,
    phase: f32,
    width: f32,
    distortion: f32,
    offset_pct: f32,

    fbl: f32,
    fbr: f32,
    old_lgain: f32,
    old_rgain: f32,
    old_l: [f32; MAX_PHASER_STAGES * 2],
    old_r: [f32; MAX_PHASER_STAGES * 2],
    xn1_l: [f32; MAX_PHASER_STAGES],
    xn1_r: [f32; MAX_PHASER_STAGES],
    yn1_l: [f32; MAX_PHASER_STAGES],
    yn1_r: [f32; MAX_PHASER_STAGES],
    cfs: f32,
}

impl Phaser {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        Self {
            core: EffectCore::new(insertion, VolumeCurve::Linear, sample_rate, buffer_size),
            lfo: EffectLfo::new(sample_rate, buffer_size),
            p_depth: 0,
            p_fb: 64,
            p_stages: 1,
            p_out_sub: false,
            p_phase: 0,
            p_hyper: false,
            p_distortion: 0,
            p_analog: false,
            depth: 0.0,
            fb: 0.0,
            phase: 0.0,
            width: 0.0,
            distortion: 0.0,
            offset_pct: 0.0,
            fbl: 0.0,
            fbr: 0.0,
            old_lgain: 0.0,
            old_rgain: 0.0,
            old_l: [0.0; MAX_PHASER_STAGES * 2],
            old_r: [0.0; MAX_PHASER_STAGES * 2],
            xn1_l: [0.0; MAX_PHASER_STAGES],
            xn1_r: [0.0; MAX_PHASER_STAGES],
            yn1_l: [0.0; MAX_PHASER_STAGES],
            yn1_r: [0.0; MAX_PHASER_STAGES],
            cfs: 2.0 * sample_rate * CAPACITANCE,
        }
    }

    fn set_stages(&mut self, value: u8) {
        self.p_stages = value.clamp(1, MAX_PHASER_STAGES as u8 - 1);
        self.cleanup();
    }

    fn normal_phase(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let (lfo_l, lfo_r) = self.lfo.out();
        let shape = |x: f32| ((x * LFO_SHAPE).exp() - 1.0) / (LFO_SHAPE.exp() - 1.0);
        let gain = |x: f32| {
            (1.0 - self.phase * (1.0 - self.depth) - (1.0 - self.phase) * shape(x) * self.depth)
                .clamp(ZERO, ONE)
        };
        let lgain = gain(lfo_l);
        let rgain = gain(lfo_r);

        let n = efx_l.len();
        let stages = self.p_stages as usize * 2;
        for i in 0..n {
            let x = i as f32 / n as f32;
            let gl = lgain * x + self.old_lgain * (1.0 - x);
            let gr = rgain * x + self.old_rgain * (1.0 - x);

            let (pan_l, pan_r) = self.core.pan(in_l[i], in_r[i]);
            let mut inl = pan_l + self.fbl;
            let mut inr = pan_r + self.fbr;
            for j in 0..stages {
                let tmp = self.old_l[j];
                self.old_l[j] = gl * tmp + inl;
                inl = tmp - gl * self.old_l[j];

                let tmp = self.old_r[j];
                self.old_r[j] = gr * tmp + inr;
                inr = tmp - gr * self.old_r[j];
            }

            let (l, r) = self.core.cross(inl, inr);
            self.fbl = l * self.fb;
            self.fbr = r * self.fb;
            efx_l[i] = l;
            efx_r[i] = r;
        }
        self.old_lgain = lgain;
        self.old_rgain = rgain;
    }

    fn analog_phase(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let (lfo_l, lfo_r) = self.lfo.out();
        let modulate = |x: f32| {
            let mut m = (x * self.width + (self.depth - 0.5)).clamp(ZERO, ONE);
            if self.p_hyper {
                m *= m;
            }
            (1.0 - m).sqrt()
        };
        let modl = modulate(lfo_l);
        let modr = modulate(lfo_r);

        let n = efx_l.len();
        let inv_period = 1.0 / n as f32;
        let diffl = (modl - self.old_lgain) * inv_period;
        let diffr = (modr - self.old_rgain) * inv_period;
        let mut gl = self.old_lgain;
        let mut gr = self.old_rgain;
        self.old_lgain = modl;
        self.old_rgain = modr;

        let mut hpfl = 0.0;
        let mut hpfr = 0.0;
        for i in 0..n {
            gl += diffl;
            gr += diffr;
            let (xl, xr) = self.core.pan(in_l[i], in_r[i]);

            let l = Self::apply_phase(
                xl,
                gl,
                self.fbl,
                &mut hpfl,
                &mut self.yn1_l,
                &mut self.xn1_l,
                self.p_stages as usize,
                self.offset_pct,
                self.distortion,
                self.cfs,
            );
            let r = Self::apply_phase(
                xr,
                gr,
                self.fbr,
                &mut hpfr,
                &mut self.yn1_r,
                &mut self.xn1_r,
                self.p_stages as usize,
                self.offset_pct,
                self.distortion,
                self.cfs,
            );
            self.fbl = l * self.fb;
            self.fbr = r * self.fb;
            efx_l[i] = l;
            efx_r[i] = r;
        }
    }

    #[allow(clippy::too_many_arguments)]
    #[inline]
    fn apply_phase(
        mut x: f32,
        g: f32,
        fb: f32,
        hpf: &mut f32,
        yn1: &mut [f32; MAX_PHASER_STAGES],
        xn1: &mut [f32; MAX_PHASER_STAGES],
        stages: usize,
        offset_pct: f32,
        distortion: f32,
        cfs: f32,
    ) -> f32 {
        let rmx = R_MIN / R_MAX;
        for j in 0..stages {
            let mis = 1.0 + offset_pct * STAGE_OFFSETS[j];
            let d = (1.0 + 2.0 * (0.25 + g) * *hpf * *hpf * distortion) * mis;
            let rconst = 1.0 + mis * rmx;
            let b = (rconst - g) / (d * R_MIN);
            let gain = (cfs - b) / (cfs + b);
            yn1[j] = gain * (x + yn1[j]) - xn1[j];
            *hpf = yn1[j] + (1.0 - gain) * xn1[j];
            xn1[j] = x;
            x = yn1[j];
            // feedback after the first stage
            if j == 1 {
                x += fb;
            }
        }
        x
    }
}

impl Effect for Phaser {
    fn kind(&self) -> EffectKind {
        EffectKind::Phaser
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        if self.p_analog {
            self.analog_phase(in_l, in_r, efx_l, efx_r);
        } else {
            self.normal_phase(in_l, in_r, efx_l, efx_r);
        }
        if self.p_out_sub {
            for (l, r) in efx_l.iter_mut().zip(efx_r.iter_mut()) {
                *l = -*l;
                *r = -*r;
            }
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
            6 => {
                self.p_depth = value;
                self.depth = value as f32 / 127.0;
            }
            7 => {
                self.p_fb = value;
                self.fb = (value as f32 - 64.0) / 64.1;
            }
            8 => self.set_stages(value),
            // shared: L/R cross and analog stage offset
            9 => {
                self.core.set_lrcross(value);
                self.offset_pct = value as f32 / 127.0;
            }
            10 => self.p_out_sub = value > 0,
            // shared: phase and analog width
            11 => {
                self.p_phase = value;
                self.phase = value as f32 / 127.0;
                self.width = value as f32 / 127.0;
            }
            12 => self.p_hyper = value > 0,
            13 => {
                self.p_distortion = value;
                self.distortion = value as f32 / 127.0;
            }
            14 => self.p_analog = value > 0,
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
            8 => self.p_stages,
            9 => self.core.p_lrcross,
            10 => self.p_out_sub as u8,
            11 => self.p_phase,
            12 => self.p_hyper as u8,
            13 => self.p_distortion,
            14 => self.p_analog as u8,
            _ => 0,
        }
    }

    fn cleanup(&mut self) {
        self.fbl = 0.0;
        self.fbr = 0.0;
        self.old_lgain = 0.0;
        self.old_rgain = 0.0;
        self.old_l = [0.0; MAX_PHASER_STAGES * 2];
        self.old_r = [0.0; MAX_PHASER_STAGES * 2];
        self.xn1_l = [0.0; MAX_PHASER_STAGES];
        self.xn1_r = [0.0; MAX_PHASER_STAGES];
        self.yn1_l = [0.0; MAX_PHASER_STAGES];
        self.yn1_r = [0.0; MAX_PHASER_STAGES];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(phaser: &mut Phaser) -> (Vec<f32>, Vec<f32>) {
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.05).sin()).collect();
        let mut out_l = vec![0.0; 256];
        let mut out_r = vec![0.0; 256];
        for _ in 0..20 {
            phaser.out(&input, &input, &mut out_l, &mut out_r);
        }
        (out_l, out_r)
    }

    #[test]
    fn test_stages_clamped() {
        let mut phaser = Phaser::new(false, 44100.0, 256);
        phaser.change_par(8, 40);
        assert_eq!(phaser.get_par(8), MAX_PHASER_STAGES as u8 - 1);
        phaser.change_par(8, 0);
        assert_eq!(phaser.get_par(8), 1);
    }

    #[test]
    fn test_both_models_stay_finite() {
        for preset in [0, 7] {
            let mut phaser = Phaser::new(true, 44100.0, 256);
            phaser.set_preset(preset);
            let (l, r) = run(&mut phaser);
            assert!(l.iter().chain(r.iter()).all(|x| x.is_finite()));
        }
    }

    #[test]
    fn test_switch_limits() {
        assert_eq!(limits(8).unwrap().min, 1.0);
        assert!(!limits(14).unwrap().learnable);
        assert!(limits(15).is_none());
    }
}
