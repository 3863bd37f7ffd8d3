// EffectLfo - stereo LFO shared by Chorus, Phaser, Alienwah and DynamicFilter
//
// Advances once per buffer, not per sample.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};

static SEED: AtomicU64 = AtomicU64::new(0x5EED_1F0);

pub struct EffectLfo {
    pub p_freq: u8,
    pub p_randomness: u8,
    pub p_type: u8,
    pub p_stereo: u8,
    xl: f32,
    xr: f32,
    incx: f32,
    ampl1: f32,
    ampl2: f32,
    ampr1: f32,
    ampr2: f32,
    randomness: f32,
    shape: u8,
    sample_rate: f32,
    buffer_size: usize,
    rng: StdRng,
}

impl EffectLfo {
    pub fn new(sample_rate: f32, buffer_size: usize) -> Self {
        // graine déterministe : pas d'appel système dans le thread audio
        let mut rng = StdRng::seed_from_u64(SEED.fetch_add(0x9E37_79B9, Ordering::Relaxed));
        let mut lfo = Self {
            p_freq: 40,
            p_randomness: 0,
            p_type: 0,
            p_stereo: 64,
            xl: 0.0,
            xr: 0.0,
            incx: 0.0,
            ampl1: rng.r#gen(),
            ampl2: rng.r#gen(),
            ampr1: rng.r#gen(),
            ampr2: rng.r#gen(),
            randomness: 0.0,
            shape: 0,
            sample_rate,
            buffer_size,
            rng,
        };
        lfo.update_params();
        lfo
    }

    /// Recompute the increment and stereo offset after a parameter change
    pub fn update_params(&mut self) {
        let freq = (2.0f32.powf(self.p_freq as f32 / 127.0 * 10.0) - 1.0) * 0.03;
        self.incx = (freq.abs() * self.buffer_size as f32 / self.sample_rate).min(0.499_999_99);

        self.randomness = (self.p_randomness as f32 / 127.0).min(1.0);

        // sine and triangle only
        if self.p_type > 1 {
            self.p_type = 1;
        }
        self.shape = self.p_type;
        self.xr = (self.xl + (self.p_stereo as f32 - 64.0) / 127.0 + 1.0) % 1.0;
    }

    fn shape_at(&self, x: f32) -> f32 {
        match self.shape {
            1 => {
                if x > 0.0 && x < 0.25 {
                    4.0 * x
                } else if x > 0.25 && x < 0.75 {
                    2.0 - 4.0 * x
                } else {
                    4.0 * x - 4.0
                }
            }
            _ => (x * std::f32::consts::TAU).cos(),
        }
    }

    /// Left and right outputs in 0..1
    pub fn out(&mut self) -> (f32, f32) {
        let mut out = self.shape_at(self.xl);
        out *= self.ampl1 + self.xl * (self.ampl2 - self.ampl1);
        self.xl += self.incx;
        if self.xl > 1.0 {
            self.xl -= 1.0;
            self.ampl1 = self.ampl2;
            self.ampl2 = (1.0 - self.randomness) + self.randomness * self.rng.r#gen::<f32>();
        }
        let left = (out + 1.0) * 0.5;

        let mut out = self.shape_at(self.xr);
        out *= self.ampr1 + self.xr * (self.ampr2 - self.ampr1);
        self.xr += self.incx;
        if self.xr > 1.0 {
            self.xr -= 1.0;
            self.ampr1 = self.ampr2;
            self.ampr2 = (1.0 - self.randomness) + self.randomness * self.rng.r#gen::<f32>();
        }
        let right = (out + 1.0) * 0.5;

        (left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_is_clamped() {
        let mut lfo = EffectLfo::new(44100.0, 256);
        lfo.p_type = 5;
        lfo.update_params();
        assert_eq!(lfo.p_type, 1);
    }

    #[test]
    fn test_output_range() {
        let mut lfo = EffectLfo::new(44100.0, 256);
        lfo.p_freq = 127;
        lfo.p_randomness = 127;
        lfo.update_params();
        for _ in 0..1000 {
            let (l, r) = lfo.out();
            assert!((0.0..=1.0).contains(&l), "{l}");
            assert!((0.0..=1.0).contains(&r), "{r}");
        }
    }

    #[test]
    fn test_increment_limited() {
        let mut lfo = EffectLfo::new(8000.0, 4096);
        lfo.p_freq = 127;
        lfo.update_params();
        assert!(lfo.incx < 0.5);
    }

    #[test]
    fn test_stereo_offset() {
        let mut lfo = EffectLfo::new(44100.0, 256);
        lfo.p_stereo = 64;
        lfo.update_params();
        assert_eq!(lfo.xr, lfo.xl);
        lfo.p_stereo = 127;
        lfo.update_params();
        assert!((lfo.xr - 63.0 / 127.0).abs() < 1e-6);
    }
}
