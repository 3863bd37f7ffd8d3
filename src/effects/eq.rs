// EQ - eight band parametric equaliser
//
// Band parameters live at 10 + band * 5 + {type, freq, gain, q, stages}.
// Frequency, gain and Q glide per buffer; coefficients are only rebuilt
// while one of them is still moving.

use super::core::{EffectCore, VolumeCurve};
use super::{Effect, EffectKind};
use crate::audio::dsp_utils::InterpolatedValue;
use crate::params::limits::Limits;
use crate::synth::filter::{Biquad, BiquadKind, MAX_FILTER_STAGES};

pub const MAX_EQ_BANDS: usize = 8;

/// First band parameter
const BAND_BASE: usize = 10;
const BAND_PARAMS: usize = 5;

pub static PRESETS: &[&[u8]] = &[
    // EQ 1
    &[67],
    // EQ 2
    &[67],
];

pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        0 => Limits::int(0, 127, 64),
        1 => Limits::int(0, MAX_EQ_BANDS as i32 - 1, 0).fixed(),
        10 => Limits::int(0, 9, 0).fixed(),
        11..=13 => Limits::int(0, 127, 64),
        14 => Limits::int(0, MAX_FILTER_STAGES as i32 - 1, 0).fixed(),
        _ => return None,
    };
    Some(limits)
}

/// Effect parameter addressed by a band control (10..14) of `band`
pub fn band_par(band: u8, control: u8) -> Option<usize> {
    if (band as usize) < MAX_EQ_BANDS && (10..=14).contains(&control) {
        Some(BAND_BASE + band as usize * BAND_PARAMS + (control as usize - BAND_BASE))
    } else {
        None
    }
}

fn band_freq(value: u8) -> f32 {
    600.0 * 30.0f32.powf((value as f32 - 64.0) / 64.0)
}

fn band_gain(value: u8) -> f32 {
    30.0 * (value as f32 - 64.0) / 64.0
}

fn band_q(value: u8) -> f32 {
    30.0f32.powf((value as f32 - 64.0) / 64.0)
}

struct Band {
    p_type: u8,
    p_freq: u8,
    p_gain: u8,
    p_q: u8,
    p_stages: u8,
    freq: InterpolatedValue,
    gain: InterpolatedValue,
    q: InterpolatedValue,
    l: [Biquad; MAX_FILTER_STAGES],
    r: [Biquad; MAX_FILTER_STAGES],
}

impl Band {
    fn new(sample_rate: f32) -> Self {
        let section = Biquad::new(BiquadKind::Peak2, 1000.0, 1.0, 0.0, sample_rate);
        Self {
            p_type: 0,
            p_freq: 64,
            p_gain: 64,
            p_q: 64,
            p_stages: 0,
            freq: InterpolatedValue::new(band_freq(64), sample_rate),
            gain: InterpolatedValue::new(band_gain(64), sample_rate),
            q: InterpolatedValue::new(band_q(64), sample_rate),
            l: [section; MAX_FILTER_STAGES],
            r: [section; MAX_FILTER_STAGES],
        }
    }

    fn kind(&self) -> BiquadKind {
        BiquadKind::from(self.p_type.saturating_sub(1))
    }

    fn stages(&self) -> usize {
        self.p_stages as usize + 1
    }

    fn update_coefficients(&mut self, sample_rate: f32) {
        let kind = self.kind();
        let (freq, q, gain) = (self.freq.value(), self.q.value(), self.gain.value());
        for section in self.l.iter_mut().chain(self.r.iter_mut()) {
            section.set(kind, freq, q, gain, sample_rate);
        }
    }
}

pub struct Equalizer {
    core: EffectCore,
    p_band: u8,
    bands: Vec<Band>,
}

impl Equalizer {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        let mut eq = Self {
            core: EffectCore::new(insertion, VolumeCurve::Equalizer, sample_rate, buffer_size),
            p_band: 0,
            bands: (0..MAX_EQ_BANDS).map(|_| Band::new(sample_rate)).collect(),
        };
        eq.core.set_volume(50);
        eq
    }

    fn change_band_par(&mut self, band: usize, bp: usize, value: u8) {
        let sr = self.core.sample_rate;
        let band = &mut self.bands[band];
        match bp {
            0 => {
                band.p_type = if value > 9 { 0 } else { value };
                if band.p_type != 0 {
                    band.update_coefficients(sr);
                }
            }
            1 => {
                band.p_freq = value;
                band.freq.set_target(band_freq(value));
            }
            2 => {
                band.p_gain = value;
                band.gain.set_target(band_gain(value));
            }
            3 => {
                band.p_q = value;
                band.q.set_target(band_q(value));
            }
            _ => {
                band.p_stages = value.min(MAX_FILTER_STAGES as u8 - 1);
                band.update_coefficients(sr);
            }
        }
    }

    fn band_index(npar: usize) -> Option<(usize, usize)> {
        if npar < BAND_BASE {
            return None;
        }
        let nb = (npar - BAND_BASE) / BAND_PARAMS;
        (nb < MAX_EQ_BANDS).then_some((nb, (npar - BAND_BASE) % BAND_PARAMS))
    }
}

impl Effect for Equalizer {
    fn kind(&self) -> EffectKind {
        EffectKind::Eq
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let n = efx_l.len();
        for i in 0..n {
            let volume = self.core.volume.get_and_advance();
            efx_l[i] = in_l[i] * volume;
            efx_r[i] = in_r[i] * volume;
        }

        let sr = self.core.sample_rate;
        for band in self.bands.iter_mut().filter(|b| b.p_type != 0) {
            if band.freq.is_interpolating()
                || band.gain.is_interpolating()
                || band.q.is_interpolating()
            {
                band.freq.advance_by(n as u32);
                band.gain.advance_by(n as u32);
                band.q.advance_by(n as u32);
                band.update_coefficients(sr);
            }
            let stages = band.stages();
            for section in &mut band.l[..stages] {
                for x in efx_l.iter_mut() {
                    *x = section.process(*x);
                }
            }
            for section in &mut band.r[..stages] {
                for x in efx_r.iter_mut() {
                    *x = section.process(*x);
                }
            }
        }
    }

    fn change_par(&mut self, npar: usize, value: u8) {
        match npar {
            0 => {
                self.core.set_volume(value);
            }
            1 => self.p_band = value.min(MAX_EQ_BANDS as u8 - 1),
            _ => match Self::band_index(npar) {
                Some((nb, bp)) => self.change_band_par(nb, bp, value),
                None => return,
            },
        }
        self.core.changed = true;
    }

    fn get_par(&self, npar: usize) -> u8 {
        match npar {
            0 => self.core.p_volume,
            1 => self.p_band,
            _ => match Self::band_index(npar) {
                Some((nb, bp)) => {
                    let band = &self.bands[nb];
                    [band.p_type, band.p_freq, band.p_gain, band.p_q, band.p_stages][bp]
                }
                None => 0,
            },
        }
    }

    fn cleanup(&mut self) {
        for band in &mut self.bands {
            for section in band.l.iter_mut().chain(band.r.iter_mut()) {
                section.reset();
            }
        }
    }

    /// Response in dB at `freq`, from the band targets
    fn response(&self, freq: f32) -> f32 {
        let sr = self.core.sample_rate;
        let mut resp = 1.0f32;
        for band in self.bands.iter().filter(|b| b.p_type != 0) {
            let mut section = Biquad::default();
            section.set(
                band.kind(),
                band.freq.target(),
                band.q.target(),
                band.gain.target(),
                sr,
            );
            resp *= section.response(freq, sr).powi(band.stages() as i32);
        }
        20.0 * (resp * self.core.out_volume.target()).max(1e-10).log10()
    }
}
