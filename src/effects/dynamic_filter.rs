// DynamicFilter - filter swept by the effect LFO and an envelope follower
//
// The effect owns its FilterParams group, so the control thread can reach
// it through `filter_params_mut`; both channel filters pick up edits at the
// start of the next buffer.

use super::core::{EffectCore, VolumeCurve};
use super::lfo::EffectLfo;
use super::{Effect, EffectKind};
use crate::params::filter::FilterParams;
use crate::params::limits::{DEFAULT_LIMITS, Limits};
use crate::params::ParamGroup;
use crate::synth::filter::Filter;

pub static PRESETS: &[&[u8]] = &[
    // WahWah
    &[110, 64, 80, 0, 0, 64, 0, 90, 0, 60],
    // AutoWah
    &[110, 64, 70, 0, 0, 80, 70, 0, 0, 60],
    // Sweep
    &[100, 64, 30, 0, 0, 50, 80, 0, 0, 60],
    // VocalMorph1
    &[110, 64, 80, 0, 0, 64, 0, 64, 0, 60],
    // VocalMorph2
    &[127, 64, 50, 0, 0, 96, 64, 0, 0, 60],
];

/// Filter settings loaded with each preset:
/// (category, analog type, frequency, q, stages)
const PRESET_FILTERS: [(u8, u8, f32, u8, u8); 5] = [
    (0, 2, 45.0, 64, 1),
    (2, 0, 72.0, 64, 0),
    (0, 4, 64.0, 64, 2),
    (1, 0, 50.0, 70, 1),
    (1, 0, 64.0, 70, 1),
];

pub fn limits(control: u8) -> Option<Limits> {
    let limits = match control {
        0..=3 | 5..=7 | 9 | 16 => DEFAULT_LIMITS,
        4 | 8 => Limits::int(0, 1, 0).fixed(),
        _ => return None,
    };
    Some(limits)
}

pub struct DynamicFilter {
    core: EffectCore,
    lfo: EffectLfo,
    params: FilterParams,
    filter_l: Filter,
    filter_r: Filter,

    p_depth: u8,
    p_ampsns: u8,
    p_ampsnsinv: bool,
    p_ampsmooth: u8,

    depth: f32,
    ampsns: f32,
    ampsmooth: f32,
    ms1: f32,
    ms2: f32,
    ms3: f32,
    ms4: f32,
}

impl DynamicFilter {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        let params = FilterParams::new(0, 64.0, 64);
        let filter_l = Filter::new(&params, sample_rate);
        let filter_r = Filter::new(&params, sample_rate);
        let mut dynfilter = Self {
            core: EffectCore::new(insertion, VolumeCurve::Linear, sample_rate, buffer_size),
            lfo: EffectLfo::new(sample_rate, buffer_size),
            params,
            filter_l,
            filter_r,
            p_depth: 0,
            p_ampsns: 90,
            p_ampsnsinv: false,
            p_ampsmooth: 60,
            depth: 0.0,
            ampsns: 0.0,
            ampsmooth: 0.0,
            ms1: 0.0,
            ms2: 0.0,
            ms3: 0.0,
            ms4: 0.0,
        };
        dynfilter.core.set_volume(110);
        dynfilter.set_ampsns(90);
        dynfilter
    }

    fn set_depth(&mut self, value: u8) {
        self.p_depth = value;
        self.depth = (value as f32 / 127.0).powi(2);
    }

    fn set_ampsns(&mut self, value: u8) {
        self.p_ampsns = value;
        self.ampsns = (value as f32 / 127.0).powf(2.5) * 10.0;
        if self.p_ampsnsinv {
            self.ampsns = -self.ampsns;
        }
        self.ampsmooth = (-(self.p_ampsmooth as f32) / 127.0 * 10.0).exp() * 0.99;
    }

    /// Envelope follower level after the last buffer
    pub fn envelope(&self) -> f32 {
        self.ms4.sqrt()
    }
}

impl Effect for DynamicFilter {
    fn kind(&self) -> EffectKind {
        EffectKind::DynamicFilter
    }

    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EffectCore {
        &mut self.core
    }

    fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
        let changed = self.filter_l.update(&self.params);
        self.filter_r.update(&self.params);
        if changed {
            self.cleanup();
        }

        let (lfo_l, lfo_r) = self.lfo.out();
        let lfo_l = lfo_l * self.depth * 5.0;
        let lfo_r = lfo_r * self.depth * 5.0;

        efx_l.copy_from_slice(in_l);
        efx_r.copy_from_slice(in_r);
        for (l, r) in in_l.iter().zip(in_r.iter()) {
            let x = (l.abs() + r.abs()) * 0.5;
            self.ms1 = self.ms1 * (1.0 - self.ampsmooth) + x * self.ampsmooth + 1e-10;
        }

        let ampsmooth2 = self.ampsmooth.powf(0.2) * 0.3;
        self.ms2 = self.ms2 * (1.0 - ampsmooth2) + self.ms1 * ampsmooth2;
        self.ms3 = self.ms3 * (1.0 - ampsmooth2) + self.ms2 * ampsmooth2;
        self.ms4 = self.ms4 * (1.0 - ampsmooth2) + self.ms3 * ampsmooth2;
        let rms = self.ms4.sqrt() * self.ampsns;

        // lfo and envelope move the cutoff in octaves
        let base = self.params.frequency_hz();
        self.filter_l.set_frequency(base * 2.0f32.powf(lfo_l + rms));
        self.filter_r.set_frequency(base * 2.0f32.powf(lfo_r + rms));
        self.filter_l.process_buffer(efx_l);
        self.filter_r.process_buffer(efx_r);

        for (l, r) in efx_l.iter_mut().zip(efx_r.iter_mut()) {
            *l *= self.core.pan_l.get_and_advance();
            *r *= self.core.pan_r.get_and_advance();
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
            7 => self.set_ampsns(value),
            8 => {
                self.p_ampsnsinv = value > 0;
                self.set_ampsns(self.p_ampsns);
            }
            9 => {
                self.p_ampsmooth = value;
                self.set_ampsns(self.p_ampsns);
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
            7 => self.p_ampsns,
            8 => self.p_ampsnsinv as u8,
            9 => self.p_ampsmooth,
            _ => 0,
        }
    }

    fn cleanup(&mut self) {
        self.filter_l.update(&self.params);
        self.filter_r.update(&self.params);
        self.filter_l.reset();
        self.filter_r.reset();
        self.ms1 = 0.0;
        self.ms2 = 0.0;
        self.ms3 = 0.0;
        self.ms4 = 0.0;
    }

    fn preset_loaded(&mut self, preset: usize) {
        let (category, analog_type, freq, q, stages) =
            PRESET_FILTERS[preset.min(PRESET_FILTERS.len() - 1)];
        self.params.defaults();
        self.params.category = category;
        self.params.analog_type = analog_type;
        self.params.center_freq = freq;
        self.params.q = q;
        self.params.stages = stages;
        self.params.gain = 64;
        self.params.params_changed();
        self.cleanup();
    }

    fn filter_params(&self) -> Option<&FilterParams> {
        Some(&self.params)
    }

    fn filter_params_mut(&mut self) -> Option<&mut FilterParams> {
        Some(&mut self.params)
    }
}
