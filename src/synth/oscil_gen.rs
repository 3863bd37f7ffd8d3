// Oscillator generator - wavetable of one add voice
//
// The table is rebuilt from the harmonic tables only when the bound
// OscilParams changed since the last look, or when the size changed.

use crate::messaging::controls::MAX_HARMONICS;
use crate::params::ParamGroup;
use crate::params::base::ParamsUpdate;
use crate::params::oscillator::{BaseFunction, OscilParams};
use std::f32::consts::{PI, TAU};

pub const MIN_OSCIL_SIZE: usize = 256;
pub const MAX_OSCIL_SIZE: usize = 16384;
pub const DEFAULT_OSCIL_SIZE: usize = 1024;

/// Base function value at `x` (0..1), `par` in 0..1
pub fn base_function(function: BaseFunction, par: f32, x: f32) -> f32 {
    match function {
        BaseFunction::Sine => (x * TAU).sin(),
        BaseFunction::Triangle => {
            if x < 0.25 {
                x * 4.0
            } else if x < 0.75 {
                2.0 - x * 4.0
            } else {
                x * 4.0 - 4.0
            }
        }
        BaseFunction::Pulse => {
            if x < par.clamp(0.01, 0.99) {
                1.0
            } else {
                -1.0
            }
        }
        BaseFunction::Saw => x * 2.0 - 1.0,
        BaseFunction::Power => {
            let s = (x * TAU).sin();
            s.abs().powf(0.25 + par * 4.0).copysign(s)
        }
        BaseFunction::Gauss => {
            let d = (x - 0.5) * (2.0 + par * 30.0);
            (-d * d).exp() * 2.0 - 1.0
        }
        BaseFunction::Diode => {
            let floor = par * 2.0 - 1.0;
            (x * TAU).sin().max(floor.min(0.99))
        }
        BaseFunction::AbsSine => (x * PI).sin().abs().powf(0.5 + par) * 2.0 - 1.0,
    }
}

pub struct OscilGen {
    update: ParamsUpdate,
    table: Vec<f32>,
    /// Size the table was generated at
    generated_size: usize,
    regenerations: u64,
}

impl OscilGen {
    /// Bound to `params` with no table yet
    pub fn empty(params: &OscilParams) -> Self {
        Self {
            update: ParamsUpdate::stale(params.base()),
            table: Vec::new(),
            generated_size: 0,
            regenerations: 0,
        }
    }

    pub fn new(params: &OscilParams, size: usize) -> Self {
        let mut oscil = Self::empty(params);
        oscil.allocate(size);
        oscil.prepare(params);
        oscil
    }

    /// (Re)allocate the table; the next `prepare` regenerates it
    pub fn allocate(&mut self, size: usize) {
        let size = size.clamp(MIN_OSCIL_SIZE, MAX_OSCIL_SIZE);
        if self.table.len() != size {
            self.table = vec![0.0; size];
        }
    }

    pub fn is_allocated(&self) -> bool {
        !self.table.is_empty()
    }

    /// Regenerate if the parameters or the size changed; true if it did
    pub fn prepare(&mut self, params: &OscilParams) -> bool {
        let changed = self.update.check_updated(params.base());
        if self.table.is_empty() {
            return false;
        }
        if !changed && self.generated_size == self.table.len() {
            return false;
        }
        self.generate(params);
        true
    }

    pub fn rebind(&mut self, params: &OscilParams) {
        self.update.change_params(params.base());
    }

    fn generate(&mut self, params: &OscilParams) {
        let function = params.base_function();
        let par = (params.base_function_par as f32 + 64.0) / 128.0;
        let shift = params.harmonic_shift as i32;
        let size = self.table.len();

        self.table.fill(0.0);
        for n in 0..MAX_HARMONICS {
            let amplitude = params.harmonic_amplitude(n);
            if amplitude == 0.0 {
                continue;
            }
            let harmonic = n as i32 + shift;
            if harmonic < 0 || harmonic >= MAX_HARMONICS as i32 {
                continue;
            }
            let multiple = (harmonic + 1) as f32;
            let phase = params.harmonic_phase_offset(n) / TAU;
            for (i, sample) in self.table.iter_mut().enumerate() {
                let x = (i as f32 / size as f32 * multiple + phase).rem_euclid(1.0);
                *sample += amplitude * base_function(function, par, x);
            }
        }

        let peak = self.table.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
        if peak > 1e-6 {
            for sample in &mut self.table {
                *sample /= peak;
            }
        }
        self.generated_size = size;
        self.regenerations += 1;
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    pub fn size(&self) -> usize {
        self.table.len()
    }

    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    /// Linearly interpolated table value at `phase` (0..1)
    #[inline]
    pub fn sample(&self, phase: f32) -> f32 {
        let size = self.table.len();
        if size == 0 {
            return 0.0;
        }
        let pos = phase * size as f32;
        let index = (pos as usize).min(size - 1);
        let frac = pos - index as f32;
        let next = if index + 1 == size { 0 } else { index + 1 };
        self.table[index] + (self.table[next] - self.table[index]) * frac
    }
}
