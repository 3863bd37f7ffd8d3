// Utilitaires DSP - anti-dénormaux, gains et interpolation de paramètres
//
// Tout ce qui est ici est appelé depuis le callback audio : pas d'allocation,
// pas de verrou.

/// Flush denormals to zero (anti-dénormaux)
///
/// Seuil: 1e-15, largement sous le bruit numérique d'un f32
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Decibels to linear gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Default glide length of an interpolated parameter
pub const DEFAULT_INTERPOLATION_MS: f32 = 10.0;

/// Linear glide towards a target over a fixed number of samples.
///
/// The target is reached exactly, so mix coefficients land on 0.0 or 1.0.
#[derive(Debug, Clone, Copy)]
pub struct InterpolatedValue {
    current: f32,
    target: f32,
    samples_to_interpolate: u32,
    samples_left: u32,
}

impl InterpolatedValue {
    pub fn new(initial: f32, sample_rate: f32) -> Self {
        Self::with_length(initial, DEFAULT_INTERPOLATION_MS, sample_rate)
    }

    pub fn with_length(initial: f32, length_ms: f32, sample_rate: f32) -> Self {
        // arrondi vers le haut : le plus doux possible
        let samples = (length_ms / 1000.0 * sample_rate).ceil().max(0.0) as u32;
        Self {
            current: initial,
            target: initial,
            samples_to_interpolate: samples,
            samples_left: 0,
        }
    }

    /// Start a new glide from the current value
    pub fn set_target(&mut self, value: f32) {
        self.target = value;
        self.samples_left = self.samples_to_interpolate;
    }

    /// Jump to `value` without gliding
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.samples_left = 0;
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_interpolating(&self) -> bool {
        self.samples_left > 0
    }

    /// Current value, then one step towards the target
    #[inline]
    pub fn get_and_advance(&mut self) -> f32 {
        let value = self.current;
        self.advance();
        value
    }

    #[inline]
    pub fn advance(&mut self) {
        if self.samples_left > 1 {
            self.current += (self.target - self.current) / self.samples_left as f32;
            self.samples_left -= 1;
        } else {
            self.current = self.target;
            self.samples_left = 0;
        }
    }

    /// Skip `samples` steps at once (per-buffer consumers)
    pub fn advance_by(&mut self, samples: u32) {
        if self.samples_left > 1 && samples < self.samples_left {
            self.current +=
                (self.target - self.current) / self.samples_left as f32 * samples as f32;
            self.samples_left -= samples;
        } else {
            self.current = self.target;
            self.samples_left = 0;
        }
    }
}
