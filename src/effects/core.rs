// EffectCore - state shared by every effect (volume, panning, L/R cross, preset)

use crate::audio::dsp_utils::InterpolatedValue;

/// How the volume parameter maps to gain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeCurve {
    /// P/127
    Linear,
    /// Exponential with +12 dB headroom on system slots; P = 0 clears the effect
    Boosted,
    /// Exponential on both slot kinds (EQ)
    Equalizer,
}

#[derive(Debug, Clone, Copy)]
pub struct EffectCore {
    pub insertion: bool,
    pub sample_rate: f32,
    pub buffer_size: usize,
    pub preset: u8,
    pub p_volume: u8,
    pub p_panning: u8,
    pub p_lrcross: u8,
    /// Gain applied by the slot mixer (insertion dry/wet or system level)
    pub volume: InterpolatedValue,
    pub out_volume: InterpolatedValue,
    pub pan_l: InterpolatedValue,
    pub pan_r: InterpolatedValue,
    pub lrcross: InterpolatedValue,
    /// Set by a preset recall, cleared by `changepar(-1, 0)`
    pub changed: bool,
    curve: VolumeCurve,
}

impl EffectCore {
    pub fn new(insertion: bool, curve: VolumeCurve, sample_rate: f32, buffer_size: usize) -> Self {
        let mut core = Self {
            insertion,
            sample_rate,
            buffer_size,
            preset: 0,
            p_volume: 0,
            p_panning: 64,
            p_lrcross: 40,
            volume: InterpolatedValue::new(0.5, sample_rate),
            out_volume: InterpolatedValue::new(0.5, sample_rate),
            pan_l: InterpolatedValue::new(0.5, sample_rate),
            pan_r: InterpolatedValue::new(0.5, sample_rate),
            lrcross: InterpolatedValue::new(0.5, sample_rate),
            changed: false,
            curve,
        };
        core.set_panning(64);
        core.set_lrcross(40);
        core
    }

    /// Store the volume parameter; true when the effect must be cleaned up
    pub fn set_volume(&mut self, value: u8) -> bool {
        self.p_volume = value;
        let norm = value as f32 / 127.0;
        let out = match self.curve {
            VolumeCurve::Linear => norm,
            VolumeCurve::Boosted if !self.insertion => 0.01f32.powf(1.0 - norm) * 4.0,
            VolumeCurve::Boosted => norm,
            VolumeCurve::Equalizer => 0.005f32.powf(1.0 - norm) * 10.0,
        };
        self.out_volume.set_target(out);
        self.volume.set_target(if self.insertion { out } else { 1.0 });
        self.curve == VolumeCurve::Boosted && value == 0
    }

    pub fn set_panning(&mut self, value: u8) {
        self.p_panning = value;
        let t = if value > 0 {
            (value as f32 - 1.0) / 126.0
        } else {
            0.0
        };
        self.pan_l.set_target((t * std::f32::consts::FRAC_PI_2).cos());
        self.pan_r.set_target(((1.0 - t) * std::f32::consts::FRAC_PI_2).cos());
    }

    pub fn set_lrcross(&mut self, value: u8) {
        self.p_lrcross = value;
        self.lrcross.set_target(value as f32 / 127.0);
    }

    /// Drop any glide in progress; used right after construction
    pub fn settle(&mut self) {
        for value in [
            &mut self.volume,
            &mut self.out_volume,
            &mut self.pan_l,
            &mut self.pan_r,
            &mut self.lrcross,
        ] {
            let target = value.target();
            value.reset(target);
        }
    }

    /// Mix left and right by the current L/R cross amount
    #[inline]
    pub fn cross(&mut self, l: f32, r: f32) -> (f32, f32) {
        let x = self.lrcross.get_and_advance();
        (l * (1.0 - x) + r * x, r * (1.0 - x) + l * x)
    }

    /// Input scaled by the panning gains
    #[inline]
    pub fn pan(&mut self, l: f32, r: f32) -> (f32, f32) {
        (l * self.pan_l.get_and_advance(), r * self.pan_r.get_and_advance())
    }
}

/// Decode a packed preset request: whole preset, or (parameter, preset)
pub fn unpack_preset(npreset: u8, count: usize) -> (usize, Option<usize>) {
    if npreset < 0xF {
        ((npreset as usize).min(count - 1), None)
    } else {
        let preset = ((npreset & 0xF) as usize).min(count - 1);
        let param = match npreset >> 4 {
            0xF => 0,
            p => p as usize,
        };
        (preset, Some(param))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_curves() {
        let mut insertion = EffectCore::new(true, VolumeCurve::Boosted, 44100.0, 128);
        insertion.set_volume(127);
        assert_eq!(insertion.volume.target(), 1.0);
        assert_eq!(insertion.out_volume.target(), 1.0);

        let mut system = EffectCore::new(false, VolumeCurve::Boosted, 44100.0, 128);
        system.set_volume(127);
        assert_eq!(system.volume.target(), 1.0);
        assert!((system.out_volume.target() - 4.0).abs() < 1e-5);
        assert!(system.set_volume(0));

        let mut linear = EffectCore::new(false, VolumeCurve::Linear, 44100.0, 128);
        assert!(!linear.set_volume(0));
        assert_eq!(linear.out_volume.target(), 0.0);
    }

    #[test]
    fn test_panning_law() {
        let mut core = EffectCore::new(true, VolumeCurve::Linear, 44100.0, 128);
        core.set_panning(1);
        assert!((core.pan_l.target() - 1.0).abs() < 1e-6);
        assert!(core.pan_r.target().abs() < 1e-6);
        core.set_panning(0);
        assert!((core.pan_l.target() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_settle() {
        let mut core = EffectCore::new(true, VolumeCurve::Linear, 44100.0, 128);
        core.set_volume(127);
        core.settle();
        assert_eq!(core.volume.get_and_advance(), 1.0);
        assert_eq!(core.lrcross.value(), 40.0 / 127.0);
    }

    #[test]
    fn test_unpack_preset() {
        assert_eq!(unpack_preset(3, 10), (3, None));
        assert_eq!(unpack_preset(14, 10), (9, None));
        // preset 2, parameter 5
        assert_eq!(unpack_preset(0x52, 10), (2, Some(5)));
        // parameter nibble 0xF means parameter 0
        assert_eq!(unpack_preset(0xF1, 10), (1, Some(0)));
    }
}
