// EffectMgr - one effect slot (system, insertion or part insert)
//
// The slot owns at most one effect and the two output buffers it renders
// into. The buffers outlive every effect swap. All mutation happens on the
// audio thread while it applies drained commands, so `out()` can never see
// a slot in the middle of a swap.

use super::{Effect, EffectKind};
use std::sync::Arc;

/// Builds effects for a slot
///
/// The default factory goes through `EffectKind::build`; tests plug in
/// their own to count or replace constructions.
pub trait EffectFactory: Send + Sync {
    fn build(
        &self,
        kind: EffectKind,
        insertion: bool,
        sample_rate: f32,
        buffer_size: usize,
    ) -> Box<dyn Effect>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEffectFactory;

impl EffectFactory for DefaultEffectFactory {
    fn build(
        &self,
        kind: EffectKind,
        insertion: bool,
        sample_rate: f32,
        buffer_size: usize,
    ) -> Box<dyn Effect> {
        kind.build(insertion, sample_rate, buffer_size)
    }
}

pub struct EffectMgr {
    insertion: bool,
    dry_only: bool,
    nefx: u8,
    efx: Option<Box<dyn Effect>>,
    efx_out_l: Vec<f32>,
    efx_out_r: Vec<f32>,
    sample_rate: f32,
    buffer_size: usize,
    factory: Arc<dyn EffectFactory>,
}

impl EffectMgr {
    pub fn new(insertion: bool, sample_rate: f32, buffer_size: usize) -> Self {
        Self::with_factory(
            insertion,
            sample_rate,
            buffer_size,
            Arc::new(DefaultEffectFactory),
        )
    }

    pub fn with_factory(
        insertion: bool,
        sample_rate: f32,
        buffer_size: usize,
        factory: Arc<dyn EffectFactory>,
    ) -> Self {
        Self {
            insertion,
            dry_only: false,
            nefx: 0,
            efx: None,
            efx_out_l: vec![0.0; buffer_size],
            efx_out_r: vec![0.0; buffer_size],
            sample_rate,
            buffer_size,
            factory,
        }
    }

    /// Back to an empty, wet slot
    pub fn defaults(&mut self) {
        self.change_effect(0);
        self.set_dry_only(false);
    }

    /// Install effect type `nefx` (1..8); anything else empties the slot.
    ///
    /// Asking for the type already installed changes nothing: the running
    /// effect keeps its state.
    pub fn change_effect(&mut self, nefx: u8) {
        let kind = EffectKind::from_index(nefx);
        let nefx = kind.map_or(0, EffectKind::index);
        if nefx == self.nefx {
            return;
        }
        self.cleanup();
        // old effect is dropped before the new one is built
        self.efx = None;
        self.nefx = nefx;
        self.efx_out_l.fill(0.0);
        self.efx_out_r.fill(0.0);
        self.efx = kind.map(|kind| {
            self.factory
                .build(kind, self.insertion, self.sample_rate, self.buffer_size)
        });
    }

    /// Installed effect type, 0 when empty
    pub fn get_effect(&self) -> u8 {
        self.nefx
    }

    pub fn kind(&self) -> Option<EffectKind> {
        self.efx.as_ref().map(|efx| efx.kind())
    }

    pub fn is_empty(&self) -> bool {
        self.efx.is_none()
    }

    pub fn is_insertion(&self) -> bool {
        self.insertion
    }

    pub fn effect(&self) -> Option<&dyn Effect> {
        self.efx.as_deref()
    }

    pub fn effect_mut(&mut self) -> Option<&mut (dyn Effect + 'static)> {
        self.efx.as_deref_mut()
    }

    pub fn cleanup(&mut self) {
        if let Some(efx) = self.efx.as_mut() {
            efx.cleanup();
        }
    }

    pub fn get_preset(&self) -> u8 {
        self.efx.as_ref().map_or(0, |efx| efx.core().preset)
    }

    /// Whole preset or packed (parameter, preset) recall
    pub fn change_preset(&mut self, npreset: u8) {
        if let Some(efx) = self.efx.as_mut() {
            efx.set_preset(npreset);
        }
    }

    /// Parameter -1 sets the effect's `changed` flag
    pub fn set_effect_par(&mut self, npar: i32, value: u8) {
        let Some(efx) = self.efx.as_mut() else {
            return;
        };
        match usize::try_from(npar) {
            Ok(npar) => efx.change_par(npar, value),
            Err(_) if npar == -1 => efx.core_mut().changed = value != 0,
            Err(_) => {}
        }
    }

    pub fn get_effect_par(&self, npar: i32) -> u8 {
        let Some(efx) = self.efx.as_ref() else {
            return 0;
        };
        match usize::try_from(npar) {
            Ok(npar) => efx.get_par(npar),
            Err(_) if npar == -1 => efx.core().changed as u8,
            Err(_) => 0,
        }
    }

    /// Part inserts keep dry and wet apart: the caller mixes the wet
    /// signal itself.
    pub fn set_dry_only(&mut self, dry_only: bool) {
        self.dry_only = dry_only;
    }

    pub fn dry_only(&self) -> bool {
        self.dry_only
    }

    /// Wet output of the last `out()` call
    pub fn efx_out(&self) -> (&[f32], &[f32]) {
        (&self.efx_out_l, &self.efx_out_r)
    }

    /// Run the slot over `smps_l`/`smps_r` in place.
    ///
    /// Insertion slots crossfade dry and wet by the effect volume; system
    /// slots replace the signal with the wet output scaled by twice the
    /// volume. An empty insertion slot silences the caller's buffers, an
    /// empty system slot only clears its own.
    pub fn out(&mut self, smps_l: &mut [f32], smps_r: &mut [f32]) {
        let n = smps_l.len().min(smps_r.len()).min(self.buffer_size);
        let smps_l = &mut smps_l[..n];
        let smps_r = &mut smps_r[..n];
        let efx_l = &mut self.efx_out_l[..n];
        let efx_r = &mut self.efx_out_r[..n];

        let Some(efx) = self.efx.as_mut() else {
            if self.insertion {
                smps_l.fill(0.0);
                smps_r.fill(0.0);
            }
            efx_l.fill(0.0);
            efx_r.fill(0.0);
            return;
        };

        efx_l.fill(0.0);
        efx_r.fill(0.0);
        efx.out(smps_l, smps_r, efx_l, efx_r);

        let kind = efx.kind();
        if kind == EffectKind::Eq {
            smps_l.copy_from_slice(efx_l);
            smps_r.copy_from_slice(efx_r);
            return;
        }

        let core = efx.core_mut();
        if self.insertion {
            let squared = kind.squared_wet();
            for i in 0..n {
                let volume = core.volume.get_and_advance();
                let (v1, mut v2) = if volume < 0.5 {
                    (1.0, volume * 2.0)
                } else {
                    ((1.0 - volume) * 2.0, 1.0)
                };
                if squared {
                    v2 *= v2;
                }
                if self.dry_only {
                    smps_l[i] *= v1;
                    smps_r[i] *= v1;
                    efx_l[i] *= v2;
                    efx_r[i] *= v2;
                } else {
                    smps_l[i] = smps_l[i] * v1 + efx_l[i] * v2;
                    smps_r[i] = smps_r[i] * v1 + efx_r[i] * v2;
                }
            }
        } else {
            for i in 0..n {
                let volume = core.volume.get_and_advance();
                efx_l[i] *= 2.0 * volume;
                efx_r[i] *= 2.0 * volume;
                smps_l[i] = efx_l[i];
                smps_r[i] = efx_r[i];
            }
        }
    }

    /// Send level of a system slot; 1.0 when empty
    pub fn sys_efx_volume(&self) -> f32 {
        self.efx
            .as_ref()
            .map_or(1.0, |efx| efx.core().out_volume.target())
    }

    /// EQ response in dB, 0.0 for any other effect
    pub fn eq_response(&self, freq: f32) -> f32 {
        match self.efx.as_ref() {
            Some(efx) if efx.kind() == EffectKind::Eq => efx.response(freq),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::core::{EffectCore, VolumeCurve};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wet output is twice the input, nothing else
    struct Doubler {
        kind: EffectKind,
        core: EffectCore,
    }

    impl Effect for Doubler {
        fn kind(&self) -> EffectKind {
            self.kind
        }
        fn core(&self) -> &EffectCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut EffectCore {
            &mut self.core
        }
        fn out(&mut self, in_l: &[f32], in_r: &[f32], efx_l: &mut [f32], efx_r: &mut [f32]) {
            for i in 0..efx_l.len() {
                efx_l[i] = in_l[i] * 2.0;
                efx_r[i] = in_r[i] * 2.0;
            }
        }
        fn change_par(&mut self, npar: usize, value: u8) {
            if npar == 0 {
                self.core.set_volume(value);
            }
        }
        fn get_par(&self, npar: usize) -> u8 {
            if npar == 0 { self.core.p_volume } else { 0 }
        }
        fn cleanup(&mut self) {}
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
    }

    impl EffectFactory for CountingFactory {
        fn build(&self, kind: EffectKind, insertion: bool, sr: f32, bs: usize) -> Box<dyn Effect> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Box::new(Doubler {
                kind,
                core: EffectCore::new(insertion, VolumeCurve::Linear, sr, bs),
            })
        }
    }

    fn doubler_slot(kind: EffectKind, insertion: bool, volume: f32) -> EffectMgr {
        let mut mgr = EffectMgr::with_factory(insertion, 44100.0, 8, Arc::new(CountingFactory::default()));
        mgr.change_effect(kind.index());
        if let Some(efx) = mgr.effect_mut() {
            efx.core_mut().volume.reset(volume);
        }
        mgr
    }

    fn impulse() -> (Vec<f32>, Vec<f32>) {
        let mut l = vec![0.0; 8];
        l[0] = 1.0;
        (l.clone(), l)
    }

    #[test]
    fn test_empty_insertion_slot_silences() {
        let mut mgr = EffectMgr::new(true, 44100.0, 8);
        let mut l = vec![0.5; 8];
        let mut r = vec![0.5; 8];
        mgr.out(&mut l, &mut r);
        assert!(l.iter().chain(r.iter()).all(|&x| x == 0.0));
    }

    #[test]
    fn test_empty_system_slot_keeps_input() {
        let mut mgr = EffectMgr::new(false, 44100.0, 8);
        let mut l = vec![0.5; 8];
        let mut r = vec![0.5; 8];
        mgr.out(&mut l, &mut r);
        assert!(l.iter().chain(r.iter()).all(|&x| x == 0.5));
        let (efx_l, efx_r) = mgr.efx_out();
        assert!(efx_l.iter().chain(efx_r.iter()).all(|&x| x == 0.0));
        assert_eq!(mgr.sys_efx_volume(), 1.0);
    }

    #[test]
    fn test_same_type_builds_once() {
        let factory = Arc::new(CountingFactory::default());
        let mut mgr = EffectMgr::with_factory(true, 44100.0, 8, factory.clone());
        mgr.change_effect(3);
        mgr.change_effect(3);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.get_effect(), 3);

        mgr.change_effect(4);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_type_empties_slot() {
        let mut mgr = EffectMgr::new(true, 44100.0, 8);
        mgr.change_effect(2);
        assert!(!mgr.is_empty());
        mgr.change_effect(42);
        assert!(mgr.is_empty());
        assert_eq!(mgr.get_effect(), 0);
        assert_eq!(mgr.get_preset(), 0);
        assert_eq!(mgr.get_effect_par(0), 0);
    }

    #[test]
    fn test_insertion_crossfade_ends() {
        let (mut l, mut r) = impulse();
        let mut dry = doubler_slot(EffectKind::Chorus, true, 0.0);
        dry.out(&mut l, &mut r);
        assert_eq!(l[0], 1.0);

        let (mut l, mut r) = impulse();
        let mut wet = doubler_slot(EffectKind::Chorus, true, 1.0);
        wet.out(&mut l, &mut r);
        assert_eq!(l[0], 2.0);
    }

    #[test]
    fn test_reverb_and_echo_wet_is_squared() {
        for (kind, expected) in [
            (EffectKind::Chorus, 1.0 + 2.0 * 0.5),
            (EffectKind::Reverb, 1.0 + 2.0 * 0.25),
            (EffectKind::Echo, 1.0 + 2.0 * 0.25),
        ] {
            let (mut l, mut r) = impulse();
            let mut mgr = doubler_slot(kind, true, 0.25);
            mgr.out(&mut l, &mut r);
            assert!((l[0] - expected).abs() < 1e-6, "{}", kind.name());
        }
    }

    #[test]
    fn test_dry_only_keeps_wet_apart() {
        let (mut l, mut r) = impulse();
        let mut mgr = doubler_slot(EffectKind::Chorus, true, 0.75);
        mgr.set_dry_only(true);
        mgr.out(&mut l, &mut r);
        assert!((l[0] - 0.5).abs() < 1e-6);
        assert!((mgr.efx_out().0[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_system_slot_replaces_signal() {
        let (mut l, mut r) = impulse();
        let mut mgr = doubler_slot(EffectKind::Chorus, false, 1.0);
        mgr.out(&mut l, &mut r);
        // wet 2.0, times 2 * volume
        assert_eq!(l[0], 4.0);
    }

    #[test]
    fn test_changed_flag_through_minus_one() {
        let mut mgr = EffectMgr::new(false, 44100.0, 8);
        mgr.change_effect(1);
        assert_eq!(mgr.get_effect_par(-1), 0);
        mgr.set_effect_par(2, 100);
        assert_eq!(mgr.get_effect_par(-1), 1);
        mgr.set_effect_par(-1, 0);
        assert_eq!(mgr.get_effect_par(-1), 0);
    }

    #[test]
    fn test_eq_response_only_for_eq() {
        let mut mgr = EffectMgr::new(false, 44100.0, 8);
        mgr.change_effect(1);
        assert_eq!(mgr.eq_response(1000.0), 0.0);
        mgr.change_effect(7);
        mgr.set_effect_par(0, 127);
        assert!((mgr.eq_response(1000.0) - 20.0).abs() < 1e-3);
    }
}
