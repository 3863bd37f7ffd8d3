// Part - one MIDI-addressable instrument
//
// Holds the part parameters, the live controllers, the kit items with
// their AddSynth parameters, the wavetables of the add voices and the
// part effects. Voices come from the engine pool.

use super::oscil_gen::OscilGen;
use super::voice::Voice;
use crate::effects::EffectMgr;
use crate::messaging::controls::{NUM_KIT_ITEMS, NUM_PART_EFX};
use crate::params::ParamGroup;
use crate::params::part::{ControllerParams, KitItemParams, PartParams, pan_gains};

/// Which kit items answer a note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitMode {
    /// Only the first item
    Off,
    /// Every item whose range covers the note
    Multi,
    /// The first item whose range covers the note
    Single,
}

impl From<u8> for KitMode {
    fn from(value: u8) -> Self {
        match value {
            0 => KitMode::Off,
            2 => KitMode::Single,
            _ => KitMode::Multi,
        }
    }
}

pub struct Part {
    pub params: PartParams,
    pub ctl: ControllerParams,
    pub kit: Vec<KitItemParams>,
    oscils: Vec<Vec<OscilGen>>,
    pub partefx: Vec<EffectMgr>,
    pub out_l: Vec<f32>,
    pub out_r: Vec<f32>,
    peak: f32,
    /// Last note for mono/legato key modes
    pub last_note: Option<u8>,
}

impl Part {
    pub fn new(number: u8, sample_rate: f32, buffer_size: usize) -> Self {
        let kit: Vec<KitItemParams> = (0..NUM_KIT_ITEMS).map(KitItemParams::new).collect();
        let oscils = kit
            .iter()
            .map(|item| item.add.voices.iter().map(|v| OscilGen::empty(&v.oscil)).collect())
            .collect();
        Self {
            params: PartParams::new(number),
            ctl: ControllerParams::new(),
            kit,
            oscils,
            partefx: (0..NUM_PART_EFX)
                .map(|_| EffectMgr::new(true, sample_rate, buffer_size))
                .collect(),
            out_l: vec![0.0; buffer_size],
            out_r: vec![0.0; buffer_size],
            peak: 0.0,
            last_note: None,
        }
    }

    /// Give every enabled kit item its wavetables.
    ///
    /// Called while commands are applied, never from the render path.
    pub fn allocate_tables(&mut self, oscil_size: usize) {
        if !self.params.enabled {
            return;
        }
        for (item, oscils) in self.kit.iter().zip(self.oscils.iter_mut()) {
            if !item.enabled {
                continue;
            }
            for oscil in oscils.iter_mut() {
                oscil.allocate(oscil_size);
            }
        }
    }

    /// Regenerate the wavetables whose parameters changed
    pub fn prepare_tables(&mut self) {
        for (item, oscils) in self.kit.iter().zip(self.oscils.iter_mut()) {
            if !item.enabled {
                continue;
            }
            for (voice, oscil) in item.add.voices.iter().zip(oscils.iter_mut()) {
                if voice.enabled {
                    oscil.prepare(&voice.oscil);
                }
            }
        }
    }

    pub fn oscil(&self, kit: usize, voice: usize) -> Option<&OscilGen> {
        self.oscils.get(kit)?.get(voice)
    }

    /// Kit items that play `note`, in order
    pub fn kit_items_for(&self, note: u8) -> impl Iterator<Item = usize> + '_ {
        let mode = KitMode::from(self.params.kit_mode);
        let mut found = false;
        self.kit.iter().enumerate().filter_map(move |(i, item)| {
            let plays = match mode {
                KitMode::Off => i == 0 && !item.muted,
                KitMode::Multi => item.plays(note),
                KitMode::Single => !found && item.plays(note),
            };
            if plays {
                found = true;
            }
            plays.then_some(i)
        })
    }

    /// Velocity after the part's sense and offset, 0..1
    pub fn velocity(&self, velocity: u8) -> f32 {
        let v = super::voice::velocity_curve(velocity as f32 / 127.0, self.params.velocity_sense);
        (v + (self.params.velocity_offset as f32 - 64.0) / 64.0).clamp(0.0, 1.0)
    }

    pub fn clear_buffers(&mut self, n: usize) {
        self.out_l[..n].fill(0.0);
        self.out_r[..n].fill(0.0);
    }

    /// Add one buffer of `voice` into the part buffers
    pub fn render_voice(&mut self, voice: &mut Voice, pitch: f32, n: usize) -> bool {
        let k = voice.kit();
        let (Some(item), Some(oscils)) = (self.kit.get(k), self.oscils.get(k)) else {
            voice.kill();
            return false;
        };
        voice.render(
            &item.add.global,
            &item.add.voices,
            oscils,
            &self.ctl,
            pitch,
            &mut self.out_l[..n],
            &mut self.out_r[..n],
        )
    }

    /// Run the part effects chain over the part buffers
    pub fn run_effects(&mut self, n: usize) {
        for (efx, bypass) in self.partefx.iter_mut().zip(self.params.effect_bypass) {
            if !bypass && !efx.is_empty() {
                efx.out(&mut self.out_l[..n], &mut self.out_r[..n]);
            }
        }
    }

    /// Part volume, panning and controllers; records the peak
    pub fn apply_gain(&mut self, n: usize) {
        let gain = self.params.gain() * self.ctl.gain();
        let panning = (self.params.panning as f32 + self.ctl.pan * 127.0).clamp(0.0, 127.0);
        let (pan_l, pan_r) = pan_gains(panning as u8);
        let mut peak = 0.0f32;
        for (l, r) in self.out_l[..n].iter_mut().zip(self.out_r[..n].iter_mut()) {
            *l *= gain * pan_l;
            *r *= gain * pan_r;
            peak = peak.max(l.abs()).max(r.abs());
        }
        self.peak = peak;
    }

    /// Output peak of the last buffer
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Every parameter back to its default, effects emptied
    pub fn defaults(&mut self) {
        self.params.defaults();
        self.ctl.defaults();
        for item in &mut self.kit {
            item.defaults();
        }
        for efx in &mut self.partefx {
            efx.defaults();
        }
        self.last_note = None;
        self.peak = 0.0;
    }

    pub fn cleanup(&mut self) {
        for efx in &mut self.partefx {
            efx.cleanup();
        }
        self.out_l.fill(0.0);
        self.out_r.fill(0.0);
        self.peak = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kit_modes() {
        let mut part = Part::new(0, 44100.0, 64);
        part.kit[1].enabled = true;
        part.kit[1].min_note = 60;
        part.kit[2].enabled = true;

        // mode off: first item only
        assert_eq!(part.kit_items_for(64).collect::<Vec<_>>(), vec![0]);

        part.params.kit_mode = 1;
        assert_eq!(part.kit_items_for(64).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(part.kit_items_for(40).collect::<Vec<_>>(), vec![0, 2]);

        part.params.kit_mode = 2;
        part.kit[0].muted = true;
        assert_eq!(part.kit_items_for(64).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_tables_only_for_enabled_items() {
        let mut part = Part::new(0, 44100.0, 64);
        part.allocate_tables(512);
        assert!(part.oscil(0, 0).unwrap().is_allocated());
        assert!(!part.oscil(1, 0).unwrap().is_allocated());

        part.prepare_tables();
        assert_eq!(part.oscil(0, 0).unwrap().regenerations(), 1);
        part.prepare_tables();
        assert_eq!(part.oscil(0, 0).unwrap().regenerations(), 1);
    }

    #[test]
    fn test_disabled_part_gets_no_tables() {
        let mut part = Part::new(5, 44100.0, 64);
        assert!(!part.params.enabled);
        part.allocate_tables(512);
        assert!(!part.oscil(0, 0).unwrap().is_allocated());
    }

    #[test]
    fn test_velocity_offset() {
        let mut part = Part::new(0, 44100.0, 64);
        assert!((part.velocity(127) - 1.0).abs() < 1e-6);
        part.params.velocity_offset = 0;
        assert_eq!(part.velocity(100), 0.0);
    }
}
