// SynthEngine - parts, effect slots and the voice pool of one instance
//
// Owned by the audio side. Everything in here is mutated either while the
// interchange applies drained commands or while a buffer renders, both on
// the audio thread.

use super::part::Part;
use super::voice::note_frequency;
use super::voice_manager::VoicePool;
use crate::effects::{EffectFactory, EffectMgr};
use crate::messaging::controls::{NUM_INS_EFX, NUM_MIDI_PARTS, NUM_SYS_EFX};
use crate::params::ParamGroup;
use crate::params::add::AddGlobalParams;
use crate::params::master::MasterParams;
use crate::params::part::KeyMode;
use std::sync::Arc;

/// Insertion effect not routed anywhere
pub const INS_DEST_OFF: i16 = -1;
/// Insertion effect on the main output
pub const INS_DEST_MASTER: i16 = -2;

/// Kind of effect slot, the slot number is resolved against the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSection {
    System,
    Insertion,
    Part(usize),
}

/// MIDI controllers the engine reacts to
pub mod cc {
    pub const MOD_WHEEL: u8 = 1;
    pub const VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const SUSTAIN: u8 = 64;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// Send level (0..127) as a linear gain, 96 = unity
pub fn send_gain(level: u8) -> f32 {
    if level == 0 {
        0.0
    } else {
        0.1f32.powf((1.0 - level as f32 / 96.0) * 2.0)
    }
}

pub struct SynthEngine {
    id: u32,
    sample_rate: f32,
    buffer_size: usize,
    oscil_size: usize,

    pub master: MasterParams,
    pub parts: Vec<Part>,
    pub sysefx: Vec<EffectMgr>,
    pub insefx: Vec<EffectMgr>,
    /// Target of each insertion effect: part, off or master out
    pub ins_dest: [i16; NUM_INS_EFX],
    /// Send level from system effect `[from][to]`
    pub sysefx_send: [[u8; NUM_SYS_EFX]; NUM_SYS_EFX],
    /// Effect slot the UI is editing
    pub sys_efx_number: u8,
    pub ins_efx_number: u8,

    pool: VoicePool,
    tmp_l: Vec<f32>,
    tmp_r: Vec<f32>,
    peak_l: f32,
    peak_r: f32,
}

impl SynthEngine {
    pub fn new(id: u32, sample_rate: f32, buffer_size: usize, oscil_size: usize) -> Self {
        let parts = (0..NUM_MIDI_PARTS)
            .map(|n| Part::new(n as u8, sample_rate, buffer_size))
            .collect();
        let template = AddGlobalParams::new();
        let mut engine = Self {
            id,
            sample_rate,
            buffer_size,
            oscil_size,
            master: MasterParams::new(),
            parts,
            sysefx: (0..NUM_SYS_EFX)
                .map(|_| EffectMgr::new(false, sample_rate, buffer_size))
                .collect(),
            insefx: (0..NUM_INS_EFX)
                .map(|_| EffectMgr::new(true, sample_rate, buffer_size))
                .collect(),
            ins_dest: [INS_DEST_OFF; NUM_INS_EFX],
            sysefx_send: [[0; NUM_SYS_EFX]; NUM_SYS_EFX],
            sys_efx_number: 0,
            ins_efx_number: 0,
            pool: VoicePool::new(&template, sample_rate, buffer_size),
            tmp_l: vec![0.0; buffer_size],
            tmp_r: vec![0.0; buffer_size],
            peak_l: 0.0,
            peak_r: 0.0,
        };
        for part in &mut engine.parts {
            part.allocate_tables(oscil_size);
        }
        engine
    }

    /// Same engine, every effect slot built through `factory`
    pub fn with_effect_factory(
        id: u32,
        sample_rate: f32,
        buffer_size: usize,
        oscil_size: usize,
        factory: Arc<dyn EffectFactory>,
    ) -> Self {
        let mut engine = Self::new(id, sample_rate, buffer_size, oscil_size);
        let slot = |insertion| {
            EffectMgr::with_factory(insertion, sample_rate, buffer_size, factory.clone())
        };
        engine.sysefx = (0..NUM_SYS_EFX).map(|_| slot(false)).collect();
        engine.insefx = (0..NUM_INS_EFX).map(|_| slot(true)).collect();
        for part in &mut engine.parts {
            for efx in &mut part.partefx {
                *efx = slot(true);
            }
        }
        engine
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn oscil_size(&self) -> usize {
        self.oscil_size
    }

    /// New wavetable size for every part; applied between buffers
    pub fn set_oscil_size(&mut self, size: usize) {
        self.oscil_size = size;
        for part in &mut self.parts {
            part.allocate_tables(size);
        }
    }

    /// Part enable or kit item enable changed
    pub fn refresh_part(&mut self, npart: usize) {
        let Some(part) = self.parts.get_mut(npart) else {
            return;
        };
        if part.params.enabled {
            part.allocate_tables(self.oscil_size);
        } else {
            self.pool.kill_part(npart);
            part.cleanup();
        }
    }

    /// Effect slot `number` of a section; `None` is the slot being edited
    pub fn effect_slot(&self, section: EffectSection, number: Option<usize>) -> Option<&EffectMgr> {
        match section {
            EffectSection::System => {
                self.sysefx.get(number.unwrap_or(self.sys_efx_number as usize))
            }
            EffectSection::Insertion => {
                self.insefx.get(number.unwrap_or(self.ins_efx_number as usize))
            }
            EffectSection::Part(npart) => {
                let part = self.parts.get(npart)?;
                part.partefx.get(number.unwrap_or(part.params.effect_number as usize))
            }
        }
    }

    pub fn effect_slot_mut(
        &mut self,
        section: EffectSection,
        number: Option<usize>,
    ) -> Option<&mut EffectMgr> {
        match section {
            EffectSection::System => {
                let n = number.unwrap_or(self.sys_efx_number as usize);
                self.sysefx.get_mut(n)
            }
            EffectSection::Insertion => {
                let n = number.unwrap_or(self.ins_efx_number as usize);
                self.insefx.get_mut(n)
            }
            EffectSection::Part(npart) => {
                let part = self.parts.get_mut(npart)?;
                let n = number.unwrap_or(part.params.effect_number as usize);
                part.partefx.get_mut(n)
            }
        }
    }

    /// Reset All Controllers from the parameter side
    pub fn reset_controllers(&mut self, npart: usize) {
        if let Some(part) = self.parts.get_mut(npart) {
            part.ctl.reset_all();
            self.pool.release_sustained(npart);
        }
    }

    fn active_parts(&self) -> usize {
        (self.master.available_parts as usize).min(self.parts.len())
    }

    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        if velocity == 0 {
            self.note_off(channel, note);
            return;
        }
        for npart in 0..self.active_parts() {
            let params = &self.parts[npart].params;
            if params.enabled && params.midi_channel == channel && params.accepts_note(note) {
                self.part_note_on(npart, note, velocity);
            }
        }
    }

    fn part_note_on(&mut self, npart: usize, note: u8, velocity: u8) {
        let part = &self.parts[npart];
        let shifted = (note as i32 + self.master.key_shift as i32 + part.params.key_shift as i32)
            .clamp(0, 127);
        let freq = note_frequency(shifted as f32);
        let vel = part.velocity(velocity);

        match part.params.key_mode() {
            KeyMode::Poly => {}
            KeyMode::Mono => self.pool.release_part(npart),
            KeyMode::Legato => {
                let mut retuned = false;
                let age = self.pool.next_age();
                for voice in self.pool.voices_mut() {
                    if voice.part() == npart && voice.is_active() && !voice.is_releasing() {
                        voice.legato(note, freq, age);
                        retuned = true;
                    }
                }
                if retuned {
                    self.parts[npart].last_note = Some(note);
                    return;
                }
            }
        }

        let max_notes = part.params.max_notes as usize;
        for k in part.kit_items_for(note) {
            let add = &part.kit[k].add;
            let age = self.pool.next_age();
            let index = self.pool.allocate(npart, max_notes);
            self.pool
                .voice_mut(index)
                .note_on(npart, k, note, vel, freq, age, &add.global, &add.voices);
        }
        self.parts[npart].last_note = Some(note);
    }

    pub fn note_off(&mut self, channel: u8, note: u8) {
        for npart in 0..self.active_parts() {
            let part = &mut self.parts[npart];
            if !part.params.enabled || part.params.midi_channel != channel {
                continue;
            }
            self.pool.note_off(npart, note, part.ctl.sustain);
            if part.last_note == Some(note) {
                part.last_note = None;
            }
        }
    }

    pub fn controller(&mut self, channel: u8, control: u8, value: u8) {
        for npart in 0..self.active_parts() {
            let part = &mut self.parts[npart];
            if !part.params.enabled || part.params.midi_channel != channel {
                continue;
            }
            match control {
                cc::MOD_WHEEL => part.ctl.set_mod_wheel(value),
                cc::VOLUME => part.ctl.set_volume(value),
                cc::PAN => part.ctl.set_pan(value),
                cc::EXPRESSION => part.ctl.set_expression(value),
                cc::SUSTAIN => {
                    part.ctl.set_sustain(value);
                    if !part.ctl.sustain {
                        self.pool.release_sustained(npart);
                    }
                }
                cc::ALL_SOUND_OFF => self.pool.kill_part(npart),
                cc::RESET_ALL_CONTROLLERS => {
                    part.ctl.reset_all();
                    self.pool.release_sustained(npart);
                }
                cc::ALL_NOTES_OFF => self.pool.release_part(npart),
                _ => {}
            }
        }
    }

    /// Render one buffer into `out_l`/`out_r` (overwritten)
    pub fn render(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let n = out_l.len().min(out_r.len()).min(self.buffer_size);
        out_l.fill(0.0);
        out_r.fill(0.0);

        for part in self.parts.iter_mut().filter(|p| p.params.enabled) {
            part.prepare_tables();
            part.clear_buffers(n);
        }

        let pitch = self.master.detune_cents() / 1200.0;
        for voice in self.pool.voices_mut() {
            if !voice.is_active() {
                continue;
            }
            let part = &mut self.parts[voice.part()];
            if part.params.enabled {
                part.render_voice(voice, pitch, n);
            } else {
                voice.kill();
            }
        }

        for part in self.parts.iter_mut().filter(|p| p.params.enabled) {
            part.run_effects(n);
        }
        for (efx, &dest) in self.insefx.iter_mut().zip(self.ins_dest.iter()) {
            if dest < 0 || efx.is_empty() {
                continue;
            }
            if let Some(part) = self.parts.get_mut(dest as usize) {
                if part.params.enabled {
                    efx.out(&mut part.out_l[..n], &mut part.out_r[..n]);
                }
            }
        }
        for part in self.parts.iter_mut().filter(|p| p.params.enabled) {
            part.apply_gain(n);
        }

        for nefx in 0..NUM_SYS_EFX {
            if self.sysefx[nefx].is_empty() {
                continue;
            }
            let tmp_l = &mut self.tmp_l[..n];
            let tmp_r = &mut self.tmp_r[..n];
            tmp_l.fill(0.0);
            tmp_r.fill(0.0);
            for part in self.parts.iter().filter(|p| p.params.enabled) {
                let gain = part.params.send_gain(nefx);
                if gain == 0.0 {
                    continue;
                }
                for i in 0..n {
                    tmp_l[i] += part.out_l[i] * gain;
                    tmp_r[i] += part.out_r[i] * gain;
                }
            }
            for from in 0..nefx {
                let gain = send_gain(self.sysefx_send[from][nefx]);
                if gain == 0.0 || self.sysefx[from].is_empty() {
                    continue;
                }
                let (efx_l, efx_r) = self.sysefx[from].efx_out();
                for i in 0..n {
                    tmp_l[i] += efx_l[i] * gain;
                    tmp_r[i] += efx_r[i] * gain;
                }
            }
            self.sysefx[nefx].out(tmp_l, tmp_r);
            for i in 0..n {
                out_l[i] += tmp_l[i];
                out_r[i] += tmp_r[i];
            }
        }

        for part in self.parts.iter().filter(|p| p.params.enabled) {
            for i in 0..n {
                out_l[i] += part.out_l[i];
                out_r[i] += part.out_r[i];
            }
        }
        for (efx, &dest) in self.insefx.iter_mut().zip(self.ins_dest.iter()) {
            if dest == INS_DEST_MASTER && !efx.is_empty() {
                efx.out(&mut out_l[..n], &mut out_r[..n]);
            }
        }

        let gain = self.master.gain();
        let mono = self.master.mono;
        let (mut peak_l, mut peak_r) = (0.0f32, 0.0f32);
        for (l, r) in out_l[..n].iter_mut().zip(out_r[..n].iter_mut()) {
            if mono {
                let m = (*l + *r) * 0.5;
                *l = m;
                *r = m;
            }
            *l *= gain;
            *r *= gain;
            peak_l = peak_l.max(l.abs());
            peak_r = peak_r.max(r.abs());
        }
        self.peak_l = peak_l;
        self.peak_r = peak_r;
    }

    /// Silence everything: voices, effect tails, part buffers
    pub fn stop_sound(&mut self) {
        self.pool.kill_all();
        for part in &mut self.parts {
            part.cleanup();
        }
        for efx in self.sysefx.iter_mut().chain(self.insefx.iter_mut()) {
            efx.cleanup();
        }
        self.peak_l = 0.0;
        self.peak_r = 0.0;
    }

    /// Every part and effect back to defaults
    pub fn master_reset(&mut self) {
        self.stop_sound();
        self.master.defaults();
        for part in &mut self.parts {
            part.defaults();
            part.allocate_tables(self.oscil_size);
        }
        for efx in self.sysefx.iter_mut().chain(self.insefx.iter_mut()) {
            efx.defaults();
        }
        self.ins_dest = [INS_DEST_OFF; NUM_INS_EFX];
        self.sysefx_send = [[0; NUM_SYS_EFX]; NUM_SYS_EFX];
        self.sys_efx_number = 0;
        self.ins_efx_number = 0;
    }

    pub fn part_peak(&self, npart: usize) -> f32 {
        self.parts.get(npart).map_or(0.0, |p| p.peak())
    }

    pub fn main_peaks(&self) -> (f32, f32) {
        (self.peak_l, self.peak_r)
    }

    pub fn active_voices(&self) -> usize {
        self.pool.active_voice_count()
    }

    pub fn part_voices(&self, npart: usize) -> usize {
        self.pool.part_voice_count(npart)
    }
}
