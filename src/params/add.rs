// AddSynth parameters - global section plus the eight additive voices
//
// The global section owns the kit item's LFOs, filter and envelopes; each
// voice owns the harmonic table its oscillator generator is built from.

use super::base::ParamBase;
use super::envelope::{EnvelopeKind, EnvelopeParams};
use super::filter::FilterParams;
use super::lfo::{LfoKind, LfoParams};
use super::limits::Limits;
use super::oscillator::OscilParams;
use super::{ParamGroup, to_u8};
use crate::messaging::command::CommandBlock;
use crate::messaging::controls::{NUM_VOICES, add_synth, add_voice};

/// Detune in cents for the fine detune control (+-35 cents range)
fn fine_detune_cents(detune: i16) -> f32 {
    detune as f32 / 8192.0 * 35.0
}

/// Pitch offset in octaves from octave/coarse/fine controls
fn pitch_octaves(octave: i8, coarse: i8, detune: i16) -> f32 {
    octave as f32 + coarse as f32 / 12.0 + fine_detune_cents(detune) / 1200.0
}

pub struct AddGlobalParams {
    base: ParamBase,
    pub enabled: bool,
    pub volume: u8,
    pub velocity_sense: u8,
    pub panning: u8,
    pub detune: i16,
    pub octave: i8,
    pub coarse_detune: i8,
    pub stereo: bool,
    pub lfos: [LfoParams; 3],
    pub filter: FilterParams,
    pub envelopes: [EnvelopeParams; 3],
}

impl AddGlobalParams {
    pub fn new() -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            enabled: true,
            volume: 90,
            velocity_sense: 64,
            panning: 64,
            detune: 0,
            octave: 0,
            coarse_detune: 0,
            stereo: true,
            lfos: [
                LfoParams::new(LfoKind::Amplitude),
                LfoParams::new(LfoKind::Frequency),
                LfoParams::new(LfoKind::Filter),
            ],
            filter: FilterParams::new(2, 94.0, 40),
            envelopes: [
                EnvelopeParams::new(EnvelopeKind::Amplitude),
                EnvelopeParams::new(EnvelopeKind::Frequency),
                EnvelopeParams::new(EnvelopeKind::Filter),
            ],
        };
        params.defaults();
        params
    }

    pub fn pitch_octaves(&self) -> f32 {
        pitch_octaves(self.octave, self.coarse_detune, self.detune)
    }

    /// Linear output gain (-60 dB .. 0 dB)
    pub fn gain(&self) -> f32 {
        10.0f32.powf((self.volume as f32 / 127.0 - 1.0) * 3.0)
    }

    /// Reset every nested group as well
    pub fn reset_all(&mut self) {
        self.defaults();
        for lfo in &mut self.lfos {
            lfo.defaults();
        }
        self.filter.defaults();
        for envelope in &mut self.envelopes {
            envelope.defaults();
        }
    }
}

impl Default for AddGlobalParams {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamGroup for AddGlobalParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        let limits = match block.control {
            add_synth::VOLUME => Limits::int(0, 127, 90),
            add_synth::VELOCITY_SENSE | add_synth::PANNING => Limits::int(0, 127, 64),
            add_synth::ENABLE => Limits::int(0, 1, 1),
            add_synth::DETUNE_FREQUENCY => Limits::int(-8192, 8191, 0),
            add_synth::OCTAVE => Limits::int(-8, 7, 0),
            add_synth::COARSE_DETUNE => Limits::int(-64, 63, 0).fixed(),
            add_synth::STEREO => Limits::int(0, 1, 1),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let value = match block.control {
            add_synth::VOLUME => self.volume as f32,
            add_synth::VELOCITY_SENSE => self.velocity_sense as f32,
            add_synth::PANNING => self.panning as f32,
            add_synth::ENABLE => self.enabled as u8 as f32,
            add_synth::DETUNE_FREQUENCY => self.detune as f32,
            add_synth::OCTAVE => self.octave as f32,
            add_synth::COARSE_DETUNE => self.coarse_detune as f32,
            add_synth::STEREO => self.stereo as u8 as f32,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        match block.control {
            add_synth::VOLUME => self.volume = to_u8(value),
            add_synth::VELOCITY_SENSE => self.velocity_sense = to_u8(value),
            add_synth::PANNING => self.panning = to_u8(value),
            add_synth::ENABLE => self.enabled = value >= 0.5,
            add_synth::DETUNE_FREQUENCY => self.detune = value.round() as i16,
            add_synth::OCTAVE => self.octave = value.round() as i8,
            add_synth::COARSE_DETUNE => self.coarse_detune = value.round() as i8,
            add_synth::STEREO => self.stereo = value >= 0.5,
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.enabled = true;
        self.volume = 90;
        self.velocity_sense = 64;
        self.panning = 64;
        self.detune = 0;
        self.octave = 0;
        self.coarse_detune = 0;
        self.stereo = true;
        self.base.params_changed();
    }
}

pub struct AddVoiceParams {
    base: ParamBase,
    index: usize,
    pub enabled: bool,
    pub volume: u8,
    pub velocity_sense: u8,
    pub panning: u8,
    pub invert_phase: bool,
    pub detune: i16,
    pub octave: i8,
    pub coarse_detune: i8,
    pub oscil: OscilParams,
}

impl AddVoiceParams {
    pub fn new(index: usize) -> Self {
        let mut params = Self {
            base: ParamBase::new(),
            index,
            enabled: false,
            volume: 100,
            velocity_sense: 127,
            panning: 64,
            invert_phase: false,
            detune: 0,
            octave: 0,
            coarse_detune: 0,
            oscil: OscilParams::new(),
        };
        params.defaults();
        params
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pitch_octaves(&self) -> f32 {
        pitch_octaves(self.octave, self.coarse_detune, self.detune)
    }

    /// Linear voice gain, negative when the phase is inverted
    pub fn gain(&self) -> f32 {
        let gain = 10.0f32.powf((self.volume as f32 / 127.0 - 1.0) * 2.5);
        if self.invert_phase { -gain } else { gain }
    }
}

impl ParamGroup for AddVoiceParams {
    fn limits(block: &CommandBlock) -> Option<Limits> {
        // seule la première voix est active par défaut
        let first_voice = block.engine & 0x7F == 0;
        let limits = match block.control {
            add_voice::VOLUME => Limits::int(0, 127, 100),
            add_voice::VELOCITY_SENSE => Limits::int(0, 127, 127),
            add_voice::PANNING => Limits::int(0, 127, 64),
            add_voice::INVERT_PHASE => Limits::toggle(false),
            add_voice::ENABLE => Limits::int(0, 1, first_voice as i32),
            add_voice::DETUNE_FREQUENCY => Limits::int(-8192, 8191, 0),
            add_voice::OCTAVE => Limits::int(-8, 7, 0),
            add_voice::COARSE_DETUNE => Limits::int(-64, 63, 0).fixed(),
            _ => return None,
        };
        Some(limits)
    }

    fn base(&self) -> &ParamBase {
        &self.base
    }

    fn read(&self, block: &CommandBlock) -> Option<f32> {
        let value = match block.control {
            add_voice::VOLUME => self.volume as f32,
            add_voice::VELOCITY_SENSE => self.velocity_sense as f32,
            add_voice::PANNING => self.panning as f32,
            add_voice::INVERT_PHASE => self.invert_phase as u8 as f32,
            add_voice::ENABLE => self.enabled as u8 as f32,
            add_voice::DETUNE_FREQUENCY => self.detune as f32,
            add_voice::OCTAVE => self.octave as f32,
            add_voice::COARSE_DETUNE => self.coarse_detune as f32,
            _ => return None,
        };
        Some(value)
    }

    fn apply(&mut self, block: &CommandBlock) -> bool {
        let value = block.value;
        match block.control {
            add_voice::VOLUME => self.volume = to_u8(value),
            add_voice::VELOCITY_SENSE => self.velocity_sense = to_u8(value),
            add_voice::PANNING => self.panning = to_u8(value),
            add_voice::INVERT_PHASE => self.invert_phase = value >= 0.5,
            add_voice::ENABLE => self.enabled = value >= 0.5,
            add_voice::DETUNE_FREQUENCY => self.detune = value.round() as i16,
            add_voice::OCTAVE => self.octave = value.round() as i8,
            add_voice::COARSE_DETUNE => self.coarse_detune = value.round() as i8,
            _ => return false,
        }
        self.base.params_changed();
        true
    }

    fn defaults(&mut self) {
        self.enabled = self.index == 0;
        self.volume = 100;
        self.velocity_sense = 127;
        self.panning = 64;
        self.invert_phase = false;
        self.detune = 0;
        self.octave = 0;
        self.coarse_detune = 0;
        self.oscil.defaults();
        self.base.params_changed();
    }
}

/// Complete AddSynth engine of one kit item
pub struct AddSynthParams {
    pub global: AddGlobalParams,
    pub voices: [AddVoiceParams; NUM_VOICES],
}

impl AddSynthParams {
    pub fn new() -> Self {
        Self {
            global: AddGlobalParams::new(),
            voices: std::array::from_fn(AddVoiceParams::new),
        }
    }

    pub fn defaults(&mut self) {
        self.global.reset_all();
        for voice in &mut self.voices {
            voice.defaults();
        }
    }
}

impl Default for AddSynthParams {
    fn default() -> Self {
        Self::new()
    }
}
