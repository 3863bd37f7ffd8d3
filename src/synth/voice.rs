// Voice - Une note jouée
//
// Voices live in the engine-wide pool and are reused across parts and kit
// items. On note-on every consumer is rebound to the parameter groups of
// the kit item that plays the note.

use super::envelope::Envelope;
use super::lfo::Lfo;
use super::oscil_gen::OscilGen;
use crate::messaging::controls::NUM_VOICES;
use crate::params::add::{AddGlobalParams, AddVoiceParams};
use crate::params::part::{ControllerParams, pan_gains};
use crate::synth::filter::Filter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Velocity sensing curve: 64 = linear, 127 = velocity ignored
pub fn velocity_curve(velocity: f32, sense: u8) -> f32 {
    if sense >= 127 || velocity > 0.99 {
        return 1.0;
    }
    let x = 64.0f32.powf((64.0 - sense as f32) / 64.0);
    velocity.max(0.0).powf(x)
}

/// Frequency of a MIDI note with 12-TET tuning on A4 = 440 Hz
pub fn note_frequency(note: f32) -> f32 {
    440.0 * 2.0f32.powf((note - 69.0) / 12.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,
    Playing,
    /// Note off received, envelopes releasing
    Releasing,
}

pub struct Voice {
    state: VoiceState,
    part: usize,
    kit: usize,
    note: u8,
    velocity: f32,
    /// Age counter for voice stealing priority (lower = older)
    age: u64,
    /// Held by the sustain pedal after its note off
    sustained: bool,

    freq: f32,
    phases: [f32; NUM_VOICES],
    amp_env: Envelope,
    freq_env: Envelope,
    filter_env: Envelope,
    amp_lfo: Lfo,
    freq_lfo: Lfo,
    filter_lfo: Lfo,
    filter_l: Filter,
    filter_r: Filter,
    prev_amp: f32,

    buf_l: Vec<f32>,
    buf_r: Vec<f32>,
    sample_rate: f32,
    rng: StdRng,
}

impl Voice {
    /// `template` only serves as a first binding; note-on rebinds everything
    pub fn new(template: &AddGlobalParams, sample_rate: f32, buffer_size: usize, seed: u64) -> Self {
        Self {
            state: VoiceState::Free,
            part: 0,
            kit: 0,
            note: 0,
            velocity: 0.0,
            age: 0,
            sustained: false,
            freq: 440.0,
            phases: [0.0; NUM_VOICES],
            amp_env: Envelope::new(&template.envelopes[0], sample_rate, buffer_size),
            freq_env: Envelope::new(&template.envelopes[1], sample_rate, buffer_size),
            filter_env: Envelope::new(&template.envelopes[2], sample_rate, buffer_size),
            amp_lfo: Lfo::new(&template.lfos[0], sample_rate, buffer_size),
            freq_lfo: Lfo::new(&template.lfos[1], sample_rate, buffer_size),
            filter_lfo: Lfo::new(&template.lfos[2], sample_rate, buffer_size),
            filter_l: Filter::new(&template.filter, sample_rate),
            filter_r: Filter::new(&template.filter, sample_rate),
            prev_amp: 0.0,
            buf_l: vec![0.0; buffer_size],
            buf_r: vec![0.0; buffer_size],
            sample_rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn note_on(
        &mut self,
        part: usize,
        kit: usize,
        note: u8,
        velocity: f32,
        freq: f32,
        age: u64,
        global: &AddGlobalParams,
        voices: &[AddVoiceParams],
    ) {
        self.state = VoiceState::Playing;
        self.part = part;
        self.kit = kit;
        self.note = note;
        self.velocity = velocity;
        self.age = age;
        self.sustained = false;
        self.freq = freq;
        self.prev_amp = 0.0;

        for (envelope, params) in [
            (&mut self.amp_env, &global.envelopes[0]),
            (&mut self.freq_env, &global.envelopes[1]),
            (&mut self.filter_env, &global.envelopes[2]),
        ] {
            envelope.rebind(params);
            envelope.note_on(freq);
        }
        for (lfo, params) in [
            (&mut self.amp_lfo, &global.lfos[0]),
            (&mut self.freq_lfo, &global.lfos[1]),
            (&mut self.filter_lfo, &global.lfos[2]),
        ] {
            lfo.rebind(params);
            lfo.note_on(params, freq, &mut self.rng);
        }
        self.filter_l.rebind(&global.filter);
        self.filter_r.rebind(&global.filter);
        self.filter_l.reset();
        self.filter_r.reset();

        for (phase, voice) in self.phases.iter_mut().zip(voices.iter()) {
            let randomness = voice.oscil.phase_randomness as f32 / 127.0;
            *phase = self.rng.r#gen::<f32>() * randomness;
        }
    }

    /// Same voice, new pitch, envelopes untouched
    pub fn legato(&mut self, note: u8, freq: f32, age: u64) {
        self.note = note;
        self.freq = freq;
        self.age = age;
    }

    pub fn note_off(&mut self) {
        if self.state != VoiceState::Playing {
            return;
        }
        self.state = VoiceState::Releasing;
        self.sustained = false;
        self.amp_env.note_off();
        self.freq_env.note_off();
        self.filter_env.note_off();
    }

    /// Note off while the sustain pedal is down
    pub fn sustain(&mut self) {
        self.sustained = true;
    }

    pub fn kill(&mut self) {
        self.state = VoiceState::Free;
        self.sustained = false;
    }

    /// Render one buffer of this voice and add it to `out_l`/`out_r`.
    ///
    /// `pitch` is an extra offset in octaves (detune, pitch wheel).
    /// Returns false once the voice has finished and went back to the pool.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        global: &AddGlobalParams,
        voices: &[AddVoiceParams],
        oscils: &[OscilGen],
        ctl: &ControllerParams,
        pitch: f32,
        out_l: &mut [f32],
        out_r: &mut [f32],
    ) -> bool {
        if self.state == VoiceState::Free {
            return false;
        }
        let n = out_l.len().min(out_r.len()).min(self.buf_l.len());

        self.amp_env.update(&global.envelopes[0]);
        self.freq_env.update(&global.envelopes[1]);
        self.filter_env.update(&global.envelopes[2]);
        self.amp_lfo.update(&global.lfos[0]);
        self.freq_lfo.update(&global.lfos[1]);
        self.filter_lfo.update(&global.lfos[2]);
        self.filter_l.update(&global.filter);
        self.filter_r.update(&global.filter);

        let amp_env = self.amp_env.out();
        let amp_lfo = self.amp_lfo.out(&mut self.rng);
        let freq_lfo = self.freq_lfo.out(&mut self.rng) * (1.0 + ctl.mod_wheel);
        let filter_lfo = self.filter_lfo.out(&mut self.rng);
        let octaves = global.pitch_octaves() + self.freq_env.out() + freq_lfo + pitch;

        let buf_l = &mut self.buf_l[..n];
        let buf_r = &mut self.buf_r[..n];
        buf_l.fill(0.0);
        buf_r.fill(0.0);

        for ((voice, oscil), phase) in voices
            .iter()
            .zip(oscils.iter())
            .zip(self.phases.iter_mut())
        {
            if !voice.enabled || !oscil.is_allocated() {
                continue;
            }
            let freq = self.freq * 2.0f32.powf(octaves + voice.pitch_octaves());
            let inc = (freq / self.sample_rate).min(0.5);
            let mut gain = voice.gain() * velocity_curve(self.velocity, voice.velocity_sense);
            if voice.invert_phase {
                gain = -gain;
            }
            let (pan_l, pan_r) = pan_gains(voice.panning);
            let mut p = *phase;
            for (l, r) in buf_l.iter_mut().zip(buf_r.iter_mut()) {
                let s = oscil.sample(p) * gain;
                *l += s * pan_l;
                *r += s * pan_r;
                p += inc;
                if p >= 1.0 {
                    p -= 1.0;
                }
            }
            *phase = p;
        }

        let tracking = global.filter.tracking() * (self.freq / 440.0).log2();
        let cutoff = self.filter_l.base_frequency()
            * 2.0f32.powf(self.filter_env.out() + filter_lfo + tracking);
        self.filter_l.set_frequency(cutoff);
        self.filter_r.set_frequency(cutoff);
        self.filter_l.process_buffer(buf_l);
        self.filter_r.process_buffer(buf_r);
        if !global.stereo {
            for (l, r) in buf_l.iter_mut().zip(buf_r.iter_mut()) {
                let mono = (*l + *r) * 0.5;
                *l = mono;
                *r = mono;
            }
        }

        let amp = global.gain()
            * velocity_curve(self.velocity, global.velocity_sense)
            * amp_env
            * (1.0 - amp_lfo).max(0.0);
        let (pan_l, pan_r) = pan_gains(global.panning);
        let step = (amp - self.prev_amp) / n.max(1) as f32;
        let mut a = self.prev_amp;
        for i in 0..n {
            a += step;
            out_l[i] += buf_l[i] * a * pan_l;
            out_r[i] += buf_r[i] * a * pan_r;
        }
        self.prev_amp = amp;

        if self.amp_env.finished() && (self.state == VoiceState::Releasing || amp <= 0.0) {
            self.state = VoiceState::Free;
            return false;
        }
        true
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Free
    }

    /// Check if the voice is in release phase (note off but still sounding)
    pub fn is_releasing(&self) -> bool {
        self.state == VoiceState::Releasing
    }

    pub fn is_sustained(&self) -> bool {
        self.sustained
    }

    pub fn part(&self) -> usize {
        self.part
    }

    pub fn kit(&self) -> usize {
        self.kit
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn frequency(&self) -> f32 {
        self.freq
    }
}
