// Voice Manager - Polyphony handling
//
// One pool per engine, allocated at construction. Parts borrow voices from
// it note by note; a part never holds more than its max-notes setting.

use super::voice::Voice;
use crate::params::add::AddGlobalParams;

/// Voices in the engine-wide pool
pub const POLYPHONY: usize = 128;

pub struct VoicePool {
    voices: Vec<Voice>,
    /// Age counter incremented on each note_on for voice stealing priority
    age_counter: u64,
}

impl VoicePool {
    pub fn new(template: &AddGlobalParams, sample_rate: f32, buffer_size: usize) -> Self {
        Self::with_size(template, sample_rate, buffer_size, POLYPHONY)
    }

    pub fn with_size(
        template: &AddGlobalParams,
        sample_rate: f32,
        buffer_size: usize,
        size: usize,
    ) -> Self {
        // Pre-allocate all voices
        let voices = (0..size.max(1))
            .map(|i| Voice::new(template, sample_rate, buffer_size, i as u64 + 1))
            .collect();
        Self {
            voices,
            age_counter: 0,
        }
    }

    pub fn next_age(&mut self) -> u64 {
        self.age_counter = self.age_counter.wrapping_add(1);
        self.age_counter
    }

    /// Index of the voice that will play a new note of `part`.
    ///
    /// A part at its limit gives up one of its own voices; otherwise a free
    /// voice is taken, and only a full pool steals from other parts.
    pub fn allocate(&mut self, part: usize, max_notes: usize) -> usize {
        let max_notes = max_notes.max(1);
        if self.part_voice_count(part) >= max_notes {
            if let Some(index) = self.find_voice_to_steal(|v| v.part() == part) {
                self.voices[index].kill();
                return index;
            }
        }
        // Search an inactive voice
        if let Some(index) = self.voices.iter().position(|v| !v.is_active()) {
            return index;
        }
        let index = self.find_voice_to_steal(|_| true).unwrap_or(0);
        self.voices[index].kill();
        index
    }

    /// Find the best voice to steal among the active ones accepted by `filter`
    ///
    /// Priority (best to worst):
    /// 1. Voice in release phase (already fading out - least perceptible)
    /// 2. Oldest voice (played longest ago - less likely to be noticed)
    fn find_voice_to_steal(&self, filter: impl Fn(&Voice) -> bool) -> Option<usize> {
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_active() && filter(v))
            .min_by_key(|(_, v)| (!v.is_releasing(), v.age()))
            .map(|(i, _)| i)
    }

    pub fn voice_mut(&mut self, index: usize) -> &mut Voice {
        &mut self.voices[index]
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice] {
        &mut self.voices
    }

    /// Release `note` of `part`; with the pedal down the voices only get marked
    pub fn note_off(&mut self, part: usize, note: u8, sustain: bool) {
        for voice in &mut self.voices {
            if voice.is_active() && !voice.is_releasing() && voice.part() == part && voice.note() == note
            {
                if sustain {
                    voice.sustain();
                } else {
                    voice.note_off();
                }
            }
        }
    }

    /// Pedal up: release what the pedal was holding
    pub fn release_sustained(&mut self, part: usize) {
        for voice in &mut self.voices {
            if voice.part() == part && voice.is_sustained() {
                voice.note_off();
            }
        }
    }

    /// Release every playing voice of `part`
    pub fn release_part(&mut self, part: usize) {
        for voice in &mut self.voices {
            if voice.part() == part {
                voice.note_off();
            }
        }
    }

    /// Silence `part` at once
    pub fn kill_part(&mut self, part: usize) {
        for voice in &mut self.voices {
            if voice.part() == part {
                voice.kill();
            }
        }
    }

    pub fn kill_all(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn part_voice_count(&self, part: usize) -> usize {
        self.voices
            .iter()
            .filter(|v| v.is_active() && v.part() == part)
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::add::AddSynthParams;

    const SAMPLE_RATE: f32 = 44100.0;

    fn play(pool: &mut VoicePool, params: &AddSynthParams, part: usize, note: u8, max: usize) {
        let age = pool.next_age();
        let index = pool.allocate(part, max);
        pool.voice_mut(index).note_on(
            part,
            0,
            note,
            0.8,
            440.0,
            age,
            &params.global,
            &params.voices,
        );
    }

    fn notes_of(pool: &VoicePool, note: u8) -> usize {
        pool.voices()
            .iter()
            .filter(|v| v.is_active() && v.note() == note)
            .count()
    }

    #[test]
    fn test_voice_allocation() {
        let params = AddSynthParams::new();
        let mut pool = VoicePool::with_size(&params.global, SAMPLE_RATE, 64, 8);

        // Au départ, aucune voix active
        assert_eq!(pool.active_voice_count(), 0);

        play(&mut pool, &params, 0, 60, 8);
        play(&mut pool, &params, 0, 64, 8);
        play(&mut pool, &params, 1, 67, 8);
        assert_eq!(pool.active_voice_count(), 3);
        assert_eq!(pool.part_voice_count(0), 2);
        assert_eq!(pool.part_voice_count(1), 1);
    }

    #[test]
    fn test_part_limit_steals_its_own_oldest() {
        let params = AddSynthParams::new();
        let mut pool = VoicePool::with_size(&params.global, SAMPLE_RATE, 64, 8);

        play(&mut pool, &params, 1, 40, 8);
        for note in 60..63 {
            play(&mut pool, &params, 0, note, 3);
        }
        // 4ème note de la partie 0 : elle reprend sa plus vieille voix
        play(&mut pool, &params, 0, 70, 3);
        assert_eq!(pool.part_voice_count(0), 3);
        assert_eq!(notes_of(&pool, 60), 0);
        assert_eq!(notes_of(&pool, 40), 1, "other parts are left alone");
    }

    #[test]
    fn test_full_pool_prioritizes_releasing() {
        let params = AddSynthParams::new();
        let mut pool = VoicePool::with_size(&params.global, SAMPLE_RATE, 64, 4);
        for note in 60..64 {
            play(&mut pool, &params, 0, note, 16);
        }
        pool.note_off(0, 62, false);

        play(&mut pool, &params, 0, 80, 16);
        assert_eq!(pool.active_voice_count(), 4);
        assert_eq!(notes_of(&pool, 62), 0, "releasing voice goes first");
        assert_eq!(notes_of(&pool, 80), 1);

        // plus de voix en release : la plus vieille part
        play(&mut pool, &params, 0, 81, 16);
        assert_eq!(notes_of(&pool, 60), 0);
    }

    #[test]
    fn test_sustain_pedal_holds_notes() {
        let params = AddSynthParams::new();
        let mut pool = VoicePool::with_size(&params.global, SAMPLE_RATE, 64, 4);
        play(&mut pool, &params, 0, 60, 4);

        pool.note_off(0, 60, true);
        assert!(pool.voices().iter().any(|v| v.is_sustained() && !v.is_releasing()));

        pool.release_sustained(0);
        assert!(pool.voices().iter().any(|v| v.is_releasing()));
    }

    #[test]
    fn test_kill_part() {
        let params = AddSynthParams::new();
        let mut pool = VoicePool::with_size(&params.global, SAMPLE_RATE, 64, 4);
        play(&mut pool, &params, 0, 60, 4);
        play(&mut pool, &params, 2, 61, 4);
        pool.kill_part(0);
        assert_eq!(pool.active_voice_count(), 1);
        pool.kill_all();
        assert_eq!(pool.active_voice_count(), 0);
    }
}
