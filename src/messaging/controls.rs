// Address vocabulary for CommandBlock fields
//
// Control ids are local to the section/insert they live in, so the same
// number means different things in different modules.

pub const NUM_MIDI_PARTS: usize = 64;
pub const NUM_MIDI_CHANNELS: usize = 16;
pub const NUM_KIT_ITEMS: usize = 16;
pub const NUM_VOICES: usize = 8;
pub const NUM_SYS_EFX: usize = 4;
pub const NUM_INS_EFX: usize = 8;
pub const NUM_PART_EFX: usize = 3;
pub const MAX_HARMONICS: usize = 32;

/// Values of the `part` byte above the part range
pub mod section {
    pub const PART_FIRST: u8 = 0;
    pub const PART_LAST: u8 = 63;
    pub const COPY_PASTE: u8 = 72;
    pub const VECTOR: u8 = 0xC0;
    pub const MIDI_LEARN: u8 = 0xD8;
    pub const MIDI_IN: u8 = 0xD9;
    pub const SCALES: u8 = 0xE8;
    pub const MAIN: u8 = 0xF0;
    pub const SYSTEM_EFFECTS: u8 = 0xF1;
    pub const INSERT_EFFECTS: u8 = 0xF2;
    pub const BANK: u8 = 0xF4;
    pub const CONFIG: u8 = 0xF8;
}

/// Values of the `insert` byte
pub mod insert {
    pub const LFO_GROUP: u8 = 0;
    pub const FILTER_GROUP: u8 = 1;
    pub const ENVELOPE_GROUP: u8 = 2;
    pub const ENVELOPE_POINTS: u8 = 3;
    pub const ENVELOPE_POINT_CHANGE: u8 = 4;
    pub const OSCILLATOR_GROUP: u8 = 5;
    pub const HARMONIC_AMPLITUDE: u8 = 6;
    pub const HARMONIC_PHASE_BANDWIDTH: u8 = 7;
    pub const RESONANCE_GROUP: u8 = 8;
    pub const RESONANCE_GRAPH: u8 = 9;
    pub const SYSTEM_EFFECT_SEND: u8 = 16;
    pub const PART_EFFECT_SELECT: u8 = 17;
    pub const KIT_GROUP: u8 = 32;
}

/// `parameter` byte of LFO and envelope groups
pub mod insert_type {
    pub const AMPLITUDE: u8 = 0;
    pub const FREQUENCY: u8 = 1;
    pub const FILTER: u8 = 2;
}

/// Values of the `engine` byte
pub mod engine {
    pub const ADD_SYNTH: u8 = 0;
    pub const SUB_SYNTH: u8 = 1;
    pub const PAD_SYNTH: u8 = 2;
    pub const ADD_VOICE_1: u8 = 0x80;
    pub const ADD_VOICE_8: u8 = 0x87;
    pub const ADD_MOD_1: u8 = 0xC0;
    pub const ADD_MOD_8: u8 = 0xC7;
}

pub mod main {
    pub const VOLUME: u8 = 0;
    pub const PART_NUMBER: u8 = 14;
    pub const AVAILABLE_PARTS: u8 = 15;
    pub const DETUNE: u8 = 32;
    pub const KEY_SHIFT: u8 = 35;
    pub const MONO: u8 = 36;
    pub const SOLO_TYPE: u8 = 48;
    pub const SOLO_CC: u8 = 49;
    pub const MASTER_RESET: u8 = 96;
    pub const MASTER_RESET_AND_MLEARN: u8 = 97;
    pub const START_INSTANCE: u8 = 104;
    pub const STOP_INSTANCE: u8 = 105;
    pub const STOP_SOUND: u8 = 128;
    pub const READ_PART_PEAK: u8 = 200;
    pub const READ_MAIN_LR_PEAK: u8 = 201;
}

pub mod part {
    pub const VOLUME: u8 = 0;
    pub const VELOCITY_SENSE: u8 = 1;
    pub const PANNING: u8 = 2;
    pub const VELOCITY_OFFSET: u8 = 4;
    pub const MIDI_CHANNEL: u8 = 5;
    pub const KEY_MODE: u8 = 6;
    pub const PORTAMENTO: u8 = 7;
    pub const ENABLE: u8 = 8;
    pub const KIT_ITEM_MUTE: u8 = 9;
    pub const MIN_NOTE: u8 = 16;
    pub const MAX_NOTE: u8 = 17;
    pub const KIT_EFFECT_NUM: u8 = 24;
    pub const MAX_NOTES: u8 = 33;
    pub const KEY_SHIFT: u8 = 35;
    pub const PART_TO_SYSTEM_EFFECT_1: u8 = 40;
    pub const PART_TO_SYSTEM_EFFECT_4: u8 = 43;
    pub const HUMANISE: u8 = 48;
    pub const DRUM_MODE: u8 = 57;
    pub const KIT_MODE: u8 = 58;
    pub const EFFECT_NUMBER: u8 = 64;
    pub const EFFECT_TYPE: u8 = 65;
    pub const EFFECT_DESTINATION: u8 = 66;
    pub const EFFECT_BYPASS: u8 = 67;

    // controllers
    pub const VOLUME_RANGE: u8 = 128;
    pub const VOLUME_ENABLE: u8 = 129;
    pub const PANNING_WIDTH: u8 = 130;
    pub const MOD_WHEEL_DEPTH: u8 = 131;
    pub const EXPONENTIAL_MOD_WHEEL: u8 = 132;
    pub const EXPRESSION_ENABLE: u8 = 135;
    pub const SUSTAIN_PEDAL_ENABLE: u8 = 137;
    pub const PITCH_WHEEL_RANGE: u8 = 138;
    pub const FILTER_Q_DEPTH: u8 = 139;
    pub const FILTER_CUTOFF_DEPTH: u8 = 140;
    pub const PORTAMENTO_TIME: u8 = 160;
    pub const PORTAMENTO_TIME_STRETCH: u8 = 161;
    pub const PORTAMENTO_THRESHOLD: u8 = 162;
    pub const PORTAMENTO_THRESHOLD_TYPE: u8 = 163;
    pub const RECEIVE_PORTAMENTO: u8 = 168;

    pub const INSTRUMENT_NAME: u8 = 222;
    pub const RESET_ALL_CONTROLLERS: u8 = 224;
}

/// Kit item controls (insert == KIT_GROUP)
pub mod kit {
    /// With engine unused: kit item enable; with engine set: engine enable
    pub const ENABLE: u8 = 8;
    pub const MUTE: u8 = 9;
    pub const MIN_NOTE: u8 = 16;
    pub const MAX_NOTE: u8 = 17;
    pub const EFFECT_NUM: u8 = 24;
}

/// AddSynth global controls (engine == ADD_SYNTH, insert unused)
pub mod add_synth {
    pub const VOLUME: u8 = 0;
    pub const VELOCITY_SENSE: u8 = 1;
    pub const PANNING: u8 = 2;
    pub const ENABLE: u8 = 8;
    pub const DETUNE_FREQUENCY: u8 = 32;
    pub const OCTAVE: u8 = 35;
    pub const COARSE_DETUNE: u8 = 37;
    pub const STEREO: u8 = 112;
}

/// AddSynth voice controls (engine == ADD_VOICE_n, insert unused)
pub mod add_voice {
    pub const VOLUME: u8 = 0;
    pub const VELOCITY_SENSE: u8 = 1;
    pub const PANNING: u8 = 2;
    pub const INVERT_PHASE: u8 = 4;
    pub const ENABLE: u8 = 8;
    pub const DETUNE_FREQUENCY: u8 = 32;
    pub const OCTAVE: u8 = 35;
    pub const COARSE_DETUNE: u8 = 37;
}

pub mod lfo {
    pub const SPEED: u8 = 0;
    pub const DEPTH: u8 = 1;
    pub const DELAY: u8 = 2;
    pub const START: u8 = 3;
    pub const AMPLITUDE_RANDOMNESS: u8 = 4;
    pub const TYPE: u8 = 5;
    pub const CONTINUOUS: u8 = 6;
    pub const FREQUENCY_RANDOMNESS: u8 = 7;
    pub const STRETCH: u8 = 8;
}

pub mod filter {
    pub const CENTER_FREQUENCY: u8 = 0;
    pub const Q: u8 = 1;
    pub const FREQUENCY_TRACKING: u8 = 2;
    pub const VELOCITY_SENSITIVITY: u8 = 3;
    pub const VELOCITY_CURVE: u8 = 4;
    pub const GAIN: u8 = 5;
    pub const STAGES: u8 = 6;
    pub const BASE_TYPE: u8 = 7;
    pub const ANALOG_TYPE: u8 = 8;
    pub const STATE_VARIABLE_TYPE: u8 = 9;
    pub const FREQUENCY_TRACKING_RANGE: u8 = 10;
}

pub mod envelope {
    pub const ATTACK_LEVEL: u8 = 0;
    pub const ATTACK_TIME: u8 = 1;
    pub const DECAY_LEVEL: u8 = 2;
    pub const DECAY_TIME: u8 = 3;
    pub const SUSTAIN_LEVEL: u8 = 4;
    pub const RELEASE_TIME: u8 = 5;
    pub const RELEASE_LEVEL: u8 = 6;
    pub const STRETCH: u8 = 7;
    pub const FORCED_RELEASE: u8 = 16;
    pub const LINEAR_ENVELOPE: u8 = 17;
    pub const ENABLE_FREE_MODE: u8 = 32;
    pub const POINTS: u8 = 34;
    pub const SUSTAIN_POINT: u8 = 35;
}

pub mod oscillator {
    pub const PHASE_RANDOMNESS: u8 = 0;
    pub const MAG_TYPE: u8 = 1;
    pub const BASE_FUNCTION_PARAMETER: u8 = 16;
    pub const BASE_FUNCTION_TYPE: u8 = 17;
    pub const HARMONIC_SHIFT: u8 = 64;
    pub const CLEAR_HARMONIC_SHIFT: u8 = 65;
    pub const CLEAR_HARMONICS: u8 = 96;
}

/// Effect type bytes as used in the `kit` field (0x80 + type index)
pub mod effect {
    pub const NONE: u8 = 0x80;
    pub const REVERB: u8 = 0x81;
    pub const ECHO: u8 = 0x82;
    pub const CHORUS: u8 = 0x83;
    pub const PHASER: u8 = 0x84;
    pub const ALIENWAH: u8 = 0x85;
    pub const DISTORTION: u8 = 0x86;
    pub const EQ: u8 = 0x87;
    pub const DYNAMIC_FILTER: u8 = 0x88;

    pub const LEVEL: u8 = 0;
    pub const PANNING: u8 = 1;
    pub const FREQUENCY: u8 = 2;
    pub const PRESET: u8 = 16;
    pub const CHANGED: u8 = 129;
}

/// Controls of the system/insert effect sections with kit unused
pub mod sys_ins {
    pub const TO_EFFECT_1: u8 = 1;
    pub const TO_EFFECT_3: u8 = 3;
    pub const EFFECT_NUMBER: u8 = 4;
    pub const EFFECT_TYPE: u8 = 5;
    pub const EFFECT_DESTINATION: u8 = 6;
}

pub mod midi {
    pub const NOTE_ON: u8 = 0;
    pub const NOTE_OFF: u8 = 1;
    pub const CONTROLLER: u8 = 2;
}

pub mod config {
    pub const OSCILLATOR_SIZE: u8 = 0;
    pub const BUFFER_SIZE: u8 = 1;
    pub const ENABLE_GUI: u8 = 22;
    pub const ENABLE_CLI: u8 = 23;
    pub const ENABLE_AUTO_INSTANCE: u8 = 24;
}

/// Control id of a text message carried through `miscmsg`
pub const TEXT_MESSAGE: u8 = 254;
