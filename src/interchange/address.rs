// Address decoding - which parameter group a CommandBlock points at
//
// Decoding only looks at the address bytes, never at engine state, so the
// control side and the audio side always agree on the target.

use crate::effects::EffectKind;
use crate::messaging::command::{CommandBlock, UNUSED};
use crate::messaging::controls::{
    NUM_KIT_ITEMS, NUM_MIDI_PARTS, effect, engine, insert, insert_type, part, section,
};
pub use crate::synth::engine::EffectSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    Main,
    Config,
    MidiIn,
    /// Slot selection, type, destination and sends of a system/insert section
    EffectRouting(EffectSection),
    /// Parameters of the effect in a slot; `kind` is None for the "no effect" type
    Effect {
        section: EffectSection,
        number: Option<usize>,
        kind: Option<EffectKind>,
    },
    /// Filter owned by a DynamicFilter effect
    EffectFilter {
        section: EffectSection,
        number: Option<usize>,
    },
    Part(usize),
    Controller(usize),
    KitItem { part: usize, kit: usize },
    AddGlobal { part: usize, kit: usize },
    AddVoice { part: usize, kit: usize, voice: usize },
    Lfo { part: usize, kit: usize, group: usize },
    Filter { part: usize, kit: usize },
    Envelope { part: usize, kit: usize, group: usize },
    /// Insert or remove a free-mode point
    EnvelopePoints { part: usize, kit: usize, group: usize },
    /// Move one free-mode point
    EnvelopePoint { part: usize, kit: usize, group: usize },
    Oscillator { part: usize, kit: usize, voice: usize },
    Unsupported,
}

/// Controls at or above this value address the MIDI controller group
const CONTROLLER_FIRST: u8 = 128;

impl Address {
    pub fn decode(block: &CommandBlock) -> Self {
        match block.part {
            p if (p as usize) < NUM_MIDI_PARTS => Self::decode_part(block, p as usize),
            section::MAIN => Address::Main,
            section::CONFIG => Address::Config,
            section::MIDI_IN => Address::MidiIn,
            section::SYSTEM_EFFECTS => Self::decode_effects(block, EffectSection::System),
            section::INSERT_EFFECTS => Self::decode_effects(block, EffectSection::Insertion),
            _ => Address::Unsupported,
        }
    }

    fn decode_effects(block: &CommandBlock, section: EffectSection) -> Self {
        if block.kit == UNUSED {
            Address::EffectRouting(section)
        } else {
            Self::decode_effect(block, section)
        }
    }

    fn decode_effect(block: &CommandBlock, section: EffectSection) -> Self {
        if block.kit < effect::NONE {
            return Address::Unsupported;
        }
        let number = (block.engine != UNUSED).then_some(block.engine as usize);
        let kind = EffectKind::from_kit(block.kit);
        if block.kit != effect::NONE && kind.is_none() {
            return Address::Unsupported;
        }
        if kind == Some(EffectKind::DynamicFilter) && block.insert != UNUSED {
            return Address::EffectFilter { section, number };
        }
        Address::Effect {
            section,
            number,
            kind,
        }
    }

    fn decode_part(block: &CommandBlock, part: usize) -> Self {
        if block.kit == UNUSED {
            if block.insert != UNUSED {
                return Address::Unsupported;
            }
            return if block.control >= CONTROLLER_FIRST && block.control != part::INSTRUMENT_NAME {
                Address::Controller(part)
            } else {
                Address::Part(part)
            };
        }
        if block.kit >= effect::NONE {
            return Self::decode_effect(block, EffectSection::Part(part));
        }
        let kit = block.kit as usize;
        if kit >= NUM_KIT_ITEMS {
            return Address::Unsupported;
        }
        if block.insert == insert::KIT_GROUP {
            return Address::KitItem { part, kit };
        }

        match block.engine {
            engine::ADD_SYNTH => {
                let group = match block.parameter {
                    insert_type::AMPLITUDE | insert_type::FREQUENCY | insert_type::FILTER => {
                        block.parameter as usize
                    }
                    _ => usize::MAX,
                };
                match block.insert {
                    UNUSED => Address::AddGlobal { part, kit },
                    insert::FILTER_GROUP => Address::Filter { part, kit },
                    _ if group == usize::MAX => Address::Unsupported,
                    insert::LFO_GROUP => Address::Lfo { part, kit, group },
                    insert::ENVELOPE_GROUP => Address::Envelope { part, kit, group },
                    insert::ENVELOPE_POINTS => Address::EnvelopePoints { part, kit, group },
                    insert::ENVELOPE_POINT_CHANGE => Address::EnvelopePoint { part, kit, group },
                    _ => Address::Unsupported,
                }
            }
            engine::ADD_VOICE_1..=engine::ADD_VOICE_8 => {
                let voice = (block.engine - engine::ADD_VOICE_1) as usize;
                match block.insert {
                    UNUSED => Address::AddVoice { part, kit, voice },
                    insert::OSCILLATOR_GROUP
                    | insert::HARMONIC_AMPLITUDE
                    | insert::HARMONIC_PHASE_BANDWIDTH => Address::Oscillator { part, kit, voice },
                    _ => Address::Unsupported,
                }
            }
            // SubSynth, PadSynth and the modulators have no parameters here
            _ => Address::Unsupported,
        }
    }
}
