// MIDI types events, et leur traduction en CommandBlock

use crate::messaging::command::{CommandBlock, source};
use crate::messaging::controls::{midi, section};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
}

impl MidiEvent {
    /// Parse un RAW MIDI message
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0F;
        let &[first, second, ..] = data else {
            return None;
        };

        match status & 0xF0 {
            // Velocity 0 = Note Off
            0x90 if second == 0 => Some(MidiEvent::NoteOff { channel, note: first }),
            0x90 => Some(MidiEvent::NoteOn {
                channel,
                note: first,
                velocity: second,
            }),
            0x80 => Some(MidiEvent::NoteOff { channel, note: first }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: first,
                value: second,
            }),
            _ => None,
        }
    }

    /// The midiIn block for this event: `kit` = channel, `engine` = note or
    /// controller, value = velocity or controller value
    pub fn to_command(self) -> CommandBlock {
        let (control, channel, number, value) = match self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => (midi::NOTE_ON, channel, note, velocity),
            MidiEvent::NoteOff { channel, note } => (midi::NOTE_OFF, channel, note, 0),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => (midi::CONTROLLER, channel, controller, value),
        };
        CommandBlock::write(control, section::MIDI_IN, value as f32)
            .with_kit(channel)
            .with_engine(number)
            .with_source(source::FROM_MIDI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let bytes = [0x92, 60, 100]; // Note On canal 3, note 60 (C4), velocity 100
        let event = MidiEvent::from_bytes(&bytes).unwrap();
        assert_eq!(
            event,
            MidiEvent::NoteOn {
                channel: 2,
                note: 60,
                velocity: 100
            }
        );

        let block = event.to_command();
        assert_eq!(block.control, midi::NOTE_ON);
        assert_eq!(block.part, section::MIDI_IN);
        assert_eq!((block.kit, block.engine), (2, 60));
        assert_eq!(block.value, 100.0);
        assert!(block.is_write());
    }

    #[test]
    fn test_note_off_velocity_zero() {
        // Note On avec velocity 0 = Note Off
        let event = MidiEvent::from_bytes(&[0x90, 64, 0]).unwrap();
        assert_eq!(event, MidiEvent::NoteOff { channel: 0, note: 64 });
        assert_eq!(event.to_command().control, midi::NOTE_OFF);
    }

    #[test]
    fn test_control_change() {
        let event = MidiEvent::from_bytes(&[0xBF, 7, 127]).unwrap();
        let block = event.to_command();
        assert_eq!(block.control, midi::CONTROLLER);
        assert_eq!((block.kit, block.engine, block.byte_value()), (15, 7, 127));
    }

    #[test]
    fn test_ignored_messages() {
        assert!(MidiEvent::from_bytes(&[]).is_none());
        assert!(MidiEvent::from_bytes(&[0x90, 60]).is_none());
        // pitch bend, clock
        assert!(MidiEvent::from_bytes(&[0xE0, 0x00, 0x40]).is_none());
        assert!(MidiEvent::from_bytes(&[0xF8]).is_none());
    }
}
