// Boot fallback - driver pairs tried in order until one opens

use super::InstanceError;
use crate::audio::{AudioClient, ClientRequest};
use crate::config::{AudioDriver, MidiDriver};
use crate::interchange::InterchangeSlot;
use crate::messaging::channels::NotificationSink;
use crate::midi::{MidiClient, MidiSink};

/// Audio driver + MIDI driver
pub type DriverPair = (AudioDriver, MidiDriver);

const FALLBACKS: [DriverPair; 6] = [
    (AudioDriver::Jack, MidiDriver::Jack),
    (AudioDriver::Jack, MidiDriver::Alsa),
    (AudioDriver::Alsa, MidiDriver::Alsa),
    (AudioDriver::Jack, MidiDriver::None),
    (AudioDriver::Alsa, MidiDriver::None),
    (AudioDriver::None, MidiDriver::None),
];

/// Configured pair first, then the fixed fallbacks, each pair once.
///
/// Always ends with (none, none), which cannot fail to open.
pub struct BootSequence {
    candidates: Vec<DriverPair>,
    current_attempt: usize,
}

impl BootSequence {
    pub fn new(configured: DriverPair) -> Self {
        let mut candidates = vec![configured];
        for pair in FALLBACKS {
            if !candidates.contains(&pair) {
                candidates.push(pair);
            }
        }
        Self {
            candidates,
            current_attempt: 0,
        }
    }

    pub fn current_attempt(&self) -> usize {
        self.current_attempt
    }

    pub fn should_retry(&self) -> bool {
        self.current_attempt < self.candidates.len()
    }
}

impl Iterator for BootSequence {
    type Item = DriverPair;

    fn next(&mut self) -> Option<DriverPair> {
        let pair = self.candidates.get(self.current_attempt).copied()?;
        self.current_attempt += 1;
        Some(pair)
    }
}

/// The two clients of a running instance
pub struct Clients {
    pub audio: AudioClient,
    pub midi: MidiClient,
}

impl Clients {
    pub fn drivers(&self) -> DriverPair {
        (self.audio.driver(), self.midi.driver())
    }

    pub fn close(self) {
        // MIDI first: nothing should feed a closing engine
        drop(self.midi);
        self.audio.close();
    }
}

/// Open the first working pair of `BootSequence::new(configured)`
pub fn open_clients(
    configured: DriverPair,
    request: ClientRequest,
    midi_port: Option<&str>,
    slot: &InterchangeSlot,
    sink: &MidiSink,
    notifications: &NotificationSink,
) -> Result<Clients, InstanceError> {
    for (audio_driver, midi_driver) in BootSequence::new(configured) {
        let audio = match AudioClient::open(audio_driver, request, slot.clone(), notifications.clone())
        {
            Ok(audio) => audio,
            Err(e) => {
                tracing::debug!(instance = request.instance, "{} audio: {}", audio_driver, e);
                continue;
            }
        };
        match MidiClient::open(
            midi_driver,
            request.instance,
            midi_port,
            sink.clone(),
            notifications.clone(),
        ) {
            Ok(midi) => return Ok(Clients { audio, midi }),
            Err(e) => {
                tracing::debug!(instance = request.instance, "{} midi: {}", midi_driver, e);
                audio.close();
            }
        }
    }
    Err(InstanceError::BootFailed(request.instance))
}
