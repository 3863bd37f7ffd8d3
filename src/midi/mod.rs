// Module MIDI - entrée midir vers l'anneau fromMIDI

pub mod event;
pub mod input;

use crate::audio::ClientError;
use crate::config::MidiDriver;
use crate::messaging::channels::{CommandSender, NotificationSink};
use input::MidiInput;
use std::sync::{Arc, Mutex};

/// fromMIDI producer shared with the midir callback; empty while booting
pub type MidiSink = Arc<Mutex<Option<CommandSender>>>;

pub enum MidiClient {
    Alsa(MidiInput),
    None,
}

impl MidiClient {
    pub fn open(
        driver: MidiDriver,
        instance: u32,
        port: Option<&str>,
        sink: MidiSink,
        notifications: NotificationSink,
    ) -> Result<Self, ClientError> {
        match driver {
            MidiDriver::Jack => Err(ClientError::MidiUnavailable(driver)),
            MidiDriver::Alsa => {
                MidiInput::open(instance, port, sink, notifications).map(MidiClient::Alsa)
            }
            MidiDriver::None => Ok(MidiClient::None),
        }
    }

    pub fn driver(&self) -> MidiDriver {
        match self {
            MidiClient::Alsa(_) => MidiDriver::Alsa,
            MidiClient::None => MidiDriver::None,
        }
    }

    /// Events lost since the last call
    pub fn take_dropped(&self) -> u64 {
        match self {
            MidiClient::Alsa(input) => input.take_dropped(),
            MidiClient::None => 0,
        }
    }
}
