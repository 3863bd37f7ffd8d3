// Module audio - clients qui pilotent le moteur (carte son via cpal, ou minuterie)

pub mod cpal_output;
pub mod dsp_utils;
pub mod null_output;
pub mod renderer;

use crate::config::AudioDriver;
use crate::interchange::InterchangeSlot;
use crate::messaging::channels::NotificationSink;
use cpal_output::CpalOutput;
use null_output::NullOutput;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} audio is not available in this build")]
    Unavailable(AudioDriver),

    #[error("No audio device found")]
    NoDevice,

    #[error("Audio configuration error: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("{0} MIDI is not available in this build")]
    MidiUnavailable(crate::config::MidiDriver),

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("Client thread failed: {0}")]
    Thread(String),
}

/// What an instance asks of its audio client
#[derive(Debug, Clone, Copy)]
pub struct ClientRequest {
    pub instance: u32,
    pub sample_rate: u32,
    pub buffer_size: usize,
}

/// An open audio client; the engine runs while it is alive
pub enum AudioClient {
    Cpal(CpalOutput),
    Null(NullOutput),
}

impl AudioClient {
    /// Open `driver`. The client renders silence until `slot` is filled.
    pub fn open(
        driver: AudioDriver,
        request: ClientRequest,
        slot: InterchangeSlot,
        notifications: NotificationSink,
    ) -> Result<Self, ClientError> {
        match driver {
            // cpal only reaches JACK with its `jack` feature, not enabled here
            AudioDriver::Jack => Err(ClientError::Unavailable(driver)),
            AudioDriver::Alsa => {
                CpalOutput::open(request, slot, notifications).map(AudioClient::Cpal)
            }
            AudioDriver::None => NullOutput::open(request, slot).map(AudioClient::Null),
        }
    }

    pub fn driver(&self) -> AudioDriver {
        match self {
            AudioClient::Cpal(_) => AudioDriver::Alsa,
            AudioClient::Null(_) => AudioDriver::None,
        }
    }

    /// Rate actually granted by the backend
    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioClient::Cpal(output) => output.sample_rate(),
            AudioClient::Null(output) => output.sample_rate(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        match self {
            AudioClient::Cpal(output) => output.buffer_size(),
            AudioClient::Null(output) => output.buffer_size(),
        }
    }

    /// Stop the backend thread and wait for it
    pub fn close(self) {
        match self {
            AudioClient::Cpal(output) => output.close(),
            AudioClient::Null(output) => output.close(),
        }
    }
}
