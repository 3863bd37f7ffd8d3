//! Shared helpers for the integration tests

#![allow(dead_code)]

use rtsynth::config::{AudioDriver, Config, MidiDriver, RuntimeSettings};
use rtsynth::instance::signals::InstanceSignals;
use rtsynth::interchange::{Endpoints, Interchange, Shared};
use rtsynth::synth::SynthEngine;
use std::io;
use std::sync::{Arc, Mutex};

/// Log lines written while a scoped subscriber is installed
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }

    /// Run `f` with every tracing event of this thread written here
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Config that never touches hardware
pub fn headless_config() -> Config {
    Config {
        audio_driver: AudioDriver::None,
        midi_driver: MidiDriver::None,
        buffer_size: 64,
        ..Config::default()
    }
}

/// An interchange driven by hand: call `mediate`/`render_cycle` directly
pub fn interchange(engine: SynthEngine) -> (Interchange, Endpoints) {
    let config = headless_config();
    let shared = Shared::new(
        Arc::new(InstanceSignals::new()),
        Arc::new(RuntimeSettings::from_config(&config)),
    );
    Interchange::new(engine, &config, shared)
}

pub fn engine() -> SynthEngine {
    SynthEngine::new(0, 48000.0, 64, 256)
}
