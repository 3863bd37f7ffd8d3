// MIDI Input - midir connection feeding the instance's fromMIDI ring

use super::MidiSink;
use super::event::MidiEvent;
use crate::audio::ClientError;
use crate::messaging::channels::{NotificationSink, notify};
use crate::messaging::notification::{Notification, NotificationCategory};
use midir::{MidiInput as MidirInput, MidiInputConnection};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct MidiInput {
    _connection: MidiInputConnection<()>,
    port: String,
    dropped: Arc<AtomicU64>,
}

impl MidiInput {
    /// Connect to the first port whose name contains `wanted`, or the first
    /// port when `wanted` is `None`
    pub fn open(
        instance: u32,
        wanted: Option<&str>,
        sink: MidiSink,
        notifications: NotificationSink,
    ) -> Result<Self, ClientError> {
        let midi_in = MidirInput::new(&format!("rtsynth-{instance}"))
            .map_err(|e| ClientError::Midi(e.to_string()))?;

        let ports = midi_in.ports();
        for (i, port) in ports.iter().enumerate() {
            if let Ok(name) = midi_in.port_name(port) {
                tracing::debug!("MIDI port [{}] {}", i, name);
            }
        }
        let port = ports
            .iter()
            .find(|p| match wanted {
                Some(wanted) => midi_in
                    .port_name(p)
                    .map(|name| name.contains(wanted))
                    .unwrap_or(false),
                None => true,
            })
            .ok_or_else(|| ClientError::Midi("no MIDI input port".to_string()))?;
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let dropped = Arc::new(AtomicU64::new(0));
        let dropped_clone = dropped.clone();
        let connection = midi_in
            .connect(
                port,
                "rtsynth-input",
                move |_timestamp, message, _| {
                    // MIDI Callback - running on a separate thread
                    let Some(event) = MidiEvent::from_bytes(message) else {
                        return;
                    };
                    // try_push is not blocking; full ring or booting = event lost
                    let sent = match sink.try_lock() {
                        Ok(mut guard) => guard
                            .as_mut()
                            .is_some_and(|tx| tx.try_send(&event.to_command()).is_ok()),
                        Err(_) => false,
                    };
                    if !sent && dropped_clone.fetch_add(1, Ordering::Relaxed) == 0 {
                        notify(
                            &notifications,
                            Notification::warning(
                                NotificationCategory::Midi,
                                "Unable to write to fromMIDI buffer".to_string(),
                            )
                            .for_instance(instance),
                        );
                    }
                },
                (),
            )
            .map_err(|e| ClientError::Midi(e.to_string()))?;

        tracing::info!(instance, port = %port_name, "MIDI connected");
        Ok(Self {
            _connection: connection,
            port: port_name,
            dropped,
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Events lost since the last call
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}
