// Sortie audio CPAL - callback temps-réel
//
// # Format Support
//
// Le stream est construit dans le format préféré du device (F32, I16 ou U16).
// Tout le rendu se fait en f32; la conversion vers le format du device se fait
// à l'écriture dans le buffer de sortie, via `FromSample<f32>` (sans allocation).
//
// # Stream Limitations
//
// Le `Stream` cpal n'est pas Send sur toutes les plateformes: il est créé,
// joué et détruit par un thread dédié qui reste parqué tant que le client est
// ouvert. Le reste du programme ne manipule que ce thread.

use super::renderer::PeriodRenderer;
use super::{ClientError, ClientRequest};
use crate::interchange::InterchangeSlot;
use crate::messaging::channels::{NotificationSink, notify};
use crate::messaging::notification::{Notification, NotificationCategory};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream,
    StreamConfig, SupportedBufferSize, SupportedStreamConfig,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// Format granted by the device
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    sample_rate: u32,
    buffer_size: usize,
    channels: usize,
}

pub struct CpalOutput {
    close: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    device: String,
    sample_rate: u32,
    buffer_size: usize,
}

impl CpalOutput {
    pub fn open(
        request: ClientRequest,
        slot: InterchangeSlot,
        notifications: NotificationSink,
    ) -> Result<Self, ClientError> {
        let close = Arc::new(AtomicBool::new(false));
        let close_clone = close.clone();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name(format!("rtsynth-audio-{}", request.instance))
            .spawn(move || match start_stream(request, slot, notifications) {
                Ok((stream, device, negotiated)) => {
                    let _ = ready_tx.send(Ok((device, negotiated)));
                    while !close_clone.load(Ordering::Acquire) {
                        thread::park();
                    }
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| ClientError::Thread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok((device, negotiated))) => {
                tracing::info!(
                    instance = request.instance,
                    device = %device,
                    "Audio started: {} Hz, {} channels",
                    negotiated.sample_rate,
                    negotiated.channels
                );
                Ok(Self {
                    close,
                    thread: Some(thread),
                    device,
                    sample_rate: negotiated.sample_rate,
                    buffer_size: negotiated.buffer_size,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(ClientError::Thread("audio thread exited during setup".to_string()))
            }
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.close.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            let _ = thread.join();
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn start_stream(
    request: ClientRequest,
    slot: InterchangeSlot,
    notifications: NotificationSink,
) -> Result<(Stream, String, Negotiated), ClientError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(ClientError::NoDevice)?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = choose_config(&device, request.sample_rate)?;
    let sample_format = supported.sample_format();
    let mut config: StreamConfig = supported.config();
    config.buffer_size = match supported.buffer_size() {
        SupportedBufferSize::Range { min, max }
            if (*min as usize..=*max as usize).contains(&request.buffer_size) =>
        {
            BufferSize::Fixed(request.buffer_size as u32)
        }
        _ => BufferSize::Default,
    };
    let negotiated = Negotiated {
        sample_rate: config.sample_rate.0,
        buffer_size: request.buffer_size,
        channels: config.channels as usize,
    };
    tracing::debug!(device = %name, ?sample_format, "Audio config: {:?}", config);

    let renderer = PeriodRenderer::new(slot);
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, renderer, notifications),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, renderer, notifications),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, renderer, notifications),
        other => Err(ClientError::UnsupportedFormat(format!("{other:?}"))),
    }?;
    stream
        .play()
        .map_err(|e| ClientError::Stream(e.to_string()))?;
    Ok((stream, name, negotiated))
}

/// The requested rate in the best format the device offers, else its default
fn choose_config(device: &Device, sample_rate: u32) -> Result<SupportedStreamConfig, ClientError> {
    let rate = SampleRate(sample_rate);
    let preference = |format: SampleFormat| match format {
        SampleFormat::F32 => Some(0),
        SampleFormat::I16 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    };
    let best = device
        .supported_output_configs()
        .map_err(|e| ClientError::Config(e.to_string()))?
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .filter_map(|range| preference(range.sample_format()).map(|p| (p, range)))
        .min_by_key(|(p, range)| (*p, range.channels() != 2))
        .map(|(_, range)| range.with_sample_rate(rate));

    match best {
        Some(config) => Ok(config),
        None => {
            let config = device
                .default_output_config()
                .map_err(|e| ClientError::Config(e.to_string()))?;
            tracing::warn!(
                "{} Hz not supported by the device, using {} Hz",
                sample_rate,
                config.sample_rate().0
            );
            Ok(config)
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut renderer: PeriodRenderer,
    notifications: NotificationSink,
) -> Result<Stream, ClientError>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    let channels = (config.channels as usize).max(1);
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                renderer.fill(frames, |i, sample| {
                    let frame = &mut data[i * channels..(i + 1) * channels];
                    write_stereo_to_interleaved_frame(sample, frame);
                });
            },
            move |err| {
                // Pas de println ici: le thread audio du device appelle ce callback
                notify(
                    &notifications,
                    Notification::error(
                        NotificationCategory::Audio,
                        format!("Audio stream error: {}", err),
                    ),
                );
            },
            None,
        )
        .map_err(|e| ClientError::Stream(e.to_string()))
}

/// Write one stereo frame into an interleaved buffer of any channel count
#[inline]
pub fn write_stereo_to_interleaved_frame<T>((left, right): (f32, f32), frame: &mut [T])
where
    T: Sample + FromSample<f32>,
{
    if frame.len() >= 2 {
        frame[0] = T::from_sample(left);
        frame[1] = T::from_sample(right);
        for sample in frame.iter_mut().skip(2) {
            *sample = T::from_sample(0.0f32);
        }
    } else if let Some(sample) = frame.first_mut() {
        // mono: L et R mélangés
        *sample = T::from_sample((left + right) * 0.5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_frame_i16() {
        let mut frame = [0i16; 2];
        write_stereo_to_interleaved_frame((1.0, -1.0), &mut frame);
        assert_eq!(frame[0], i16::MAX);
        assert!(frame[1] <= -i16::MAX);
    }

    #[test]
    fn test_extra_channels_are_silent() {
        let mut frame = [1.0f32; 4];
        write_stereo_to_interleaved_frame((0.5, 0.25), &mut frame);
        assert_eq!(frame, [0.5, 0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_mono_mixes_channels() {
        let mut frame = [0u16; 1];
        write_stereo_to_interleaved_frame((0.0, 0.0), &mut frame);
        assert_eq!(frame[0], 32768);
    }
}
