//! Real-time output through the default sound device (cpal).

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error};
use tapemodem_core::{CallbackScheduler, DeviceCallback, FrameAdapter, ModemError, ToneConfig};

/// Open stream driving the scheduler from the device callback.
///
/// Once the scheduler signals `Stop` the callback hands it back; collect it
/// with `finish` to close the capture sink.
pub struct Playback {
    stream: cpal::Stream,
    returned: Receiver<FrameAdapter>,
    channels: u16,
}

impl Playback {
    pub fn start(scheduler: CallbackScheduler, config: &ToneConfig) -> Result<Self, ModemError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| ModemError::Device("No audio output device available".into()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| ModemError::Device(format!("Failed to get default output config: {}", e)))?;

        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (callback, returned) = DeviceCallback::new(FrameAdapter::new(scheduler));

        let stream = match supported.sample_format() {
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, callback)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, callback)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, callback)?,
            other => {
                return Err(ModemError::Device(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| ModemError::Device(format!("Failed to play audio stream: {}", e)))?;

        debug!(
            "Audio stream started at {}Hz, {} channel(s)",
            config.sample_rate, stream_config.channels
        );

        Ok(Self {
            stream,
            returned,
            channels: stream_config.channels,
        })
    }

    /// Wait for the scheduler to signal `Stop`, close the stream and return
    /// the scheduler (with its sink) to the caller.
    pub fn finish(self, timeout: Duration) -> Result<CallbackScheduler, ModemError> {
        let adapter = match self.returned.recv_timeout(timeout) {
            Ok(adapter) => adapter,
            Err(RecvTimeoutError::Timeout) => return Err(ModemError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ModemError::Device("Audio stream closed before stopping".into()))
            }
        };
        drop(self.stream);
        debug!("Audio stream stopped");
        Ok(adapter.into_inner())
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

fn build_stream<S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: DeviceCallback,
) -> Result<cpal::Stream, ModemError>
where
    S: cpal::SizedSample + cpal::FromSample<i16>,
{
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
                callback.fill_interleaved(data, channels, |s| S::from_sample(s));
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| ModemError::Device(format!("Failed to build audio stream: {}", e)))
}
