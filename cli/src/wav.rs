use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use tapemodem_core::BlockSink;

use crate::error::CliError;

/// 16-bit mono PCM, the format the modem emits
pub fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Capture sink mirroring every emitted block into a WAV file.
///
/// Write errors can't surface from the audio callback, so the first one is
/// kept and reported by `finish`. Dropping without `finish` still lets hound
/// finalize the header.
pub struct WavCapture {
    writer: Option<WavWriter<BufWriter<File>>>,
    error: Option<hound::Error>,
    samples: u64,
}

impl WavCapture {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, CliError> {
        let writer = WavWriter::create(path, wav_spec(sample_rate))?;
        Ok(Self {
            writer: Some(writer),
            error: None,
            samples: 0,
        })
    }
}

impl BlockSink for WavCapture {
    fn write_block(&mut self, block: &[i16]) {
        if self.error.is_some() {
            return;
        }
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        for &sample in block {
            if let Err(e) = writer.write_sample(sample) {
                self.error = Some(e);
                return;
            }
        }
        self.samples += block.len() as u64;
    }

    fn finish(&mut self) -> std::io::Result<()> {
        if let Some(e) = self.error.take() {
            return Err(std::io::Error::other(e));
        }
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(std::io::Error::other)?;
            debug!("Finalized capture: {} samples", self.samples);
        }
        Ok(())
    }
}

/// Read a 16-bit mono WAV. Anything else is rejected rather than converted,
/// since the demodulator works on exact sample values.
pub fn read_samples(path: &Path) -> Result<(WavSpec, Vec<i16>), CliError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(CliError::UnsupportedFormat(format!(
            "{} channels (expected mono)",
            spec.channels
        )));
    }
    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(CliError::UnsupportedFormat(format!(
            "{}-bit {:?} (expected 16-bit Int)",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
    Ok((spec, samples?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_round_trip() {
        let path = std::env::temp_dir().join("tapemodem_capture_round_trip.wav");
        let mut capture = WavCapture::create(&path, 48000).unwrap();
        capture.write_block(&[0, 100, -100, i16::MAX]);
        capture.write_block(&[i16::MIN]);
        assert_eq!(capture.samples, 5);
        capture.finish().unwrap();

        let (spec, samples) = read_samples(&path).unwrap();
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(samples, vec![0, 100, -100, i16::MAX, i16::MIN]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rejects_stereo() {
        let path = std::env::temp_dir().join("tapemodem_rejects_stereo.wav");
        let spec = WavSpec {
            channels: 2,
            ..wav_spec(48000)
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            read_samples(&path),
            Err(CliError::UnsupportedFormat(_))
        ));
        std::fs::remove_file(&path).ok();
    }
}
