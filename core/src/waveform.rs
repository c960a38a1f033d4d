use std::f64::consts::PI;
use std::time::Duration;

use crate::error::{ModemError, Result};
use crate::symbol::Symbol;
use crate::{AMPLITUDE, DATA_SLOTS, SAMPLE_RATE, SLOTS_PER_SYMBOL, SLOT_SAMPLES, STOP_SLOTS};

/// Tone synthesis parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneConfig {
    /// Output sample rate in Hz. Tone shapes are defined per slot, so this
    /// only sets the playback cadence.
    pub sample_rate: u32,
    /// Peak amplitude of the zero-tone (the one-tone uses half)
    pub amplitude: i16,
    /// Samples per slot
    pub slot_len: usize,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            amplitude: AMPLITUDE,
            slot_len: SLOT_SAMPLES,
        }
    }
}

impl ToneConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ModemError::InvalidConfig("sample rate must be non-zero".into()));
        }
        if self.amplitude <= 0 {
            return Err(ModemError::InvalidConfig(format!(
                "amplitude must be positive, got {}",
                self.amplitude
            )));
        }
        if self.slot_len == 0 {
            return Err(ModemError::InvalidConfig("slot length must be non-zero".into()));
        }
        Ok(())
    }

    /// Samples in one symbol waveform (and one audio tick)
    pub fn block_len(&self) -> usize {
        SLOTS_PER_SYMBOL * self.slot_len
    }

    /// Wall-clock length of one audio tick
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_len() as f64 / self.sample_rate as f64)
    }

    /// Raw payload rate in bytes per second
    pub fn bytes_per_second(&self) -> f64 {
        self.sample_rate as f64 / self.block_len() as f64
    }
}

/// `num` evenly spaced points over `[0, end]`, endpoint included, scaled
/// through `sin` and truncated toward zero.
fn half_wave(amplitude: f64, end: f64, num: usize) -> Vec<i16> {
    let step = if num > 1 { end / (num - 1) as f64 } else { 0.0 };
    (0..num)
        .map(|i| (amplitude * (step * i as f64).sin()) as i16)
        .collect()
}

fn push_signed(buffer: &mut Vec<i16>, tone: &[i16], negate: bool) {
    if negate {
        buffer.extend(tone.iter().map(|&s| -s));
    } else {
        buffer.extend_from_slice(tone);
    }
}

/// Elementary tones and fixed patterns, built once at startup.
#[derive(Debug, Clone)]
pub struct WaveformTable {
    config: ToneConfig,
    zero: Vec<i16>,
    one: Vec<i16>,
    silence: Vec<i16>,
    idle: Vec<i16>,
}

impl WaveformTable {
    pub fn new(config: ToneConfig) -> Result<Self> {
        config.validate()?;

        let n = config.slot_len;
        let amplitude = config.amplitude as f64;

        // zero-tone: full amplitude over 0..9π/10, one-tone: half amplitude over 0..9π/5
        let zero = half_wave(amplitude, 9.0 * PI / 10.0, n);
        let one = half_wave(amplitude / 2.0, 9.0 * PI / 5.0, n);

        let silence = vec![0i16; config.block_len()];

        let mut idle = Vec::with_capacity(config.block_len());
        for _ in 0..SLOTS_PER_SYMBOL / 2 {
            push_signed(&mut idle, &zero, false);
            push_signed(&mut idle, &zero, true);
        }

        Ok(Self {
            config,
            zero,
            one,
            silence,
            idle,
        })
    }

    pub fn config(&self) -> &ToneConfig {
        &self.config
    }

    pub fn zero_tone(&self) -> &[i16] {
        &self.zero
    }

    pub fn one_tone(&self) -> &[i16] {
        &self.one
    }

    pub fn silence(&self) -> &[i16] {
        &self.silence
    }

    pub fn idle_carrier(&self) -> &[i16] {
        &self.idle
    }

    /// Build the waveform for a byte.
    ///
    /// The start slot is an unmodified one-tone. Data bits follow LSB first:
    /// a 1 is a zero-tone, a 0 is a one-tone, both under the current sense.
    /// Every zero-tone (data or stop) toggles the sense afterwards.
    pub fn encode_byte(&self, byte: u8) -> Vec<i16> {
        let mut buffer = Vec::with_capacity(self.config.block_len());
        buffer.extend_from_slice(&self.one);

        let mut sense = false;
        for bit in 0..DATA_SLOTS {
            if (byte >> bit) & 0x01 == 1 {
                push_signed(&mut buffer, &self.zero, sense);
                sense = !sense;
            } else {
                push_signed(&mut buffer, &self.one, sense);
            }
        }

        for _ in 0..STOP_SLOTS {
            push_signed(&mut buffer, &self.zero, sense);
            sense = !sense;
        }

        buffer
    }

    /// Waveform for any symbol
    pub fn waveform(&self, symbol: Symbol) -> Vec<i16> {
        match symbol {
            Symbol::Byte(b) => self.encode_byte(b),
            Symbol::Silence => self.silence.clone(),
            Symbol::IdleCarrier => self.idle.clone(),
        }
    }
}
