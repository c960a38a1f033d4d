//! Audio-frequency data modem
//!
//! Encodes bytes as short sine-tone waveforms (start slot, 8 data slots, 3 stop
//! slots) and hands them to a real-time audio callback through a lock-free
//! single-producer/single-consumer queue.

pub mod error;
pub mod symbol;
pub mod waveform;
pub mod cache;
pub mod queue;
pub mod scheduler;
pub mod transmit;
pub mod device;
pub mod demod;

pub use cache::{CachedSample, PhaseState, SampleCache, Variant};
pub use demod::{Decoded, Demodulator};
pub use device::{to_le_bytes, DeviceCallback, FrameAdapter};
pub use error::{ModemError, Result};
pub use queue::{Consumer, Producer, TransferQueue};
pub use scheduler::{BlockSink, CallbackScheduler, OutputState, StreamControl, Tick};
pub use symbol::Symbol;
pub use transmit::{open_link, LinkHandle, Transmitter};
pub use waveform::{ToneConfig, WaveformTable};

// Tone configuration
pub const SAMPLE_RATE: u32 = 48000;
pub const AMPLITUDE: i16 = 30000;
pub const SLOT_SAMPLES: usize = 10; // 4800 slots/sec at 48 kHz

// Symbol layout: start + 8 data + 3 stop
pub const DATA_SLOTS: usize = 8;
pub const STOP_SLOTS: usize = 3;
pub const SLOTS_PER_SYMBOL: usize = 1 + DATA_SLOTS + STOP_SLOTS; // 12
pub const SYMBOL_SAMPLES: usize = SLOTS_PER_SYMBOL * SLOT_SAMPLES; // 120

// Hand-off queue between producer and audio callback
pub const QUEUE_CAPACITY: usize = 16;
