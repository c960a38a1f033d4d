//! Producer side: transmit requests and carrier control
//!
//! Runs outside the real-time context. Waiting here is a plain spin (with
//! yields) on the consumer's cursor and must never happen on the audio thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::cache::SampleCache;
use crate::error::{ModemError, Result};
use crate::queue::{Producer, TransferQueue};
use crate::scheduler::CallbackScheduler;
use crate::symbol::Symbol;
use crate::waveform::ToneConfig;

/// Flags and counters shared by both contexts. Each field has one writer.
#[derive(Debug, Default)]
pub(crate) struct LinkState {
    carrier: AtomicBool,
    stop: AtomicBool,
    blocks_emitted: AtomicU64,
    bytes_queued: AtomicU64,
}

impl LinkState {
    #[inline]
    pub(crate) fn carrier(&self) -> bool {
        // one tick of staleness is fine
        self.carrier.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn record_block(&self) {
        self.blocks_emitted.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable view of the link for status and carrier control.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    state: Arc<LinkState>,
}

impl LinkHandle {
    pub fn set_carrier(&self, on: bool) {
        self.state.carrier.store(on, Ordering::Relaxed);
    }

    pub fn carrier(&self) -> bool {
        self.state.carrier()
    }

    /// Blocks handed to the device so far
    pub fn blocks_emitted(&self) -> u64 {
        self.state.blocks_emitted.load(Ordering::Relaxed)
    }

    /// Bytes accepted into the queue so far
    pub fn bytes_queued(&self) -> u64 {
        self.state.bytes_queued.load(Ordering::Relaxed)
    }

    pub fn stop_requested(&self) -> bool {
        self.state.stop_requested()
    }
}

/// Build the cache and queue, and return both ends of the link.
pub fn open_link(config: ToneConfig) -> Result<(Transmitter, CallbackScheduler)> {
    let cache = Arc::new(SampleCache::new(config)?);
    let (producer, consumer) = TransferQueue::<Symbol>::new();
    let state = Arc::new(LinkState::default());

    let transmitter = Transmitter {
        producer,
        link: LinkHandle {
            state: Arc::clone(&state),
        },
    };
    let scheduler = CallbackScheduler::new(consumer, cache, state);
    Ok((transmitter, scheduler))
}

pub struct Transmitter {
    producer: Producer<Symbol>,
    link: LinkHandle,
}

impl Transmitter {
    pub fn set_carrier(&self, on: bool) {
        debug!("Carrier {}", if on { "on" } else { "off" });
        self.link.set_carrier(on);
    }

    pub fn carrier(&self) -> bool {
        self.link.carrier()
    }

    pub fn link(&self) -> LinkHandle {
        self.link.clone()
    }

    pub fn is_drained(&self) -> bool {
        self.producer.is_drained()
    }

    /// Enqueue one byte without waiting.
    pub fn try_send(&mut self, byte: u8) -> Result<()> {
        self.producer.enqueue(Symbol::Byte(byte))?;
        self.link.state.bytes_queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Send a batch of bytes in order.
    ///
    /// Waits for any previous batch to drain first, then enqueues byte by
    /// byte, spinning while the queue is full. Unbounded if the audio
    /// callback stalls; see [`Transmitter::send_bytes_timeout`].
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.send_until(bytes, None)
    }

    /// Like [`Transmitter::send_bytes`] but gives up with `Timeout` once
    /// `timeout` has elapsed. Bytes already queued stay queued.
    pub fn send_bytes_timeout(&mut self, bytes: &[u8], timeout: Duration) -> Result<()> {
        self.send_until(bytes, Some(Instant::now() + timeout))
    }

    /// Spin until the consumer has acknowledged everything.
    pub fn wait_drained(&self) {
        while !self.producer.is_drained() {
            thread::yield_now();
        }
    }

    pub fn wait_drained_timeout(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        Self::spin_until(Some(deadline), || self.producer.is_drained())
    }

    /// Ask the scheduler to signal `Stop` once the queue runs dry.
    pub fn shutdown(&self) {
        debug!("Shutdown requested");
        self.link.state.stop.store(true, Ordering::Release);
    }

    fn send_until(&mut self, bytes: &[u8], deadline: Option<Instant>) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if self.link.stop_requested() {
            warn!("Sending {} bytes after shutdown was requested", bytes.len());
        }

        Self::spin_until(deadline, || self.producer.is_drained())?;
        debug!("Queueing batch of {} bytes", bytes.len());

        for &byte in bytes {
            loop {
                match self.try_send(byte) {
                    Ok(()) => break,
                    Err(ModemError::QueueFull) => {
                        if deadline.is_some_and(|d| Instant::now() >= d) {
                            return Err(ModemError::Timeout);
                        }
                        thread::yield_now();
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn spin_until(deadline: Option<Instant>, mut ready: impl FnMut() -> bool) -> Result<()> {
        while !ready() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(ModemError::Timeout);
            }
            thread::yield_now();
        }
        Ok(())
    }
}
