//! Real-time tick handler
//!
//! Invoked once per device buffer pull. Each tick selects exactly one
//! precomputed block and returns it; nothing here blocks, locks or allocates.

use std::sync::Arc;

use crate::cache::{PhaseState, SampleCache};
use crate::queue::Consumer;
use crate::symbol::Symbol;
use crate::transmit::LinkState;

/// Output chosen for a tick, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// A queued symbol is pending: emit it
    Draining(Symbol),
    /// Queue empty, carrier on
    CarrierIdle,
    /// Queue empty, carrier off
    Silent,
}

impl OutputState {
    /// Draining beats CarrierIdle beats Silent.
    pub fn evaluate(pending: Option<Symbol>, carrier: bool) -> Self {
        match (pending, carrier) {
            (Some(symbol), _) => OutputState::Draining(symbol),
            (None, true) => OutputState::CarrierIdle,
            (None, false) => OutputState::Silent,
        }
    }

    /// Symbol whose cached waveform this state emits
    pub fn symbol(self) -> Symbol {
        match self {
            OutputState::Draining(symbol) => symbol,
            OutputState::CarrierIdle => Symbol::IdleCarrier,
            OutputState::Silent => Symbol::Silence,
        }
    }

    pub fn is_draining(self) -> bool {
        matches!(self, OutputState::Draining(_))
    }
}

/// Continue/stop signal handed back to the device layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    Stop,
}

/// Mirror of every emitted block (e.g. raw capture to disk).
pub trait BlockSink: Send {
    fn write_block(&mut self, block: &[i16]);

    /// Flush and close. Called off the real-time thread once ticking is over.
    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Result of one tick
#[derive(Debug)]
pub struct Tick<'a> {
    pub state: OutputState,
    pub block: &'a [i16],
    pub control: StreamControl,
}

pub struct CallbackScheduler {
    consumer: Consumer<Symbol>,
    cache: Arc<SampleCache>,
    phase: PhaseState,
    link: Arc<LinkState>,
    sink: Option<Box<dyn BlockSink>>,
}

impl CallbackScheduler {
    pub(crate) fn new(
        consumer: Consumer<Symbol>,
        cache: Arc<SampleCache>,
        link: Arc<LinkState>,
    ) -> Self {
        Self {
            consumer,
            cache,
            phase: PhaseState::new(),
            link,
            sink: None,
        }
    }

    /// Evaluate the state machine without emitting anything.
    pub fn next_state(&self) -> OutputState {
        OutputState::evaluate(self.consumer.peek_next(), self.link.carrier())
    }

    /// Emit one block.
    ///
    /// `Stop` is signalled once shutdown has been requested and the queue has
    /// run dry; the returned block is still valid and should be played.
    pub fn tick(&mut self) -> Tick<'_> {
        // Read stop before peeking: anything enqueued ahead of `shutdown`
        // is then visible, so it is never stranded behind a `Stop`.
        let stop = self.link.stop_requested();
        let state = self.next_state();
        if state.is_draining() {
            self.consumer.advance_read();
        }

        let block = self.cache.fetch(state.symbol(), &mut self.phase);

        if let Some(sink) = self.sink.as_mut() {
            sink.write_block(block);
        }
        self.link.record_block();

        let control = if stop && !state.is_draining() {
            StreamControl::Stop
        } else {
            StreamControl::Continue
        };

        Tick {
            state,
            block,
            control,
        }
    }

    /// Tick and copy the block into a device buffer of exactly `block_len()` samples.
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != self.block_len()`.
    pub fn render_into(&mut self, out: &mut [i16]) -> StreamControl {
        assert_eq!(
            out.len(),
            self.block_len(),
            "render_into needs a buffer of exactly one block"
        );
        let tick = self.tick();
        out.copy_from_slice(tick.block);
        tick.control
    }

    pub fn block_len(&self) -> usize {
        self.cache.block_len()
    }

    pub fn phase(&self) -> &PhaseState {
        &self.phase
    }

    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    pub fn set_sink(&mut self, sink: Box<dyn BlockSink>) {
        self.sink = Some(sink);
    }

    pub fn take_sink(&mut self) -> Option<Box<dyn BlockSink>> {
        self.sink.take()
    }
}
