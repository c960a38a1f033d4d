//! Bridge between fixed-size ticks and whatever the device layer pulls.

use std::sync::mpsc::{self, Receiver, SyncSender};

use crate::scheduler::{CallbackScheduler, StreamControl};

/// Fills device buffers of any length from consecutive scheduler blocks.
///
/// The carry buffer is allocated once here; `fill` itself never allocates.
pub struct FrameAdapter {
    scheduler: CallbackScheduler,
    carry: Box<[i16]>,
    offset: usize,
    stopped: bool,
}

impl FrameAdapter {
    pub fn new(scheduler: CallbackScheduler) -> Self {
        let len = scheduler.block_len();
        Self {
            scheduler,
            carry: vec![0i16; len].into_boxed_slice(),
            // start empty so the first pull ticks
            offset: len,
            stopped: false,
        }
    }

    #[inline]
    fn next_sample(&mut self) -> i16 {
        if self.offset == self.carry.len() {
            if self.scheduler.render_into(&mut self.carry) == StreamControl::Stop {
                self.stopped = true;
            }
            self.offset = 0;
        }
        let sample = self.carry[self.offset];
        self.offset += 1;
        sample
    }

    /// Fill a mono buffer.
    pub fn fill(&mut self, out: &mut [i16]) -> StreamControl {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
        self.control()
    }

    /// Fill an interleaved buffer, duplicating the mono signal into every
    /// channel and converting each sample with `convert`.
    pub fn fill_interleaved<S: Copy>(
        &mut self,
        out: &mut [S],
        channels: usize,
        convert: impl Fn(i16) -> S,
    ) -> StreamControl {
        for frame in out.chunks_mut(channels.max(1)) {
            let value = convert(self.next_sample());
            frame.fill(value);
        }
        self.control()
    }

    fn control(&self) -> StreamControl {
        if self.stopped {
            StreamControl::Stop
        } else {
            StreamControl::Continue
        }
    }

    pub fn scheduler(&self) -> &CallbackScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut CallbackScheduler {
        &mut self.scheduler
    }

    pub fn into_inner(self) -> CallbackScheduler {
        self.scheduler
    }
}

/// Owner of a `FrameAdapter` inside a device callback.
///
/// On the first `Stop` the adapter is handed back through a channel so the
/// scheduler and its sink can be finished off the real-time thread. Later
/// pulls are filled with silence.
pub struct DeviceCallback {
    adapter: Option<FrameAdapter>,
    returned: SyncSender<FrameAdapter>,
}

impl DeviceCallback {
    pub fn new(adapter: FrameAdapter) -> (Self, Receiver<FrameAdapter>) {
        let (returned, receiver) = mpsc::sync_channel(1);
        let callback = Self {
            adapter: Some(adapter),
            returned,
        };
        (callback, receiver)
    }

    pub fn fill_interleaved<S: Copy>(
        &mut self,
        out: &mut [S],
        channels: usize,
        convert: impl Fn(i16) -> S,
    ) -> StreamControl {
        let Some(adapter) = self.adapter.as_mut() else {
            out.fill(convert(0));
            return StreamControl::Stop;
        };

        let control = adapter.fill_interleaved(out, channels, convert);
        if control == StreamControl::Stop {
            if let Some(adapter) = self.adapter.take() {
                // receiver gone means nobody wants it back; drop it here
                let _ = self.returned.try_send(adapter);
            }
        }
        control
    }

    /// True once the adapter has been handed back
    pub fn is_stopped(&self) -> bool {
        self.adapter.is_none()
    }
}

/// Serialize samples as little-endian s16. Returns the number of samples written.
pub fn to_le_bytes(block: &[i16], out: &mut [u8]) -> usize {
    let count = block.len().min(out.len() / 2);
    for (sample, bytes) in block.iter().zip(out.chunks_exact_mut(2)).take(count) {
        bytes.copy_from_slice(&sample.to_le_bytes());
    }
    count
}
