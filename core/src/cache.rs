use log::debug;

use crate::error::Result;
use crate::symbol::Symbol;
use crate::waveform::{ToneConfig, WaveformTable};

/// Which of a cached sample's two renderings to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Waveform as built
    A,
    /// Sample-wise negation
    B,
}

/// A symbol's waveform, its inverted twin, and the continuity flag.
#[derive(Debug, Clone)]
pub struct CachedSample {
    primary: Box<[i16]>,
    inverted: Box<[i16]>,
    continuity: bool,
}

impl CachedSample {
    pub fn new(waveform: Vec<i16>) -> Self {
        let inverted: Box<[i16]> = waveform.iter().map(|&s| -s).collect();
        // Set when the waveform ends at or above zero: the next block must
        // start from the opposite polarity.
        let continuity = waveform.last().map_or(true, |&s| s >= 0);
        Self {
            primary: waveform.into_boxed_slice(),
            inverted,
            continuity,
        }
    }

    pub fn variant(&self, variant: Variant) -> &[i16] {
        match variant {
            Variant::A => &self.primary,
            Variant::B => &self.inverted,
        }
    }

    pub fn continuity(&self) -> bool {
        self.continuity
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}

/// Running polarity between consecutive emitted blocks.
///
/// Owned by whoever emits blocks (the scheduler); each fetch folds the
/// fetched symbol's continuity flag into `last_sense`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseState {
    last_sense: bool,
}

impl PhaseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sense(&self) -> bool {
        self.last_sense
    }

    /// Variant the next fetch will return
    pub fn current_variant(&self) -> Variant {
        if self.last_sense {
            Variant::B
        } else {
            Variant::A
        }
    }

    /// Pick the variant for `sample` and advance the phase.
    #[inline]
    pub fn select<'a>(&mut self, sample: &'a CachedSample) -> &'a [i16] {
        let variant = self.current_variant();
        self.last_sense ^= sample.continuity();
        sample.variant(variant)
    }

    pub fn reset(&mut self) {
        self.last_sense = false;
    }
}

/// Every encodable symbol, precomputed.
pub struct SampleCache {
    table: WaveformTable,
    samples: Vec<CachedSample>,
}

impl SampleCache {
    pub fn new(config: ToneConfig) -> Result<Self> {
        let table = WaveformTable::new(config)?;
        let samples: Vec<CachedSample> = Symbol::all().map(|s| Self::build(&table, s)).collect();

        debug!(
            "Built sample cache: {} symbols x {} samples",
            samples.len(),
            config.block_len()
        );

        Ok(Self { table, samples })
    }

    /// Construct the cached form of one symbol from scratch.
    pub fn build(table: &WaveformTable, symbol: Symbol) -> CachedSample {
        CachedSample::new(table.waveform(symbol))
    }

    pub fn table(&self) -> &WaveformTable {
        &self.table
    }

    pub fn config(&self) -> &ToneConfig {
        self.table.config()
    }

    pub fn block_len(&self) -> usize {
        self.table.config().block_len()
    }

    pub fn get(&self, symbol: Symbol) -> &CachedSample {
        &self.samples[symbol.index()]
    }

    /// Emission bytes for `symbol` under the current phase.
    ///
    /// Must be called exactly once per emitted block, in emission order.
    #[inline]
    pub fn fetch(&self, symbol: Symbol, phase: &mut PhaseState) -> &[i16] {
        phase.select(self.get(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> SampleCache {
        SampleCache::new(ToneConfig::default()).unwrap()
    }

    #[test]
    fn test_variants_are_negations() {
        let cache = cache();
        for symbol in Symbol::all() {
            let sample = cache.get(symbol);
            let a = sample.variant(Variant::A);
            let b = sample.variant(Variant::B);
            assert_eq!(a.len(), 120);
            assert!(a.iter().zip(b).all(|(x, y)| *x == -*y), "{:?}", symbol);
        }
    }

    #[test]
    fn test_continuity_flags() {
        let cache = cache();
        // silence ends on 0, which counts as non-negative
        assert!(cache.get(Symbol::Silence).continuity());
        // idle ends on a negated zero-tone
        assert!(!cache.get(Symbol::IdleCarrier).continuity());
        for b in 0..=255u8 {
            let sample = cache.get(Symbol::Byte(b));
            let last = *sample.variant(Variant::A).last().unwrap();
            assert_eq!(sample.continuity(), last >= 0);
        }
    }

    #[test]
    fn test_fetch_alternates_on_continuity() {
        let cache = cache();
        let mut phase = PhaseState::new();

        let first = cache.fetch(Symbol::Silence, &mut phase).to_vec();
        assert!(phase.last_sense());
        assert!(first.iter().all(|&s| s == 0));

        // sense is set, so idle comes back inverted and sense holds
        let idle = cache.fetch(Symbol::IdleCarrier, &mut phase);
        assert_eq!(idle, cache.get(Symbol::IdleCarrier).variant(Variant::B));
        assert!(phase.last_sense());

        phase.reset();
        assert_eq!(phase.current_variant(), Variant::A);
    }

    #[test]
    fn test_build_matches_cache() {
        let cache = cache();
        let built = SampleCache::build(cache.table(), Symbol::Byte(0x41));
        assert_eq!(
            built.variant(Variant::A),
            cache.get(Symbol::Byte(0x41)).variant(Variant::A)
        );
        assert_eq!(built.continuity(), cache.get(Symbol::Byte(0x41)).continuity());
    }
}
