use crate::error::{ModemError, Result};
use crate::waveform::{ToneConfig, WaveformTable};
use crate::DATA_SLOTS;

/// Tone shape found in one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTone {
    Zero,
    One,
    Empty,
}

/// What a received block turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Byte(u8),
    Silence,
    IdleCarrier,
}

/// Reference demodulator for block-aligned waveforms.
///
/// Each slot is matched against the signed tone templates by squared error;
/// the sense is then replayed to check every slot carries the polarity the
/// encoder would have given it.
pub struct Demodulator {
    table: WaveformTable,
}

impl Demodulator {
    pub fn new(config: ToneConfig) -> Result<Self> {
        Ok(Self {
            table: WaveformTable::new(config)?,
        })
    }

    pub fn block_len(&self) -> usize {
        self.table.config().block_len()
    }

    fn distance(slot: &[i16], template: &[i16], negate: bool) -> i64 {
        slot.iter()
            .zip(template)
            .map(|(&x, &t)| {
                let t = if negate { -(t as i64) } else { t as i64 };
                let d = x as i64 - t;
                d * d
            })
            .sum()
    }

    /// Nearest tone and whether it is inverted.
    pub fn classify_slot(&self, slot: &[i16]) -> (SlotTone, bool) {
        let zero = self.table.zero_tone();
        let one = self.table.one_tone();
        let candidates = [
            (SlotTone::Zero, false, Self::distance(slot, zero, false)),
            (SlotTone::Zero, true, Self::distance(slot, zero, true)),
            (SlotTone::One, false, Self::distance(slot, one, false)),
            (SlotTone::One, true, Self::distance(slot, one, true)),
            (SlotTone::Empty, false, slot.iter().map(|&x| (x as i64) * (x as i64)).sum()),
        ];

        let (tone, inverted, _) = candidates
            .into_iter()
            .min_by_key(|&(_, _, d)| d)
            .unwrap_or((SlotTone::Empty, false, 0));
        (tone, inverted)
    }

    pub fn decode_block(&self, block: &[i16]) -> Result<Decoded> {
        let slot_len = self.table.config().slot_len;
        if block.len() != self.block_len() {
            return Err(ModemError::InsufficientData);
        }

        let slots: Vec<(SlotTone, bool)> = block
            .chunks_exact(slot_len)
            .map(|slot| self.classify_slot(slot))
            .collect();

        if slots.iter().all(|&(tone, _)| tone == SlotTone::Empty) {
            return Ok(Decoded::Silence);
        }

        let (start_tone, base) = slots[0];
        match start_tone {
            SlotTone::One => self.decode_byte(&slots, base).map(Decoded::Byte),
            SlotTone::Zero => Self::check_idle(&slots, base).map(|_| Decoded::IdleCarrier),
            SlotTone::Empty => Err(ModemError::SlotMismatch {
                slot: 0,
                reason: "missing start slot",
            }),
        }
    }

    /// `base` is the start slot's polarity: false for variant A, true for B.
    fn decode_byte(&self, slots: &[(SlotTone, bool)], base: bool) -> Result<u8> {
        let mut sense = false;
        let mut byte = 0u8;

        for (i, &(tone, inverted)) in slots.iter().enumerate().skip(1) {
            if inverted != (base ^ sense) {
                return Err(ModemError::SlotMismatch {
                    slot: i,
                    reason: "polarity breaks sense sequence",
                });
            }

            let is_data = i <= DATA_SLOTS;
            match (tone, is_data) {
                (SlotTone::Zero, true) => {
                    byte |= 1 << (i - 1);
                    sense = !sense;
                }
                (SlotTone::One, true) => {}
                (SlotTone::Zero, false) => sense = !sense,
                (SlotTone::One, false) => {
                    return Err(ModemError::SlotMismatch {
                        slot: i,
                        reason: "stop slot is not a zero-tone",
                    })
                }
                (SlotTone::Empty, _) => {
                    return Err(ModemError::SlotMismatch {
                        slot: i,
                        reason: "empty slot inside symbol",
                    })
                }
            }
        }

        Ok(byte)
    }

    fn check_idle(slots: &[(SlotTone, bool)], base: bool) -> Result<()> {
        for (i, &(tone, inverted)) in slots.iter().enumerate() {
            if tone != SlotTone::Zero || inverted != (base ^ (i % 2 == 1)) {
                return Err(ModemError::SlotMismatch {
                    slot: i,
                    reason: "carrier does not alternate",
                });
            }
        }
        Ok(())
    }

    /// Decode a block-aligned capture, dropping silence and carrier blocks.
    /// A trailing partial block is ignored.
    pub fn decode_stream(&self, samples: &[i16]) -> Result<Vec<u8>> {
        let len = self.block_len();
        if samples.len() < len {
            return Err(ModemError::InsufficientData);
        }

        let mut bytes = Vec::new();
        for block in samples.chunks_exact(len) {
            if let Decoded::Byte(b) = self.decode_block(block)? {
                bytes.push(b);
            }
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{SampleCache, Variant};
    use crate::symbol::Symbol;

    fn setup() -> (SampleCache, Demodulator) {
        let config = ToneConfig::default();
        (
            SampleCache::new(config).unwrap(),
            Demodulator::new(config).unwrap(),
        )
    }

    #[test]
    fn test_decode_every_byte_both_variants() {
        let (cache, demod) = setup();
        for b in 0..=255u8 {
            let sample = cache.get(Symbol::Byte(b));
            for variant in [Variant::A, Variant::B] {
                assert_eq!(
                    demod.decode_block(sample.variant(variant)).unwrap(),
                    Decoded::Byte(b),
                    "byte {:#04x} {:?}",
                    b,
                    variant
                );
            }
        }
    }

    #[test]
    fn test_decode_fixed_patterns() {
        let (cache, demod) = setup();
        let silence = cache.get(Symbol::Silence).variant(Variant::A);
        assert_eq!(demod.decode_block(silence).unwrap(), Decoded::Silence);
        for variant in [Variant::A, Variant::B] {
            let idle = cache.get(Symbol::IdleCarrier).variant(variant);
            assert_eq!(demod.decode_block(idle).unwrap(), Decoded::IdleCarrier);
        }
    }

    #[test]
    fn test_broken_sense_rejected() {
        let (cache, demod) = setup();
        let mut block = cache.get(Symbol::Byte(0x00)).variant(Variant::A).to_vec();
        // flip the polarity of the last stop slot
        for s in &mut block[110..120] {
            *s = -*s;
        }
        assert!(matches!(
            demod.decode_block(&block),
            Err(ModemError::SlotMismatch { slot: 11, .. })
        ));
    }

    #[test]
    fn test_wrong_length() {
        let (_, demod) = setup();
        assert!(matches!(
            demod.decode_block(&[0i16; 100]),
            Err(ModemError::InsufficientData)
        ));
        assert!(demod.decode_stream(&[0i16; 10]).is_err());
    }
}
