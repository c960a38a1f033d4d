use crate::error::{ModemError, Result};

/// A unit of transmission: a literal byte or one of the two fixed patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Byte(u8),
    /// 12 empty slots
    Silence,
    /// Alternating-polarity zero-tone carrier
    IdleCarrier,
}

impl Symbol {
    /// Number of distinct symbols (256 bytes + 2 markers)
    pub const COUNT: usize = 258;

    /// Dense index used to address the sample cache.
    /// Bytes map to 0..=255, markers follow.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Symbol::Byte(b) => b as usize,
            Symbol::Silence => 256,
            Symbol::IdleCarrier => 257,
        }
    }

    /// Inverse of [`Symbol::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0..=255 => Some(Symbol::Byte(index as u8)),
            256 => Some(Symbol::Silence),
            257 => Some(Symbol::IdleCarrier),
            _ => None,
        }
    }

    /// Iterate every encodable symbol in index order.
    pub fn all() -> impl Iterator<Item = Symbol> {
        (0..Self::COUNT).filter_map(Self::from_index)
    }
}

impl From<u8> for Symbol {
    fn from(byte: u8) -> Self {
        Symbol::Byte(byte)
    }
}

impl TryFrom<u32> for Symbol {
    type Error = ModemError;

    /// Wider integers are a contract violation once they leave byte range.
    fn try_from(value: u32) -> Result<Self> {
        u8::try_from(value)
            .map(Symbol::Byte)
            .map_err(|_| ModemError::InvalidSymbol(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for symbol in Symbol::all() {
            assert_eq!(Symbol::from_index(symbol.index()), Some(symbol));
        }
        assert_eq!(Symbol::all().count(), Symbol::COUNT);
        assert_eq!(Symbol::from_index(Symbol::COUNT), None);
    }

    #[test]
    fn test_try_from_rejects_out_of_range() {
        assert_eq!(Symbol::try_from(65u32).unwrap(), Symbol::Byte(b'A'));
        assert_eq!(Symbol::try_from(255u32).unwrap(), Symbol::Byte(255));
        assert!(matches!(
            Symbol::try_from(256u32),
            Err(ModemError::InvalidSymbol(256))
        ));
    }
}
