//! The two sides of a streaming market.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which asset a position streams in.
///
/// A position on side `A` streams asset A into the market and earns asset B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The other side of the pair.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// Single-byte tag used in key derivation.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            Self::A => b'a',
            Self::B => b'b',
        }
    }

    pub const BOTH: [Self; 2] = [Self::A, Self::B];
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}
