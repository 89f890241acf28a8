//! Generational references into the statement and match pools.
//!
//! A reference names a pool slot without owning it. It stays valid only
//! while the slot's generation equals the generation recorded in the
//! reference; once the slot is recycled every old reference is stale.
//!
//! Slot 0 of every pool is reserved, so the all-zero reference is the null
//! reference.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! define_ref {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name {
            /// Slot index in the pool.
            pub index: u32,
            /// Generation the slot had when this reference was issued.
            pub generation: u32,
        }

        impl $name {
            /// The reserved null reference.
            pub const NULL: Self = Self { index: 0, generation: 0 };

            /// Creates a reference from its parts.
            #[must_use]
            pub const fn new(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            /// Returns true if this is the null reference.
            #[must_use]
            pub const fn is_null(self) -> bool {
                self.index == 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_null() {
                    write!(f, "{}(null)", stringify!($name))
                } else {
                    write!(f, "{}({}v{})", stringify!($name), self.index, self.generation)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}:{}"), self.index, self.generation)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let (index, generation) = parse_parts(s, $prefix)?;
                Ok(Self { index, generation })
            }
        }
    };
}

define_ref!(
    /// Weak handle to a statement slot, written `s<index>:<generation>`.
    StatementRef,
    "s"
);

define_ref!(
    /// Weak handle to a match slot, written `m<index>:<generation>`.
    MatchRef,
    "m"
);

fn parse_parts(s: &str, prefix: &str) -> Result<(u32, u32)> {
    let invalid = || Error::invalid_ref(s);
    let body = s.strip_prefix(prefix).ok_or_else(invalid)?;
    let (index, generation) = body.split_once(':').ok_or_else(invalid)?;
    let index = index.parse::<u32>().map_err(|_| invalid())?;
    let generation = generation.parse::<u32>().map_err(|_| invalid())?;
    Ok((index, generation))
}

/// Either kind of reference, as passed through the evaluator boundary.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnyRef {
    /// A statement reference.
    Statement(StatementRef),
    /// A match reference.
    Match(MatchRef),
}

impl fmt::Display for AnyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Statement(r) => write!(f, "{r}"),
            Self::Match(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for AnyRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.as_bytes().first() {
            Some(b's') => s.parse().map(Self::Statement),
            Some(b'm') => s.parse().map(Self::Match),
            _ => Err(Error::invalid_ref(s)),
        }
    }
}

impl From<StatementRef> for AnyRef {
    fn from(r: StatementRef) -> Self {
        Self::Statement(r)
    }
}

impl From<MatchRef> for AnyRef {
    fn from(r: MatchRef) -> Self {
        Self::Match(r)
    }
}
