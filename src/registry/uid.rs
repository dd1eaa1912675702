//! Unique object identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a live object.
///
/// A valid uid is strictly positive; the raw value 0 is reserved as the
/// "no object" sentinel that appears on the wire for null references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uid(u64);

impl Uid {
    /// The "no object" sentinel.
    pub const NULL: Uid = Uid(0);

    pub(crate) fn new(raw: u64) -> Self {
        Uid(raw)
    }

    /// Raw integer value, as it appears on the wire.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// True for the reserved 0 sentinel.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
