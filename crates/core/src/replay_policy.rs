//! Per-message-type replay metadata.

use serde::{Deserialize, Serialize};

/// Bit-set describing whether and how a message type may be re-executed.
///
/// Only [`ReplayPolicy::REPLAYABLE`] gates replay. The other flags are
/// advisory: a type declared `REPLAYABLE | DO_NOT_REPLAY` is still replayed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayPolicy(u8);

impl ReplayPolicy {
    /// No declared behavior (not replayable).
    pub const NONE: Self = Self(0);

    /// Safe to replay; re-execution is deterministic.
    pub const REPLAYABLE: Self = Self(1 << 0);

    /// Mutates application state or data.
    pub const MUTATES_DATA: Self = Self(1 << 1);

    /// Depends on real-time inputs (clock, external APIs).
    pub const TIME_SENSITIVE: Self = Self(1 << 2);

    /// Should never be replayed automatically.
    pub const DO_NOT_REPLAY: Self = Self(1 << 3);

    const ALL: u8 = 0b1111;

    const NAMED: [(Self, &'static str); 4] = [
        (Self::REPLAYABLE, "REPLAYABLE"),
        (Self::MUTATES_DATA, "MUTATES_DATA"),
        (Self::TIME_SENSITIVE, "TIME_SENSITIVE"),
        (Self::DO_NOT_REPLAY, "DO_NOT_REPLAY"),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build a policy from raw bits, dropping unknown flags.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True iff `REPLAYABLE` is set, regardless of every other flag.
    pub const fn is_replayable(self) -> bool {
        self.contains(Self::REPLAYABLE)
    }
}

impl core::ops::BitOr for ReplayPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for ReplayPolicy {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl core::fmt::Display for ReplayPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }

        let mut first = true;
        for (flag, name) in Self::NAMED {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
