//! Status precedence.
//!
//! ```text
//! created, pending, processing                 1
//! ready                                        2
//! paid, cancelled, partial_cancelled, failed   3
//! amount_mismatch                              4
//! anything unrecognized                        0
//! ```
//!
//! An update applies when its rank is at least the current rank. Equal ranks
//! overwrite each other (`paid` -> `cancelled` is a real refund), so this is a
//! ratchet rather than a state machine.

use crate::types::{OrderStatus, PaymentStatus, StoredStatus};

/// Rank of a status the vocabulary does not contain.
pub const UNRECOGNIZED_RANK: u8 = 0;

/// A status with a precedence rank.
pub trait Ranked {
    /// Precedence rank; higher wins.
    fn rank(&self) -> u8;
}

impl Ranked for PaymentStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Created | Self::Pending | Self::Processing => 1,
            Self::Ready => 2,
            Self::Paid | Self::Cancelled | Self::PartialCancelled | Self::Failed => 3,
            Self::AmountMismatch => 4,
        }
    }
}

impl Ranked for OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 1,
            Self::Ready => 2,
            Self::Paid | Self::Cancelled | Self::PartialCancelled | Self::Failed => 3,
            Self::AmountMismatch => 4,
        }
    }
}

impl<S: Ranked> Ranked for StoredStatus<S> {
    fn rank(&self) -> u8 {
        match self {
            Self::Known(status) => status.rank(),
            Self::Unrecognized(_) => UNRECOGNIZED_RANK,
        }
    }
}

/// Whether `next` may overwrite `current`.
#[must_use]
pub fn should_apply(current: &impl Ranked, next: &impl Ranked) -> bool {
    next.rank() >= current.rank()
}
