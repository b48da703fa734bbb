//! Receipts returned by committed operations.
//!
//! Every operation that changes market state hands back a receipt describing
//! what moved. Receipts are plain data: serializable, comparable, loggable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DepositorId, PositionKey, Side};

/// The kind of operation a receipt records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptType {
    /// A new position was opened.
    PositionOpened,
    /// An active position received more principal.
    PositionToppedUp,
    /// Accrued opposite-side proceeds were paid out.
    AccruedWithdrawn,
    /// A position was closed and deleted.
    PositionClosed,
}

impl std::fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PositionOpened => write!(f, "POSITION_OPENED"),
            Self::PositionToppedUp => write!(f, "POSITION_TOPPED_UP"),
            Self::AccruedWithdrawn => write!(f, "ACCRUED_WITHDRAWN"),
            Self::PositionClosed => write!(f, "POSITION_CLOSED"),
        }
    }
}

/// Result of a deposit (open or top-up).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub receipt_type: ReceiptType,
    pub position: PositionKey,
    pub owner: DepositorId,
    pub side: Side,
    /// Amount moved into the side's vault.
    pub amount: u64,
    /// Position flow contribution after the deposit (`VOLUME_SCALE`).
    pub flow_rate: u64,
    pub start_tick: u64,
    pub end_tick: u64,
    pub tick: u64,
    pub issued_at: DateTime<Utc>,
}

/// Result of withdrawing accrued proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReceipt {
    pub position: PositionKey,
    pub owner: DepositorId,
    /// Asset paid out (opposite of the position's side).
    pub asset: Side,
    pub amount: u64,
    pub settled_until_tick: u64,
    pub tick: u64,
    pub issued_at: DateTime<Utc>,
}

/// Result of closing a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReceipt {
    pub position: PositionKey,
    pub owner: DepositorId,
    pub side: Side,
    /// Opposite asset paid out by the final settlement.
    pub proceeds: u64,
    /// Own asset returned: unstreamed principal plus idle-tick principal.
    pub refund: u64,
    /// Whether the position left before its end tick.
    pub early: bool,
    pub tick: u64,
    pub issued_at: DateTime<Utc>,
}

impl WithdrawReceipt {
    #[must_use]
    pub fn receipt_type(&self) -> ReceiptType {
        ReceiptType::AccruedWithdrawn
    }
}

impl CloseReceipt {
    #[must_use]
    pub fn receipt_type(&self) -> ReceiptType {
        ReceiptType::PositionClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_type_display() {
        assert_eq!(format!("{}", ReceiptType::PositionOpened), "POSITION_OPENED");
        assert_eq!(
            format!("{}", ReceiptType::AccruedWithdrawn),
            "ACCRUED_WITHDRAWN"
        );
    }

    #[test]
    fn close_receipt_serializes() {
        let receipt = CloseReceipt {
            position: PositionKey([1; 32]),
            owner: DepositorId::from_bytes([2; 16]),
            side: Side::A,
            proceeds: 10,
            refund: 20,
            early: true,
            tick: 500,
            issued_at: Utc::now(),
        };
        let json = serde_json::to_string(&receipt).unwrap();
        let back: CloseReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(receipt, back);
        assert_eq!(back.receipt_type(), ReceiptType::PositionClosed);
    }
}
