//! Allocation calculator.
//!
//! Pure functions from (initial allocation, accrued cost) to balances
//! and settlement splits. No I/O, no state. The registry and
//! coordinator call in here so the arithmetic exists exactly once.

use crate::api::types::SettlementSplit;
use clearmeter_channel_core::Amount;

/// Remaining participant balance. Clamps at zero rather than failing:
/// this is a derived accounting value, not a gate. The gate lives in
/// the increment path, before any mutation.
pub fn current_balance(initial: Amount, total_cost: Amount) -> Amount {
    initial.saturating_sub(total_cost)
}

/// The settlement split after applying accrued cost.
///
/// `participant = max(0, initial - cost)`, `counterparty = min(initial,
/// cost)`; when the cap has been honored (`cost <= initial`) the two
/// sides always sum back to the initial allocation. That conservation
/// law is the invariant the whole system protects.
pub fn settlement_split(initial: Amount, total_cost: Amount) -> SettlementSplit {
    SettlementSplit {
        participant: initial.saturating_sub(total_cost),
        counterparty: initial.min(total_cost),
    }
}
