//! Provider discount application.
//!
//! Settlement and receipt generation both price through [`final_amount`] so
//! a charged amount can never disagree with the amount printed on the
//! receipt.

use crate::Amount;

/// Amount actually transferred after applying the receiving provider's
/// discount, rounded half-up at two decimals.
pub fn final_amount(base: Amount, discount_percent: u8) -> Amount {
    debug_assert!(discount_percent <= 100);
    let keep = (100 - discount_percent.min(100)) as i64;
    let cents = (base.as_cents() * keep + 50) / 100;
    Amount::from_cents(cents)
}
