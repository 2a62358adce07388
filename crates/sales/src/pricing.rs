//! Order pricing: discounted line nets, 15% sales tax, totals.
//!
//! Amounts are in the smallest currency unit (cents). Discounts are basis
//! points. Every division rounds half up, which is what the ERP does.

use serde::{Deserialize, Serialize};

/// Sales tax applied on the discounted subtotal.
pub const TAX_RATE_PERCENT: u64 = 15;

/// 100% expressed in basis points.
pub const FULL_DISCOUNT_BPS: u32 = 10_000;

/// Computed order amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: u64,
    pub tax: u64,
    pub total: u64,
}

fn div_round_half_up(numerator: u128, denominator: u128) -> u128 {
    (numerator + denominator / 2) / denominator
}

/// Net amount of one line: `quantity * unit_price * (1 - discount)`.
///
/// `discount_bps` above 100% is clamped to 100%. Returns `None` when the
/// amount does not fit in a `u64`.
pub fn line_net(quantity: u32, unit_price: u64, discount_bps: u32) -> Option<u64> {
    let kept_bps = FULL_DISCOUNT_BPS - discount_bps.min(FULL_DISCOUNT_BPS);
    let gross = u128::from(quantity) * u128::from(unit_price);
    let net = div_round_half_up(gross * u128::from(kept_bps), u128::from(FULL_DISCOUNT_BPS));
    u64::try_from(net).ok()
}

/// Tax owed on a subtotal.
pub fn tax_for(subtotal: u64) -> Option<u64> {
    let tax = div_round_half_up(u128::from(subtotal) * u128::from(TAX_RATE_PERCENT), 100);
    u64::try_from(tax).ok()
}

/// Totals over a set of `(quantity, unit_price, discount_bps)` lines.
///
/// `None` when any line, the subtotal or the total leaves the `u64` range.
pub fn totals<I>(lines: I) -> Option<Totals>
where
    I: IntoIterator<Item = (u32, u64, u32)>,
{
    let mut subtotal: u64 = 0;
    for (quantity, unit_price, discount_bps) in lines {
        subtotal = subtotal.checked_add(line_net(quantity, unit_price, discount_bps)?)?;
    }
    let tax = tax_for(subtotal)?;
    Some(Totals {
        subtotal,
        tax,
        total: subtotal.checked_add(tax)?,
    })
}
