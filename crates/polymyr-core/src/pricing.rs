//! Charge amounts and the platform's application fee.
//!
//! Two revisions of the fee rule exist and the business has not said which
//! is intended, so the rule is chosen by configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How the campaign discount feeds into the platform fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeFormula {
  /// `amount_off / price + cut`
  #[default]
  RewardShare,
  /// `(price - amount_off) / price + cut`
  DiscountedShare,
}

/// What to charge and how much of it the platform withholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeQuote {
  pub amount_cents:          i64,
  pub fee_percentage:        f64,
  pub application_fee_cents: i64,
}

/// Price a single unit of a campaign.
///
/// The full price is charged; the discount only moves money between maker and
/// platform through the application fee, which is clamped to the charge.
pub fn quote(
  formula: FeeFormula,
  price_cents: i64,
  amount_off_cents: i64,
  cut: f64,
) -> Result<ChargeQuote> {
  if price_cents <= 0 {
    return Err(Error::InvalidPricing(format!("price must be positive, got {price_cents}")));
  }
  if !(0..=price_cents).contains(&amount_off_cents) {
    return Err(Error::InvalidPricing(format!(
      "amount off {amount_off_cents} outside 0..={price_cents}"
    )));
  }
  if !cut.is_finite() || !(0.0..=1.0).contains(&cut) {
    return Err(Error::InvalidPricing(format!("maker cut {cut} outside 0..=1")));
  }

  let price = price_cents as f64;
  let reward = amount_off_cents as f64;
  let share = match formula {
    FeeFormula::RewardShare => reward / price,
    FeeFormula::DiscountedShare => (price - reward) / price,
  };
  let fee_percentage = share + cut;
  let application_fee_cents = ((price * fee_percentage).round() as i64).clamp(0, price_cents);

  Ok(ChargeQuote { amount_cents: price_cents, fee_percentage, application_fee_cents })
}
