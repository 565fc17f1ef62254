use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::error::FacturaError;
use super::types::{FundProvision, InvoiceTotals, LineItem};

/// Tax rate applied when the payload does not name one.
pub const DEFAULT_TAX_RATE: Decimal = dec!(21);

/// Parameters of the totals computation, with the service defaults:
/// no discount, 21 % tax applied, no withholding, no provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsParams {
    /// Discount percentage `d`.
    pub discount: Decimal,
    /// Tax rate percentage `t`.
    pub tax_rate: Decimal,
    pub apply_tax: bool,
    /// Withholding percentage `w`.
    pub withholding: Decimal,
    /// Sum of linked fund provisions `p`.
    pub provisions: Decimal,
}

impl Default for TotalsParams {
    fn default() -> Self {
        Self {
            discount: Decimal::ZERO,
            tax_rate: DEFAULT_TAX_RATE,
            apply_tax: true,
            withholding: Decimal::ZERO,
            provisions: Decimal::ZERO,
        }
    }
}

impl TotalsParams {
    pub fn discount(mut self, percent: Decimal) -> Self {
        self.discount = percent;
        self
    }

    pub fn tax(mut self, apply: bool, rate: Decimal) -> Self {
        self.apply_tax = apply;
        self.tax_rate = rate;
        self
    }

    pub fn withholding(mut self, percent: Decimal) -> Self {
        self.withholding = percent;
        self
    }

    pub fn provisions(mut self, amount: Decimal) -> Self {
        self.provisions = amount;
        self
    }
}

/// `quantity * unit_price`, unrounded.
///
/// Panics if the product overflows `Decimal`; [`validate_draft`] bounds
/// both factors by [`MAX_AMOUNT`] so validated lines never do.
///
/// [`validate_draft`]: super::validate_draft
/// [`MAX_AMOUNT`]: super::MAX_AMOUNT
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Decimal {
    quantity * unit_price
}

/// Sum of the amounts of the given provisions.
pub fn provisions_total(provisions: &[FundProvision]) -> Result<Decimal, FacturaError> {
    provisions
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.amount))
        .ok_or_else(|| out_of_range("provisions"))
}

/// Compute base, tax, withholding and total for a set of lines.
///
/// ```text
/// base       = Σ quantity × unit_price
/// base_final = base × (1 − d/100) − provisions
/// tax        = apply_tax ? base_final × t/100 : 0
/// withheld   = base_final × w/100
/// total      = base_final + tax − withheld
/// ```
///
/// `base_final`, `tax` and `withheld` are rounded to cents before `total`
/// is summed, so the reported figures add up exactly. A negative
/// `base_final` (provisions larger than the discounted base) is returned
/// unchanged.
///
/// Any intermediate that does not fit a `Decimal` is `InvalidInput`.
pub fn calculate_totals(
    lines: &[LineItem],
    params: &TotalsParams,
) -> Result<InvoiceTotals, FacturaError> {
    let gross_base = lines.iter().try_fold(Decimal::ZERO, |acc, l| {
        l.quantity
            .checked_mul(l.unit_price)
            .and_then(|total| acc.checked_add(total))
            .ok_or_else(|| out_of_range("items"))
    })?;

    let kept = Decimal::ONE
        .checked_sub(percent(params.discount, "descuento")?)
        .ok_or_else(|| out_of_range("descuento"))?;
    let taxable_base = gross_base
        .checked_mul(kept)
        .and_then(|discounted| discounted.checked_sub(params.provisions))
        .map(round_cents)
        .ok_or_else(|| out_of_range("baseImponible"))?;

    let tax_amount = if params.apply_tax {
        share(taxable_base, params.tax_rate, "tipoIVA")?
    } else {
        Decimal::ZERO
    };
    let withheld_amount = share(taxable_base, params.withholding, "retencion")?;

    let total = taxable_base
        .checked_add(tax_amount)
        .and_then(|t| t.checked_sub(withheld_amount))
        .ok_or_else(|| out_of_range("importeTotal"))?;

    Ok(InvoiceTotals {
        gross_base,
        taxable_base,
        tax_amount,
        withheld_amount,
        total,
    })
}

fn percent(value: Decimal, field: &str) -> Result<Decimal, FacturaError> {
    value
        .checked_div(dec!(100))
        .ok_or_else(|| out_of_range(field))
}

/// `base × rate/100`, rounded to cents.
fn share(base: Decimal, rate: Decimal, field: &str) -> Result<Decimal, FacturaError> {
    base.checked_mul(percent(rate, field)?)
        .map(round_cents)
        .ok_or_else(|| out_of_range(field))
}

fn out_of_range(field: &str) -> FacturaError {
    FacturaError::InvalidInput(format!("{field}: amount out of range"))
}

/// Round to 2 decimal places, half away from zero (commercial rounding).
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
