//! Tax splitting and child-tier price derivation.
//!
//! All amounts are whole yen. Consumption tax is fixed at 10%: tax-inclusive
//! amounts are `round(ex * 1.1)`, tax-exclusive amounts recovered from an
//! inclusive one are `floor(in * 10 / 11)`.

use crate::domain::{
    ChildRate, ChildRateCategory, ChildRateTable, ChildTier, Plan, PriceRecord, RateTypeCode,
    TaxCategory, TaxedAmount, UseDate,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

fn tax_multiplier() -> Decimal {
    Decimal::new(11, 1)
}

/// Tax-inclusive amount for a tax-exclusive one.
pub fn add_tax(ex_tax: i64) -> i64 {
    let ex_tax = ex_tax.max(0);
    (Decimal::from(ex_tax) * tax_multiplier())
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Tax-exclusive amount recovered from a tax-inclusive one.
pub fn remove_tax(in_tax: i64) -> i64 {
    let in_tax = in_tax.max(0);
    (Decimal::from(in_tax) * Decimal::from(10) / Decimal::from(11))
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// Split an entered amount into its ex-tax / in-tax pair.
pub fn split_tax(amount: i64, category: TaxCategory) -> TaxedAmount {
    match category {
        TaxCategory::Excluded => TaxedAmount::new(amount.max(0), add_tax(amount)),
        TaxCategory::Included => TaxedAmount::new(remove_tax(amount), amount.max(0)),
    }
}

/// Per-person child charge, tax excluded, before occupancy scaling.
fn child_charge(rate: ChildRate, adult_ex_tax: i64) -> i64 {
    let adult = Decimal::from(adult_ex_tax.max(0));
    let charge = match rate.category {
        ChildRateCategory::Percentage => (adult * rate.rate / Decimal::ONE_HUNDRED).floor(),
        ChildRateCategory::FixedAmount => rate.rate.floor(),
        ChildRateCategory::Discount => (adult - rate.rate).max(Decimal::ZERO).floor(),
    };
    charge.max(Decimal::ZERO).to_i64().unwrap_or(0)
}

/// Derive one tier's price for `occupancy` guests from the per-person adult
/// price (tax excluded).
pub fn derive(rate: Option<ChildRate>, adult_ex_tax: i64, occupancy: u32) -> TaxedAmount {
    let Some(rate) = rate else {
        return TaxedAmount::default();
    };
    let ex_tax = child_charge(rate, adult_ex_tax);
    TaxedAmount::new(ex_tax, add_tax(ex_tax)).scaled(i64::from(occupancy))
}

/// Derive all six tiers.
pub fn derive_all(table: &ChildRateTable, adult_ex_tax: i64, occupancy: u32) -> [TaxedAmount; 6] {
    let mut out = [TaxedAmount::default(); 6];
    for tier in ChildTier::ALL {
        out[tier.index()] = derive(table.get(tier), adult_ex_tax, occupancy);
    }
    out
}

/// An adult price as entered for one date and occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdultPriceInput {
    pub use_date: UseDate,
    pub occupancy: u32,
    /// Per-person amount in the plan's tax category.
    pub per_person_price: i64,
    pub regular_price: i64,
}

/// Build full price rows for a plan from entered adult prices.
///
/// Inputs with a zero occupancy are skipped.
pub fn build_price_rows(plan: &Plan, inputs: &[AdultPriceInput]) -> Vec<PriceRecord> {
    inputs
        .iter()
        .filter(|input| input.occupancy > 0)
        .map(|input| {
            let per_person = split_tax(input.per_person_price, plan.tax_category);
            let adult = per_person.scaled(i64::from(input.occupancy));
            PriceRecord {
                plan_id: plan.id,
                rate_type_code: RateTypeCode::for_occupancy(input.occupancy),
                use_date: input.use_date,
                price: adult.ex_tax,
                price_in_tax: adult.in_tax,
                child_prices: derive_all(&plan.child_rates, per_person.ex_tax, input.occupancy),
                regular_price: input.regular_price,
            }
        })
        .collect()
}

/// Recompute only the child columns of a stored row from its adult price.
///
/// Returns `None` when the rate type code is not a usable occupancy.
pub fn rederive_child_prices(row: &PriceRecord, table: &ChildRateTable) -> Option<[TaxedAmount; 6]> {
    let occupancy = row.rate_type_code.occupancy()?;
    let per_person = row.price / i64::from(occupancy);
    Some(derive_all(table, per_person, occupancy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlanGroupId, PlanId, PropertyId, RoomTypeId};

    fn pct(rate: i64) -> Option<ChildRate> {
        Some(ChildRate::new(ChildRateCategory::Percentage, Decimal::from(rate)))
    }

    #[test]
    fn test_tax_helpers() {
        assert_eq!(add_tax(10000), 11000);
        assert_eq!(add_tax(105), 116); // 115.5 rounds up
        assert_eq!(remove_tax(11000), 10000);
        assert_eq!(remove_tax(1000), 909);
        assert_eq!(split_tax(5500, TaxCategory::Included), TaxedAmount::new(5000, 5500));
        assert_eq!(split_tax(5000, TaxCategory::Excluded), TaxedAmount::new(5000, 5500));
    }

    #[test]
    fn test_percentage_tier() {
        let got = derive(pct(50), 10000, 2);
        assert_eq!(got, TaxedAmount::new(10000, 11000));
    }

    #[test]
    fn test_fixed_amount_tier() {
        let rate = ChildRate::new(ChildRateCategory::FixedAmount, Decimal::from(3000));
        assert_eq!(derive(Some(rate), 10000, 1), TaxedAmount::new(3000, 3300));
        assert_eq!(derive(Some(rate), 10000, 3), TaxedAmount::new(9000, 9900));
    }

    #[test]
    fn test_discount_tier_floors_at_zero() {
        let rate = ChildRate::new(ChildRateCategory::Discount, Decimal::from(2000));
        assert_eq!(derive(Some(rate), 10000, 1), TaxedAmount::new(8000, 8800));

        let steep = ChildRate::new(ChildRateCategory::Discount, Decimal::from(20000));
        assert_eq!(derive(Some(steep), 10000, 2), TaxedAmount::default());
    }

    #[test]
    fn test_unconfigured_tier_is_zero() {
        assert_eq!(derive(None, 10000, 2), TaxedAmount::default());
    }

    #[test]
    fn test_percentage_floors_fractional_yen() {
        // 33% of 999 = 329.67
        assert_eq!(derive(pct(33), 999, 1).ex_tax, 329);
    }

    #[test]
    fn test_build_price_rows_from_tax_included_plan() {
        let plan = Plan {
            id: PlanId::new(9),
            property_id: PropertyId::new(1),
            room_type_id: RoomTypeId::new(1),
            plan_group_id: PlanGroupId::new(1),
            code: "BB".to_string(),
            name: "Bed and breakfast".to_string(),
            tax_category: TaxCategory::Included,
            child_rates: ChildRateTable::default()
                .with(ChildTier::Upper, ChildRate::new(ChildRateCategory::Percentage, Decimal::from(70))),
            is_stop_sales: false,
            cancel_policy_id: None,
        };
        let rows = build_price_rows(
            &plan,
            &[
                AdultPriceInput {
                    use_date: UseDate::from_ymd(2024, 6, 1).unwrap(),
                    occupancy: 2,
                    per_person_price: 11000,
                    regular_price: 26000,
                },
                AdultPriceInput {
                    use_date: UseDate::from_ymd(2024, 6, 1).unwrap(),
                    occupancy: 0,
                    per_person_price: 11000,
                    regular_price: 0,
                },
            ],
        );

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.rate_type_code.as_str(), "2");
        assert_eq!(row.price, 20000);
        assert_eq!(row.price_in_tax, 22000);
        assert_eq!(row.child_prices[0], TaxedAmount::new(14000, 15400));
        assert_eq!(row.child_prices[5], TaxedAmount::default());

        let again = rederive_child_prices(row, &plan.child_rates).unwrap();
        assert_eq!(again, row.child_prices);
    }
}
