//! Plans and their child-rate configuration.

use crate::domain::{CancelPolicyId, PlanGroupId, PlanId, PropertyId, RoomTypeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether prices entered for a plan already include consumption tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaxCategory {
    Included,
    Excluded,
}

impl TaxCategory {
    pub fn from_included_flag(included: bool) -> Self {
        if included {
            TaxCategory::Included
        } else {
            TaxCategory::Excluded
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, TaxCategory::Included)
    }
}

/// The six child pricing tiers, in storage column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildTier {
    /// Ages 9 to 11.
    Upper,
    /// Ages 6 to 8.
    Lower,
    /// Ages 0 to 5 with meals and bedding.
    InfantMealBed,
    /// Ages 0 to 5 with meals only.
    InfantMeal,
    /// Ages 0 to 5 with bedding only.
    InfantBed,
    /// Ages 0 to 5 with neither.
    InfantNone,
}

impl ChildTier {
    pub const ALL: [ChildTier; 6] = [
        ChildTier::Upper,
        ChildTier::Lower,
        ChildTier::InfantMealBed,
        ChildTier::InfantMeal,
        ChildTier::InfantBed,
        ChildTier::InfantNone,
    ];

    pub fn index(&self) -> usize {
        match self {
            ChildTier::Upper => 0,
            ChildTier::Lower => 1,
            ChildTier::InfantMealBed => 2,
            ChildTier::InfantMeal => 3,
            ChildTier::InfantBed => 4,
            ChildTier::InfantNone => 5,
        }
    }
}

/// How a child tier's rate value is applied to the adult price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildRateCategory {
    /// `rate` percent of the adult price.
    Percentage,
    /// `rate` as an absolute per-person charge.
    FixedAmount,
    /// Adult price minus `rate`, floored at zero.
    Discount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRate {
    pub category: ChildRateCategory,
    pub rate: Decimal,
}

impl ChildRate {
    pub fn new(category: ChildRateCategory, rate: Decimal) -> Self {
        Self { category, rate }
    }
}

/// Child-rate configuration of a plan; `None` means the tier is not sold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildRateTable(pub [Option<ChildRate>; 6]);

impl ChildRateTable {
    pub fn get(&self, tier: ChildTier) -> Option<ChildRate> {
        self.0[tier.index()]
    }

    pub fn with(mut self, tier: ChildTier, rate: ChildRate) -> Self {
        self.0[tier.index()] = Some(rate);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub property_id: PropertyId,
    pub room_type_id: RoomTypeId,
    pub plan_group_id: PlanGroupId,
    pub code: String,
    pub name: String,
    pub tax_category: TaxCategory,
    pub child_rates: ChildRateTable,
    pub is_stop_sales: bool,
    pub cancel_policy_id: Option<CancelPolicyId>,
}

/// Input for creating one plan per room under a freshly allocated group id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlanGroup {
    pub property_id: PropertyId,
    pub room_type_ids: Vec<RoomTypeId>,
    pub code: String,
    pub name: String,
    pub tax_category: TaxCategory,
    pub child_rates: ChildRateTable,
    pub cancel_policy_id: Option<CancelPolicyId>,
}
