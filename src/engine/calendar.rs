//! Join of rooms, plans, stock, prices and booking counts into the calendar view.

use crate::domain::{
    BookingCount, Plan, PlanId, PriceRecord, RoomType, RoomTypeId, StockRecord, UseDate,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarStock {
    pub use_date: UseDate,
    pub room_count: i64,
    pub booking_count: i64,
    pub stock: i64,
    pub is_stop_sales: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyPrice {
    pub occupancy: u32,
    /// Tax-inclusive adult total.
    pub price: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPrices {
    pub prices: Vec<OccupancyPrice>,
    pub booking_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCalendar {
    #[serde(rename = "planID")]
    pub plan_id: PlanId,
    pub plan_name: String,
    pub is_stop_sales: bool,
    pub prices_by_date: BTreeMap<UseDate, DayPrices>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCalendar {
    #[serde(rename = "roomTypeID")]
    pub room_type_id: RoomTypeId,
    pub room_name: String,
    pub is_stop_sales: bool,
    pub stocks: Vec<CalendarStock>,
    pub plans: Vec<PlanCalendar>,
}

/// Inputs of the join, one collection per source.
#[derive(Debug, Clone, Default)]
pub struct CalendarSources {
    pub rooms: Vec<RoomType>,
    pub plans: Vec<Plan>,
    pub stocks: Vec<StockRecord>,
    pub prices: Vec<PriceRecord>,
    /// Plan-scoped counts.
    pub booking_counts: Vec<BookingCount>,
}

/// Build one [`RoomCalendar`] per room.
///
/// Missing price or booking rows simply leave a date out of a plan's map;
/// rows referencing unknown rooms or plans are ignored.
pub fn join_calendar(sources: CalendarSources) -> Vec<RoomCalendar> {
    let CalendarSources {
        mut rooms,
        mut plans,
        stocks,
        prices,
        booking_counts,
    } = sources;
    rooms.sort_by_key(|r| r.id);
    plans.sort_by_key(|p| p.id);

    let mut stocks_by_room: HashMap<_, Vec<CalendarStock>> = HashMap::new();
    for s in stocks {
        stocks_by_room
            .entry(s.room_type_id)
            .or_default()
            .push(CalendarStock {
                use_date: s.use_date,
                room_count: s.room_count,
                booking_count: s.booking_count,
                stock: s.stock,
                is_stop_sales: s.is_stop_sales,
            });
    }

    let mut days_by_plan: HashMap<PlanId, BTreeMap<UseDate, DayPrices>> = HashMap::new();
    for p in prices {
        let Some(occupancy) = p.rate_type_code.occupancy() else {
            tracing::debug!(plan_id = %p.plan_id, code = %p.rate_type_code, "Skipping price row with non-numeric rate type code");
            continue;
        };
        days_by_plan
            .entry(p.plan_id)
            .or_default()
            .entry(p.use_date)
            .or_default()
            .prices
            .push(OccupancyPrice {
                occupancy,
                price: p.price_in_tax,
            });
    }
    for c in booking_counts {
        days_by_plan
            .entry(PlanId::new(c.target_id))
            .or_default()
            .entry(c.use_date)
            .or_default()
            .booking_count += c.count;
    }

    rooms
        .into_iter()
        .map(|room| {
            let mut stocks = stocks_by_room.remove(&room.id).unwrap_or_default();
            stocks.sort_by_key(|s| s.use_date);

            let plans = plans
                .iter()
                .filter(|plan| plan.room_type_id == room.id)
                .map(|plan| {
                    let mut prices_by_date = days_by_plan.remove(&plan.id).unwrap_or_default();
                    for day in prices_by_date.values_mut() {
                        day.prices.sort_by_key(|p| p.occupancy);
                    }
                    PlanCalendar {
                        plan_id: plan.id,
                        plan_name: plan.name.clone(),
                        is_stop_sales: plan.is_stop_sales,
                        prices_by_date,
                    }
                })
                .collect();

            RoomCalendar {
                room_type_id: room.id,
                room_name: room.name,
                is_stop_sales: room.is_stop_sales,
                stocks,
                plans,
            }
        })
        .collect()
}
