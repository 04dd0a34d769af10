use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::returns::{sum_money, total_credit};
use crate::models::ReturnStatus;
use crate::repositories::ReturnDetail;

const TOP_PRODUCTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusBreakdown {
    pub status: ReturnStatus,
    pub count: usize,
    #[schema(value_type = String)]
    pub credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CountEntry {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AmountEntry {
    pub key: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

/// Dashboard figures over every stored return.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AnalyticsSummary {
    pub total_returns: usize,
    #[schema(value_type = String)]
    pub total_credit: Decimal,
    pub total_items: usize,
    #[schema(value_type = String)]
    pub average_credit_per_return: Decimal,
    pub average_items_per_return: f64,
    /// Always lists all four statuses.
    pub by_status: Vec<StatusBreakdown>,
    pub avg_days_to_warehouse_approval: Option<f64>,
    pub avg_days_warehouse_to_manager: Option<f64>,
    pub avg_days_to_manager_approval: Option<f64>,
    pub by_return_type: Vec<CountEntry>,
    pub by_rep: Vec<CountEntry>,
    pub by_customer: Vec<CountEntry>,
    /// Mean item credit per return type.
    pub avg_item_credit_by_type: Vec<AmountEntry>,
    pub top_products: Vec<CountEntry>,
    /// Returns created per calendar day, oldest first.
    pub returns_per_day: Vec<CountEntry>,
}

fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 86_400.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn counted(map: BTreeMap<String, usize>) -> Vec<CountEntry> {
    map.into_iter()
        .map(|(key, count)| CountEntry { key, count })
        .collect()
}

pub fn summarize(rows: &[ReturnDetail]) -> AnalyticsSummary {
    let total_returns = rows.len();
    let total_items: usize = rows.iter().map(|r| r.items.len()).sum();
    let total = sum_money(rows.iter().map(|r| total_credit(&r.items)));

    let by_status = ReturnStatus::ALL
        .iter()
        .map(|status| {
            let matching = rows.iter().filter(|r| r.record.status == *status);
            StatusBreakdown {
                status: *status,
                count: matching.clone().count(),
                credit: sum_money(matching.map(|r| total_credit(&r.items))),
            }
        })
        .collect();

    let mut to_warehouse = Vec::new();
    let mut warehouse_to_manager = Vec::new();
    let mut to_manager = Vec::new();
    let mut by_type = BTreeMap::new();
    let mut by_rep = BTreeMap::new();
    let mut by_customer = BTreeMap::new();
    let mut per_day = BTreeMap::new();
    let mut products: BTreeMap<String, usize> = BTreeMap::new();
    let mut type_credit: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();

    for ReturnDetail { record, items } in rows {
        let submitted = start_of(record.date_submitted);
        if let Some(wh) = record.wh_approved_at {
            to_warehouse.push(days_between(submitted, wh));
            if let Some(mgr) = record.mgr_approved_at {
                warehouse_to_manager.push(days_between(wh, mgr));
            }
        }
        if let Some(mgr) = record.mgr_approved_at {
            to_manager.push(days_between(submitted, mgr));
        }

        *by_type.entry(record.return_type.clone()).or_insert(0) += 1;
        *by_rep.entry(record.rep_name.clone()).or_insert(0) += 1;
        *by_customer.entry(record.customer_name.clone()).or_insert(0) += 1;
        *per_day
            .entry(record.date_created.date_naive().format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;

        for item in items {
            *products.entry(item.product_code.clone()).or_insert(0) += 1;
            let slot = type_credit
                .entry(record.return_type.clone())
                .or_insert((Decimal::ZERO, 0));
            slot.0 = slot.0.saturating_add(item.credit_amount);
            slot.1 += 1;
        }
    }

    let mut top_products = counted(products);
    top_products.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    top_products.truncate(TOP_PRODUCTS);

    let (average_credit_per_return, average_items_per_return) = if total_returns == 0 {
        (Decimal::ZERO, 0.0)
    } else {
        (
            cents(total / Decimal::from(total_returns)),
            total_items as f64 / total_returns as f64,
        )
    };

    AnalyticsSummary {
        total_returns,
        total_credit: total,
        total_items,
        average_credit_per_return,
        average_items_per_return,
        by_status,
        avg_days_to_warehouse_approval: mean(&to_warehouse),
        avg_days_warehouse_to_manager: mean(&warehouse_to_manager),
        avg_days_to_manager_approval: mean(&to_manager),
        by_return_type: counted(by_type),
        by_rep: counted(by_rep),
        by_customer: counted(by_customer),
        avg_item_credit_by_type: type_credit
            .into_iter()
            .map(|(key, (sum, n))| AmountEntry {
                key,
                amount: cents(sum / Decimal::from(n)),
            })
            .collect(),
        top_products,
        returns_per_day: counted(per_day),
    }
}
