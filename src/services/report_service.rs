use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use std::sync::Arc;

use crate::config::ReportingConfig;
use crate::entities::OrderStatus;
use crate::error::{AppError, AppResult};
use crate::models::{FinancialOverview, OrderDetail};
use crate::store::{OrderFilter, Store};
use crate::utils::Clock;

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl ReportService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &ReportingConfig) -> Self {
        // validated on load; an out-of-range value falls back to UTC
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or(Utc.fix());
        Self {
            store,
            clock,
            offset,
        }
    }

    /// Figures over the orders placed since the start of the local year, read from the
    /// store so they do not depend on what the mirror holds.
    pub async fn financial_overview(&self) -> AppResult<FinancialOverview> {
        let now = self.clock.now();
        let year_start = local_year_start(now, self.offset)?;
        let orders = self
            .store
            .list_orders(&OrderFilter::placed_since(year_start))
            .await?;
        let pending = self
            .store
            .list_orders(&OrderFilter::default().with_statuses(vec![OrderStatus::Pending]))
            .await?;
        log::debug!(
            "Financial overview over {} order(s) since {year_start}",
            orders.len()
        );
        Ok(compute_overview(&orders, pending.len(), now, self.offset))
    }
}

/// Midnight of January 1st at `offset`, as a UTC instant.
fn local_year_start(now: DateTime<Utc>, offset: FixedOffset) -> AppResult<DateTime<Utc>> {
    now.with_timezone(&offset)
        .date_naive()
        .with_ordinal(1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(offset).single())
        .map(|start| start.with_timezone(&Utc))
        .ok_or_else(|| AppError::InternalError(format!("No year start for {now}")))
}

/// Buckets `orders` by local day, month and year. Pending orders are counted by the
/// caller since they may predate the slice.
pub fn compute_overview(
    orders: &[OrderDetail],
    pending_orders: usize,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> FinancialOverview {
    let today = now.with_timezone(&offset).date_naive();
    let mut overview = FinancialOverview {
        sales_today: 0,
        sales_this_month: 0,
        sales_this_year: 0,
        delivered_orders: 0,
        average_ticket: 0,
        pending_orders,
        orders_today: 0,
        generated_at: now,
    };
    let mut delivered_total = 0i64;

    for detail in orders {
        let order = &detail.order;
        let day = order.order_time.with_timezone(&offset).date_naive();
        if day == today {
            overview.orders_today += 1;
        }
        match order.status {
            OrderStatus::Delivered => {
                overview.delivered_orders += 1;
                delivered_total += order.total_amount;
                if day.year() == today.year() {
                    overview.sales_this_year += order.total_amount;
                    if day.month() == today.month() {
                        overview.sales_this_month += order.total_amount;
                        if day == today {
                            overview.sales_today += order.total_amount;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if overview.delivered_orders > 0 {
        overview.average_ticket = delivered_total / overview.delivered_orders as i64;
    }
    overview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OrderType, order_entity};
    use crate::services::test_support::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn order(status: OrderStatus, at: DateTime<Utc>, total: i64) -> OrderDetail {
        OrderDetail {
            order: order_entity::Model {
                id: Uuid::new_v4(),
                customer_id: None,
                customer_name: "Guest".to_string(),
                customer_phone: None,
                customer_address: None,
                notes: None,
                total_amount: total,
                status,
                order_type: OrderType::Counter,
                table_id: None,
                payment_method: None,
                amount_paid: None,
                change_due: None,
                cash_register_session_id: None,
                order_time: at,
                last_status_change_time: at,
                next_auto_transition_time: None,
                auto_progress: false,
                current_progress_percent: 100,
                created_at: at,
            },
            items: vec![],
        }
    }

    #[test]
    fn buckets_delivered_sales_by_period() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap();
        let utc = FixedOffset::east_opt(0).unwrap();
        let orders = vec![
            order(OrderStatus::Delivered, now - Duration::hours(1), 1000),
            order(OrderStatus::Delivered, now - Duration::days(3), 2000),
            order(OrderStatus::Delivered, now - Duration::days(60), 4000),
            order(OrderStatus::Delivered, now - Duration::days(400), 8000),
            order(OrderStatus::Pending, now, 500),
            order(OrderStatus::Cancelled, now, 700),
        ];
        let overview = compute_overview(&orders, 1, now, utc);
        assert_eq!(overview.sales_today, 1000);
        assert_eq!(overview.sales_this_month, 3000);
        assert_eq!(overview.sales_this_year, 7000);
        assert_eq!(overview.delivered_orders, 4);
        assert_eq!(overview.average_ticket, 3750);
        assert_eq!(overview.pending_orders, 1);
        assert_eq!(overview.orders_today, 3);
    }

    #[test]
    fn local_day_boundary_follows_offset() {
        // 01:30 UTC is still the previous evening at UTC-3
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 1, 30, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2025, 6, 14, 22, 0, 0).unwrap();
        let orders = vec![order(OrderStatus::Delivered, earlier, 1500)];

        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(compute_overview(&orders, 0, now, brt).sales_today, 1500);
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(compute_overview(&orders, 0, now, utc).sales_today, 0);
    }

    #[test]
    fn no_delivered_orders_means_zero_average() {
        let overview = compute_overview(&[], 0, Utc::now(), FixedOffset::east_opt(0).unwrap());
        assert_eq!(overview.average_ticket, 0);
        assert_eq!(overview.delivered_orders, 0);
    }

    #[test]
    fn year_start_is_local_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        let brt = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(
            local_year_start(now, brt).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap()
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            local_year_start(now, utc).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn overview_reads_orders_the_mirror_never_loaded() {
        let h = harness().await;
        let now = h.clock.now();
        for (at, total) in [
            (now - Duration::hours(2), 1000),
            (now - Duration::days(20), 2000),
            (now - Duration::days(400), 9000),
        ] {
            h.store
                .insert_order(order(OrderStatus::Delivered, at, total).order, vec![])
                .await
                .unwrap();
        }
        h.store
            .insert_order(order(OrderStatus::Pending, now - Duration::days(500), 300).order, vec![])
            .await
            .unwrap();
        assert!(h.services.state.orders().await.is_empty());

        let overview = h.services.reports.financial_overview().await.unwrap();
        assert_eq!(overview.sales_today, 1000);
        assert_eq!(overview.sales_this_month, 1000);
        assert_eq!(overview.sales_this_year, 3000);
        assert_eq!(overview.delivered_orders, 2);
        assert_eq!(overview.average_ticket, 1500);
        assert_eq!(overview.pending_orders, 1);
        assert_eq!(overview.orders_today, 1);
        assert_eq!(overview.generated_at, now);
    }
}
