use uuid::Uuid;

use crate::entities::{CashAdjustmentType, OrderStatus, cash_adjustment_entity, order_entity};

/// Whether a settled order put money in the till.
pub fn counts_toward_till(order: &order_entity::Model) -> bool {
    order.status == OrderStatus::Delivered
        && order.payment_method.is_some_and(|m| m.affects_till())
}

/// Expected drawer contents for one session, all in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionTotals {
    pub sales_from_orders: i64,
    pub added_adjustments: i64,
    pub removed_adjustments: i64,
    pub expected_in_cash: i64,
}

impl SessionTotals {
    /// Orders and adjustments belonging to other sessions are ignored.
    pub fn compute<'a, O, A>(session_id: Uuid, opening_balance: i64, orders: O, adjustments: A) -> Self
    where
        O: IntoIterator<Item = &'a order_entity::Model>,
        A: IntoIterator<Item = &'a cash_adjustment_entity::Model>,
    {
        let sales_from_orders = orders
            .into_iter()
            .filter(|o| o.cash_register_session_id == Some(session_id) && counts_toward_till(o))
            .map(|o| o.total_amount)
            .sum::<i64>();

        let (mut added_adjustments, mut removed_adjustments) = (0i64, 0i64);
        for adj in adjustments
            .into_iter()
            .filter(|a| a.cash_register_session_id == session_id)
        {
            match adj.adjustment_type {
                CashAdjustmentType::Add => added_adjustments += adj.amount,
                CashAdjustmentType::Remove => removed_adjustments += adj.amount,
            }
        }

        Self {
            sales_from_orders,
            added_adjustments,
            removed_adjustments,
            expected_in_cash: opening_balance + sales_from_orders + added_adjustments
                - removed_adjustments,
        }
    }

    /// Counted minus expected; negative means the drawer is short.
    pub fn difference(&self, closing_balance_informed: i64) -> i64 {
        closing_balance_informed - self.expected_in_cash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OrderType, PaymentMethod};
    use chrono::Utc;

    fn order(
        session: Option<Uuid>,
        status: OrderStatus,
        method: Option<PaymentMethod>,
        total: i64,
    ) -> order_entity::Model {
        let now = Utc::now();
        order_entity::Model {
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
            payment_method: method,
            amount_paid: None,
            change_due: None,
            cash_register_session_id: session,
            order_time: now,
            last_status_change_time: now,
            next_auto_transition_time: None,
            auto_progress: false,
            current_progress_percent: 100,
            created_at: now,
        }
    }

    fn adjustment(session: Uuid, kind: CashAdjustmentType, amount: i64) -> cash_adjustment_entity::Model {
        let now = Utc::now();
        cash_adjustment_entity::Model {
            id: Uuid::new_v4(),
            cash_register_session_id: session,
            adjustment_type: kind,
            amount,
            reason: "float".to_string(),
            adjusted_at: now,
            created_at: now,
        }
    }

    #[test]
    fn only_delivered_cash_and_pix_orders_of_the_session_count() {
        let s = Uuid::new_v4();
        let other = Uuid::new_v4();
        let orders = vec![
            order(Some(s), OrderStatus::Delivered, Some(PaymentMethod::Cash), 5000),
            order(Some(s), OrderStatus::Delivered, Some(PaymentMethod::Pix), 2550),
            order(Some(s), OrderStatus::Delivered, Some(PaymentMethod::CreditCard), 9999),
            order(Some(s), OrderStatus::Pending, Some(PaymentMethod::Cash), 1234),
            order(Some(s), OrderStatus::Cancelled, Some(PaymentMethod::Cash), 1000),
            order(Some(other), OrderStatus::Delivered, Some(PaymentMethod::Cash), 700),
            order(None, OrderStatus::Delivered, Some(PaymentMethod::Cash), 800),
        ];
        let no_adjustments: Vec<cash_adjustment_entity::Model> = Vec::new();
        let totals = SessionTotals::compute(s, 10_000, &orders, &no_adjustments);
        assert_eq!(totals.sales_from_orders, 7550);
        assert_eq!(totals.expected_in_cash, 17_550);
    }

    #[test]
    fn adjustments_move_expected_cash() {
        let s = Uuid::new_v4();
        let orders = vec![order(Some(s), OrderStatus::Delivered, Some(PaymentMethod::Cash), 5000)];
        let adjustments = vec![
            adjustment(s, CashAdjustmentType::Add, 2000),
            adjustment(s, CashAdjustmentType::Remove, 500),
            adjustment(Uuid::new_v4(), CashAdjustmentType::Remove, 9000),
        ];
        let totals = SessionTotals::compute(s, 10_000, &orders, &adjustments);
        assert_eq!(totals.added_adjustments, 2000);
        assert_eq!(totals.removed_adjustments, 500);
        assert_eq!(totals.expected_in_cash, 16_500);
        assert_eq!(totals.difference(16_000), -500);
        assert_eq!(totals.difference(16_500), 0);
    }

    #[test]
    fn cent_sums_are_exact() {
        let s = Uuid::new_v4();
        let orders: Vec<_> = (0..3)
            .map(|_| order(Some(s), OrderStatus::Delivered, Some(PaymentMethod::Cash), 10))
            .collect();
        let totals = SessionTotals::compute(s, 0, &orders, &Vec::<cash_adjustment_entity::Model>::new());
        assert_eq!(totals.sales_from_orders, 30);
        assert_eq!(totals.difference(30), 0);
    }
}
