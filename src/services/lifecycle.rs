//! Order status state machine and progress timing.
//!
//! Nothing here touches storage; the order service feeds it the current status and
//! "now" and persists whatever it returns.

use chrono::{DateTime, Duration, Utc};

use crate::config::{LifecycleConfig, MAX_DWELL_SECS};
use crate::entities::{OrderStatus, OrderType};

/// Upper bound on zero-dwell hops resolved in a single tick.
const MAX_CHAINED_HOPS: usize = 6;

/// Auto-progress fields an order takes on when it enters a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub auto_progress: bool,
    pub next_auto_transition_time: Option<DateTime<Utc>>,
    pub progress_percent: i32,
}

impl ProgressState {
    /// Stopped: no timer, bar full.
    pub fn stopped() -> Self {
        Self {
            auto_progress: false,
            next_auto_transition_time: None,
            progress_percent: 100,
        }
    }

    fn running(until: DateTime<Utc>) -> Self {
        Self {
            auto_progress: true,
            next_auto_transition_time: Some(until),
            progress_percent: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    config: LifecycleConfig,
}

impl LifecycleEngine {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.config.tick_interval_secs)
    }

    pub fn dwell(&self, status: OrderStatus) -> Duration {
        let secs = self.config.dwell.for_status(status).min(MAX_DWELL_SECS);
        Duration::seconds(secs as i64)
    }

    /// Table orders wait in READY_FOR_PICKUP until their account is closed.
    pub fn is_held(order_type: OrderType, status: OrderStatus) -> bool {
        order_type == OrderType::Table && status == OrderStatus::ReadyForPickup
    }

    /// The single place that decides timer and progress on entering `status`.
    pub fn enter(&self, status: OrderStatus, order_type: OrderType, now: DateTime<Utc>) -> ProgressState {
        if status.is_terminal() || Self::is_held(order_type, status) {
            return ProgressState::stopped();
        }
        let dwell = self.dwell(status);
        if dwell > Duration::zero() {
            ProgressState::running(now + dwell)
        } else {
            ProgressState::stopped()
        }
    }

    /// One automatic step from `current`, or `None` when the order should stop here.
    pub fn next_status(&self, current: OrderStatus, order_type: OrderType) -> Option<OrderStatus> {
        if current.is_terminal() || Self::is_held(order_type, current) {
            return None;
        }
        let successor = self.config.successors.successor(current)?;
        if successor == OrderStatus::OutForDelivery && order_type != OrderType::Delivery {
            return Some(OrderStatus::Delivered);
        }
        Some(successor)
    }

    /// Where a due order lands: follows successors through statuses that have no dwell
    /// so that a zero wait never costs an extra tick.
    pub fn resolve_auto_target(
        &self,
        current: OrderStatus,
        order_type: OrderType,
    ) -> Option<OrderStatus> {
        let mut target = self.next_status(current, order_type)?;
        for _ in 0..MAX_CHAINED_HOPS {
            if target.is_terminal()
                || Self::is_held(order_type, target)
                || self.dwell(target) > Duration::zero()
            {
                break;
            }
            match self.next_status(target, order_type) {
                Some(next) => target = next,
                None => break,
            }
        }
        Some(target)
    }

    /// Progress through the current dwell, 0..=100, rounded.
    pub fn live_progress(
        &self,
        status: OrderStatus,
        next_auto_transition_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> i32 {
        let dwell_ms = self.dwell(status).num_milliseconds();
        let remaining_ms = (next_auto_transition_time - now).num_milliseconds();
        if dwell_ms <= 0 {
            return if remaining_ms <= 0 { 100 } else { 0 };
        }
        let elapsed_ms = (dwell_ms - remaining_ms).clamp(0, dwell_ms);
        let percent = (elapsed_ms * 100 + dwell_ms / 2) / dwell_ms;
        percent.clamp(0, 100) as i32
    }

    /// Whether a live value has drifted far enough from the stored one to be written back.
    pub fn should_persist_progress(&self, live: i32, persisted: i32) -> bool {
        (live - persisted).abs() > self.config.progress_persist_threshold
            || (live == 100 && persisted != 100)
            || (live == 0 && persisted != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DwellDurations, SuccessorTable};

    fn engine() -> LifecycleEngine {
        LifecycleEngine::new(LifecycleConfig::default())
    }

    fn engine_with_dwell(dwell: DwellDurations) -> LifecycleEngine {
        LifecycleEngine::new(LifecycleConfig {
            dwell,
            ..LifecycleConfig::default()
        })
    }

    #[test]
    fn entering_a_timed_status_starts_the_clock() {
        let now = Utc::now();
        let state = engine().enter(OrderStatus::Pending, OrderType::Counter, now);
        assert_eq!(
            state,
            ProgressState {
                auto_progress: true,
                next_auto_transition_time: Some(now + Duration::seconds(300)),
                progress_percent: 0,
            }
        );
    }

    #[test]
    fn terminal_held_and_zero_dwell_statuses_stop() {
        let now = Utc::now();
        let e = engine();
        assert_eq!(
            e.enter(OrderStatus::Delivered, OrderType::Delivery, now),
            ProgressState::stopped()
        );
        assert_eq!(
            e.enter(OrderStatus::Cancelled, OrderType::Counter, now),
            ProgressState::stopped()
        );
        assert_eq!(
            e.enter(OrderStatus::ReadyForPickup, OrderType::Table, now),
            ProgressState::stopped()
        );
        // ready_for_pickup has no dwell by default
        assert_eq!(
            e.enter(OrderStatus::ReadyForPickup, OrderType::Counter, now),
            ProgressState::stopped()
        );
    }

    #[test]
    fn counter_orders_skip_out_for_delivery() {
        let e = engine();
        assert_eq!(
            e.next_status(OrderStatus::ReadyForPickup, OrderType::Counter),
            Some(OrderStatus::Delivered)
        );
        assert_eq!(
            e.next_status(OrderStatus::ReadyForPickup, OrderType::Delivery),
            Some(OrderStatus::OutForDelivery)
        );
        assert_eq!(e.next_status(OrderStatus::ReadyForPickup, OrderType::Table), None);
        assert_eq!(e.next_status(OrderStatus::Delivered, OrderType::Counter), None);
    }

    #[test]
    fn zero_dwell_statuses_are_passed_through() {
        let e = engine();
        assert_eq!(
            e.resolve_auto_target(OrderStatus::Preparing, OrderType::Counter),
            Some(OrderStatus::Delivered)
        );
        assert_eq!(
            e.resolve_auto_target(OrderStatus::Preparing, OrderType::Table),
            Some(OrderStatus::ReadyForPickup)
        );
        assert_eq!(
            e.resolve_auto_target(OrderStatus::Preparing, OrderType::Delivery),
            Some(OrderStatus::OutForDelivery)
        );
    }

    #[test]
    fn all_zero_dwell_delivers_counter_orders_in_one_step() {
        let e = engine_with_dwell(DwellDurations {
            pending_secs: 0,
            preparing_secs: 0,
            ready_for_pickup_secs: 0,
            out_for_delivery_secs: 0,
        });
        assert_eq!(
            e.resolve_auto_target(OrderStatus::Pending, OrderType::Counter),
            Some(OrderStatus::Delivered)
        );
        assert_eq!(
            e.resolve_auto_target(OrderStatus::Pending, OrderType::Delivery),
            Some(OrderStatus::Delivered)
        );
    }

    #[test]
    fn missing_successor_stops_resolution() {
        let e = LifecycleEngine::new(LifecycleConfig {
            successors: SuccessorTable {
                preparing: None,
                ..SuccessorTable::default()
            },
            ..LifecycleConfig::default()
        });
        assert_eq!(e.resolve_auto_target(OrderStatus::Preparing, OrderType::Counter), None);
        assert_eq!(
            e.resolve_auto_target(OrderStatus::Pending, OrderType::Counter),
            Some(OrderStatus::Preparing)
        );
    }

    #[test]
    fn cyclic_successors_terminate() {
        let e = LifecycleEngine::new(LifecycleConfig {
            dwell: DwellDurations {
                pending_secs: 0,
                preparing_secs: 0,
                ready_for_pickup_secs: 0,
                out_for_delivery_secs: 0,
            },
            successors: SuccessorTable {
                pending: Some(OrderStatus::Preparing),
                preparing: Some(OrderStatus::Pending),
                ..SuccessorTable::default()
            },
            ..LifecycleConfig::default()
        });
        assert!(e.resolve_auto_target(OrderStatus::Pending, OrderType::Counter).is_some());
    }

    #[test]
    fn live_progress_tracks_elapsed_share_of_dwell() {
        let e = engine();
        let now = Utc::now();
        let due = now + Duration::seconds(600);
        assert_eq!(e.live_progress(OrderStatus::Preparing, due, now), 0);
        assert_eq!(
            e.live_progress(OrderStatus::Preparing, due, now + Duration::seconds(300)),
            50
        );
        assert_eq!(
            e.live_progress(OrderStatus::Preparing, due, now + Duration::seconds(900)),
            100
        );
        // timer further out than the dwell (e.g. dwell shortened by config)
        assert_eq!(
            e.live_progress(OrderStatus::Preparing, now + Duration::seconds(1200), now),
            0
        );
    }

    #[test]
    fn live_progress_on_zero_dwell_is_binary() {
        let e = engine();
        let now = Utc::now();
        assert_eq!(
            e.live_progress(OrderStatus::ReadyForPickup, now - Duration::seconds(1), now),
            100
        );
        assert_eq!(
            e.live_progress(OrderStatus::ReadyForPickup, now + Duration::seconds(1), now),
            0
        );
    }

    #[test]
    fn progress_persistence_threshold() {
        let e = engine();
        assert!(!e.should_persist_progress(13, 10));
        assert!(!e.should_persist_progress(15, 10));
        assert!(e.should_persist_progress(16, 10));
        assert!(e.should_persist_progress(100, 98));
        assert!(e.should_persist_progress(0, 3));
        assert!(!e.should_persist_progress(100, 100));
        assert!(!e.should_persist_progress(0, 0));
    }
}
