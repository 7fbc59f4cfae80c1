//! Periodic reconciliation against the backend: pure delta computation over
//! successive snapshots, plus the timer loops that drive it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::debug;
use tokio::runtime::Handle;

use crate::engine::models::{ChatMessage, Product};

pub const STOCK_PERIOD: Duration = Duration::from_secs(60);
pub const BALANCE_PERIOD: Duration = Duration::from_secs(300);
pub const CHAT_PERIOD: Duration = Duration::from_secs(3);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestockEvent {
    pub name: String,
    pub stock: i64,
}

/// Products that came back into (or gained) stock between two snapshots.
///
/// A product counts as restocked when it is new to the snapshot or its count
/// went up, including increases while it was already purchasable. Order
/// follows the fresh snapshot, not any client-side sort.
pub fn restock_delta(old: &[Product], fresh: &[Product]) -> Vec<RestockEvent> {
    let prior: HashMap<&str, i64> = old.iter().map(|p| (p.name.as_str(), p.stock)).collect();
    fresh
        .iter()
        .filter(|p| match prior.get(p.name.as_str()) {
            Some(&previous) => p.stock > previous,
            None => true,
        })
        .map(|p| RestockEvent {
            name: p.name.clone(),
            stock: p.stock,
        })
        .collect()
}

/// Messages in `fresh` whose ids have not been seen yet, in server order.
pub fn chat_delta(known: &[ChatMessage], fresh: &[ChatMessage]) -> Vec<ChatMessage> {
    let seen: HashSet<&str> = known.iter().map(|m| m.id.as_str()).collect();
    fresh
        .iter()
        .filter(|m| !seen.contains(m.id.as_str()))
        .cloned()
        .collect()
}

/// Per-resource in-flight marker. A tick (or manual refresh) that finds the
/// flag raised is dropped outright, never queued behind the running poll.
#[derive(Clone, Default)]
pub struct SingleFlight {
    flag: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the resource. Returns `None` while a prior claim is live; the
    /// returned guard releases on drop, including on error paths.
    pub fn try_begin(&self) -> Option<FlightGuard> {
        if self.flag.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(FlightGuard {
            flag: self.flag.clone(),
        })
    }

    pub fn in_flight(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct FlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running poll loop. There is no user-facing cancel affordance;
/// this exists so shutdown and tests can halt background activity.
#[derive(Clone)]
pub struct PollerHandle {
    stop: Arc<AtomicBool>,
}

impl PollerHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Run `poll` every `period` until the handle is stopped. A tick that fires
/// while the gate is claimed is skipped; a failing poll is the poll's own
/// problem and never ends the loop.
pub fn spawn_poller<F, Fut>(
    runtime: &Handle,
    name: &'static str,
    period: Duration,
    gate: SingleFlight,
    poll: F,
) -> PollerHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = PollerHandle {
        stop: Arc::new(AtomicBool::new(false)),
    };
    let loop_handle = handle.clone();
    runtime.spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            if loop_handle.stopped() {
                debug!("{name} poller stopped");
                break;
            }
            let Some(guard) = gate.try_begin() else {
                debug!("{name} poll dropped: previous poll still in flight");
                continue;
            };
            poll().await;
            drop(guard);
        }
    });
    handle
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn product(name: &str, stock: i64, in_stock: bool) -> Product {
        Product {
            name: name.into(),
            price: 10,
            stock,
            in_stock,
        }
    }

    fn message(id: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            timestamp: "12:00:00".into(),
            username: "steve".into(),
            message: "hi".into(),
        }
    }

    #[test]
    fn restock_fires_on_zero_to_nonzero() {
        let old = vec![product("VIP", 0, false)];
        let fresh = vec![product("VIP", 3, true)];
        assert_eq!(
            restock_delta(&old, &fresh),
            vec![RestockEvent {
                name: "VIP".into(),
                stock: 3
            }]
        );
    }

    #[test]
    fn restock_fires_on_increase_while_in_stock() {
        let old = vec![product("MVP", 2, true)];
        let fresh = vec![product("MVP", 5, true)];
        assert_eq!(restock_delta(&old, &fresh).len(), 1);
    }

    #[test]
    fn restock_fires_for_products_absent_from_prior_snapshot() {
        let fresh = vec![product("NEW", 1, true)];
        assert_eq!(restock_delta(&[], &fresh).len(), 1);
    }

    #[test]
    fn no_restock_on_decrease_or_steady_stock() {
        let old = vec![product("VIP", 3, true), product("MVP", 2, true)];
        let fresh = vec![product("VIP", 1, true), product("MVP", 2, true)];
        assert!(restock_delta(&old, &fresh).is_empty());
    }

    #[test]
    fn restock_order_follows_fresh_snapshot() {
        let old = vec![product("A", 0, false), product("B", 0, false)];
        let fresh = vec![product("B", 2, true), product("A", 1, true)];
        let names: Vec<String> = restock_delta(&old, &fresh)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn chat_delta_reports_only_unseen_ids() {
        let known = vec![message("1"), message("2")];
        let fresh = vec![message("1"), message("2"), message("3")];
        let delta = chat_delta(&known, &fresh);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].id, "3");
    }

    #[test]
    fn chat_delta_is_idempotent() {
        let known = vec![message("1")];
        let fresh = vec![message("1"), message("2")];
        let mut buffer = known.clone();
        buffer.extend(chat_delta(&buffer, &fresh));
        // Applying the same snapshot again adds nothing.
        buffer.extend(chat_delta(&buffer, &fresh));
        let ids: Vec<&str> = buffer.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn single_flight_rejects_second_claim_until_released() {
        let gate = SingleFlight::new();
        let guard = gate.try_begin().expect("first claim succeeds");
        assert!(gate.try_begin().is_none());
        assert!(gate.in_flight());
        drop(guard);
        assert!(gate.try_begin().is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn poller_runs_and_stops_on_handle() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll_count = count.clone();
        let handle = spawn_poller(
            &Handle::current(),
            "test",
            Duration::from_millis(5),
            SingleFlight::new(),
            move || {
                let count = poll_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn gated_ticks_are_dropped_not_queued() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll_count = count.clone();
        let gate = SingleFlight::new();
        let held = gate.try_begin().expect("test holds the gate");
        let handle = spawn_poller(
            &Handle::current(),
            "test",
            Duration::from_millis(5),
            gate,
            move || {
                let count = poll_count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Every tick so far found the gate claimed and was dropped.
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(held);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(count.load(Ordering::SeqCst) > 0);
        handle.stop();
    }
}
