use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::sleep};

use crate::domain::SurfaceId;

pub type EvaluateFn<T> = Arc<dyn Fn(SurfaceId, T) -> BoxFuture<'static, ()> + Send + Sync>;

enum SlotState {
    Idle,
    Pending(JoinHandle<()>),
}

struct Slot<T> {
    state: SlotState,
    generation: u64,
    latest: Option<T>,
    running: Arc<tokio::sync::Mutex<()>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            state: SlotState::Idle,
            generation: 0,
            latest: None,
            running: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Trailing-edge debounce per surface; started evaluations are never aborted.
pub struct ChangeDebouncer<T> {
    quiet_period: Duration,
    evaluate: EvaluateFn<T>,
    slots: Arc<Mutex<HashMap<SurfaceId, Slot<T>>>>,
}

impl<T: Send + 'static> ChangeDebouncer<T> {
    pub fn new(quiet_period: Duration, evaluate: EvaluateFn<T>) -> Self {
        Self {
            quiet_period,
            evaluate,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn trigger(&self, surface: SurfaceId, change: T) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(surface).or_insert_with(Slot::new);
        slot.latest = Some(change);
        slot.generation = slot.generation.wrapping_add(1);

        if let SlotState::Pending(handle) = std::mem::replace(&mut slot.state, SlotState::Idle) {
            handle.abort();
            tracing::trace!(target: "debounce", surface = surface.0, "quiet period restarted");
        }

        let generation = slot.generation;
        let running = slot.running.clone();
        let shared = self.slots.clone();
        let evaluate = self.evaluate.clone();
        let quiet_period = self.quiet_period;

        let handle = tokio::spawn(async move {
            sleep(quiet_period).await;
            let _running = running.lock_owned().await;
            let change = {
                let mut slots = shared.lock();
                let Some(slot) = slots.get_mut(&surface) else {
                    return;
                };
                if slot.generation != generation {
                    return;
                }
                slot.state = SlotState::Idle;
                slot.latest.take()
            };
            let Some(change) = change else {
                return;
            };

            tracing::debug!(target: "debounce", surface = surface.0, "quiet period elapsed; evaluating");
            evaluate(surface, change).await;
        });
        slot.state = SlotState::Pending(handle);
    }

    pub fn is_pending(&self, surface: SurfaceId) -> bool {
        self.slots
            .lock()
            .get(&surface)
            .map(|slot| matches!(slot.state, SlotState::Pending(_)))
            .unwrap_or(false)
    }

    pub fn forget(&self, surface: SurfaceId) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&surface) else {
            return;
        };
        if let SlotState::Pending(handle) = std::mem::replace(&mut slot.state, SlotState::Idle) {
            handle.abort();
        }
        slot.latest = None;
        slot.generation = slot.generation.wrapping_add(1);

        if slot.running.try_lock().is_ok() {
            slots.remove(&surface);
        }
    }

    pub async fn wait_running(&self) {
        let running: Vec<_> = self
            .slots
            .lock()
            .values()
            .map(|slot| slot.running.clone())
            .collect();
        for lock in running {
            drop(lock.lock().await);
        }
    }

    pub fn cancel_all(&self) {
        let mut slots = self.slots.lock();
        let mut cancelled = 0usize;
        for slot in slots.values_mut() {
            if let SlotState::Pending(handle) = std::mem::replace(&mut slot.state, SlotState::Idle) {
                handle.abort();
                cancelled += 1;
            }
            slot.latest = None;
        }
        if cancelled > 0 {
            tracing::info!(target: "debounce", cancelled, "pending evaluations cancelled");
        }
    }
}
