use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::reminder::{FiredReminder, TriggerKey, TriggerPayload};

/// One-shot timed notifications keyed by [`TriggerKey`].
#[async_trait]
pub trait TriggerService: Send + Sync {
    async fn schedule(
        &self,
        key: &TriggerKey,
        trigger_at: DateTime<Utc>,
        payload: &TriggerPayload,
    ) -> EngineResult<()>;

    /// Best-effort: keys that are not registered are ignored.
    async fn cancel(&self, keys: &[TriggerKey]);
}

type TimerMap = Arc<Mutex<HashMap<TriggerKey, JoinHandle<()>>>>;

/// In-process trigger service backed by tokio timers. Fired reminders are
/// delivered on the channel returned by [`LocalTriggerService::new`].
pub struct LocalTriggerService {
    timers: TimerMap,
    fired: mpsc::UnboundedSender<FiredReminder>,
}

impl LocalTriggerService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FiredReminder>) {
        let (fired, receiver) = mpsc::unbounded_channel();
        let service = Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            fired,
        };
        (service, receiver)
    }

    pub fn pending_keys(&self) -> Vec<TriggerKey> {
        let mut keys: Vec<TriggerKey> = match self.timers.lock() {
            Ok(timers) => timers.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        keys.sort();
        keys
    }
}

#[async_trait]
impl TriggerService for LocalTriggerService {
    async fn schedule(
        &self,
        key: &TriggerKey,
        trigger_at: DateTime<Utc>,
        payload: &TriggerPayload,
    ) -> EngineResult<()> {
        let delay = (trigger_at - Utc::now()).to_std().map_err(|_| {
            EngineError::scheduling(format!("trigger time {trigger_at} for {key} is not in the future"))
        })?;

        let reminder = FiredReminder {
            key: key.clone(),
            trigger_at,
            payload: payload.clone(),
        };
        let timers = Arc::clone(&self.timers);
        let fired = self.fired.clone();
        let timer_key = key.clone();

        let mut guard = self
            .timers
            .lock()
            .map_err(|_| EngineError::scheduling("timer table poisoned"))?;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Ok(mut timers) = timers.lock() {
                timers.remove(&timer_key);
            }
            if fired.send(reminder).is_err() {
                debug!(target: "engine::reminder", key = %timer_key, "no listener for fired reminder");
            }
        });

        if let Some(previous) = guard.insert(key.clone(), handle) {
            previous.abort();
        }
        debug!(target: "engine::reminder", %key, %trigger_at, "timer armed");
        Ok(())
    }

    async fn cancel(&self, keys: &[TriggerKey]) {
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(poisoned) => {
                warn!(target: "engine::reminder", "timer table poisoned, cancelling anyway");
                poisoned.into_inner()
            }
        };
        for key in keys {
            if let Some(handle) = timers.remove(key) {
                handle.abort();
                debug!(target: "engine::reminder", %key, "timer cancelled");
            }
        }
    }
}
