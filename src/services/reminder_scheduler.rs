use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::models::event::{Event, EventId};
use crate::models::reminder::{TriggerKey, TriggerPayload};
use crate::services::trigger_service::TriggerService;

/// A reminder that should be registered for an event.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedReminder {
    pub key: TriggerKey,
    pub trigger_at: DateTime<Utc>,
    pub payload: TriggerPayload,
}

/// Trigger times for every alert of `event` that is strictly after `now`.
/// Alerts whose time has already passed are dropped.
pub fn plan_reminders(event: &Event, now: DateTime<Utc>) -> Vec<PlannedReminder> {
    event
        .alerts
        .iter()
        .filter_map(|alert| {
            let Some(trigger_at) = alert.trigger_at(event.start) else {
                warn!(
                    target: "engine::reminder",
                    event_id = %event.id(),
                    alert_id = %alert.id,
                    "alert offset out of range, not scheduling"
                );
                return None;
            };
            if trigger_at <= now {
                debug!(
                    target: "engine::reminder",
                    event_id = %event.id(),
                    alert_id = %alert.id,
                    %trigger_at,
                    "skipping reminder in the past"
                );
                return None;
            }
            Some(PlannedReminder {
                key: TriggerKey::new(event.id(), alert.id),
                trigger_at,
                payload: TriggerPayload::for_alert(event, alert),
            })
        })
        .collect()
}

enum DispatchCommand {
    Schedule(PlannedReminder),
    Cancel(Vec<TriggerKey>),
    Flush(oneshot::Sender<()>),
}

/// Keeps the external trigger service in step with event alerts.
///
/// Bookkeeping happens synchronously inside the caller's mutation; the calls
/// to the trigger service are queued to a single worker task so that cancels
/// always reach the service before the registrations that replace them.
pub struct ReminderScheduler {
    registered: Mutex<HashMap<EventId, Vec<TriggerKey>>>,
    commands: mpsc::UnboundedSender<DispatchCommand>,
    failures: Arc<AtomicUsize>,
}

impl ReminderScheduler {
    /// Spawns the dispatch worker on the current tokio runtime.
    pub fn new(service: Arc<dyn TriggerService>) -> EngineResult<Self> {
        let runtime = Handle::try_current().map_err(|err| {
            EngineError::scheduling(format!("reminder dispatch needs a tokio runtime: {err}"))
        })?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let failures = Arc::new(AtomicUsize::new(0));
        runtime.spawn(run_dispatcher(service, receiver, Arc::clone(&failures)));

        Ok(Self {
            registered: Mutex::new(HashMap::new()),
            commands,
            failures,
        })
    }

    /// Cancels everything previously registered for the event (plus the keys
    /// of its current alerts) and registers the alerts still in the future.
    /// Returns the number of reminders queued for registration.
    pub fn reschedule(&self, event: &Event, now: DateTime<Utc>) -> usize {
        let planned = plan_reminders(event, now);
        let mut registered = self.lock_registered();

        let mut stale = registered.remove(&event.id()).unwrap_or_default();
        for alert in &event.alerts {
            let key = TriggerKey::new(event.id(), alert.id);
            if !stale.contains(&key) {
                stale.push(key);
            }
        }
        if !stale.is_empty() {
            self.dispatch(DispatchCommand::Cancel(stale));
        }

        let keys: Vec<TriggerKey> = planned.iter().map(|plan| plan.key.clone()).collect();
        let count = planned.len();
        for plan in planned {
            self.dispatch(DispatchCommand::Schedule(plan));
        }
        if !keys.is_empty() {
            registered.insert(event.id(), keys);
        }

        debug!(
            target: "engine::reminder",
            event_id = %event.id(),
            queued = count,
            "reminders rescheduled"
        );
        count
    }

    /// Unconditionally cancels every key known for the event.
    pub fn cancel(&self, event: &Event) {
        let mut keys = self
            .lock_registered()
            .remove(&event.id())
            .unwrap_or_default();
        for alert in &event.alerts {
            let key = TriggerKey::new(event.id(), alert.id);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return;
        }
        info!(
            target: "engine::reminder",
            event_id = %event.id(),
            keys = keys.len(),
            "cancelling reminders"
        );
        self.dispatch(DispatchCommand::Cancel(keys));
    }

    pub fn registered_keys(&self, event_id: EventId) -> Vec<TriggerKey> {
        self.lock_registered()
            .get(&event_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn failed_registrations(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Resolves once every command queued before this call has been handled.
    pub async fn flush(&self) -> EngineResult<()> {
        let (done, wait) = oneshot::channel();
        self.commands
            .send(DispatchCommand::Flush(done))
            .map_err(|_| EngineError::scheduling("reminder dispatcher has stopped"))?;
        wait.await
            .map_err(|_| EngineError::scheduling("reminder dispatcher dropped flush"))
    }

    fn dispatch(&self, command: DispatchCommand) {
        if self.commands.send(command).is_err() {
            warn!(target: "engine::reminder", "reminder dispatcher has stopped, dropping command");
        }
    }

    fn lock_registered(&self) -> std::sync::MutexGuard<'_, HashMap<EventId, Vec<TriggerKey>>> {
        match self.registered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

async fn run_dispatcher(
    service: Arc<dyn TriggerService>,
    mut receiver: mpsc::UnboundedReceiver<DispatchCommand>,
    failures: Arc<AtomicUsize>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            DispatchCommand::Cancel(keys) => service.cancel(&keys).await,
            DispatchCommand::Schedule(plan) => {
                if let Err(err) = service
                    .schedule(&plan.key, plan.trigger_at, &plan.payload)
                    .await
                {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: "engine::reminder",
                        key = %plan.key,
                        error = %err,
                        "reminder registration failed"
                    );
                }
            }
            DispatchCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(target: "engine::reminder", "reminder dispatcher stopped");
}
