#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use agenda_engine::{
    CalendarEngine, EngineError, EngineResult, FixedClock, SettingsService, TriggerKey,
    TriggerPayload, TriggerService,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerCall {
    Schedule {
        key: String,
        trigger_at: DateTime<Utc>,
        subtitle: String,
    },
    Cancel(Vec<String>),
}

/// Trigger service double that records every call and tracks the keys that
/// would still be armed.
#[derive(Default)]
pub struct RecordingTriggerService {
    calls: Mutex<Vec<TriggerCall>>,
    active: Mutex<BTreeMap<String, DateTime<Utc>>>,
    failing_titles: Mutex<HashSet<String>>,
}

impl RecordingTriggerService {
    pub fn fail_for_title(&self, title: &str) {
        self.failing_titles.lock().unwrap().insert(title.to_string());
    }

    pub fn calls(&self) -> Vec<TriggerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancel_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TriggerCall::Cancel(keys) => Some(keys),
                TriggerCall::Schedule { .. } => None,
            })
            .collect()
    }

    pub fn schedule_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TriggerCall::Schedule { key, .. } => Some(key),
                TriggerCall::Cancel(_) => None,
            })
            .collect()
    }

    pub fn active_keys(&self) -> Vec<String> {
        self.active.lock().unwrap().keys().cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl TriggerService for RecordingTriggerService {
    async fn schedule(
        &self,
        key: &TriggerKey,
        trigger_at: DateTime<Utc>,
        payload: &TriggerPayload,
    ) -> EngineResult<()> {
        self.calls.lock().unwrap().push(TriggerCall::Schedule {
            key: key.to_string(),
            trigger_at,
            subtitle: payload.subtitle.clone(),
        });
        if self.failing_titles.lock().unwrap().contains(&payload.title) {
            return Err(EngineError::scheduling("notification permission denied"));
        }
        self.active
            .lock()
            .unwrap()
            .insert(key.to_string(), trigger_at);
        Ok(())
    }

    async fn cancel(&self, keys: &[TriggerKey]) {
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        {
            let mut active = self.active.lock().unwrap();
            for key in &keys {
                active.remove(key);
            }
        }
        self.calls.lock().unwrap().push(TriggerCall::Cancel(keys));
    }
}

pub struct TestEngine {
    pub engine: CalendarEngine,
    pub triggers: Arc<RecordingTriggerService>,
    pub clock: Arc<FixedClock>,
    pub settings: Arc<SettingsService>,
}

pub fn setup_engine(now: DateTime<Utc>) -> TestEngine {
    setup_engine_with(now, SettingsService::default())
}

pub fn setup_engine_with(now: DateTime<Utc>, settings: SettingsService) -> TestEngine {
    let triggers = Arc::new(RecordingTriggerService::default());
    let clock = Arc::new(FixedClock::new(now));
    let settings = Arc::new(settings);
    let engine = CalendarEngine::new(Arc::clone(&settings), triggers.clone())
        .expect("engine")
        .with_clock(clock.clone())
        .expect("clock");
    TestEngine {
        engine,
        triggers,
        clock,
        settings,
    }
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid datetime")
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}
