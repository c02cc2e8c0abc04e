pub mod availability_finder;
pub mod calendar_engine;
pub mod conflict_detector;
pub mod event_store;
pub mod location_service;
pub mod reminder_scheduler;
pub mod schedule_utils;
pub mod settings_service;
pub mod suggestion_engine;
pub mod trigger_service;
