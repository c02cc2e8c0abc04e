// End-to-end behaviour of the engine pipeline: conflicts, queries,
// suggestions and change notifications.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use agenda_engine::{
    CalendarEngine, ChangeKind, Coordinate, EngineError, EngineResult, Event, EventDraft, EventId, Location,
    StaticLocationProvider, SuggestionKind,
};
use chrono::Duration;
use common::{date, setup_engine, utc, RecordingTriggerService};
use futures::future::join_all;

#[tokio::test]
async fn overlapping_events_flagged_and_disjoint_event_clear() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = &ctx.engine;

    let a = engine.create_event(
        EventDraft::new("Design review", utc(2026, 10, 19, 9, 0)).ending_at(utc(2026, 10, 19, 10, 0)),
    )?;
    let b = engine.create_event(
        EventDraft::new("Vendor call", utc(2026, 10, 19, 9, 30)).ending_at(utc(2026, 10, 19, 10, 30)),
    )?;
    let c = engine.create_event(
        EventDraft::new("Lunch", utc(2026, 10, 19, 11, 0)).ending_at(utc(2026, 10, 19, 12, 0)),
    )?;

    assert!(engine.get_event(a)?.is_conflicted());
    assert!(engine.get_event(b)?.is_conflicted());
    assert!(!engine.get_event(c)?.is_conflicted());

    let conflicted: Vec<EventId> = engine.conflicting_events()?.iter().map(Event::id).collect();
    assert_eq!(conflicted, vec![a, b]);
    assert_eq!(engine.conflict_pairs()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn moving_an_event_clears_both_flags() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = &ctx.engine;

    let a = engine.create_event(
        EventDraft::new("Design review", utc(2026, 10, 19, 9, 0)).ending_at(utc(2026, 10, 19, 10, 0)),
    )?;
    let b = engine.create_event(
        EventDraft::new("Vendor call", utc(2026, 10, 19, 9, 30)).ending_at(utc(2026, 10, 19, 10, 30)),
    )?;

    let mut moved = engine.get_event(b)?;
    moved.start = utc(2026, 10, 19, 10, 0);
    moved.end = utc(2026, 10, 19, 11, 0);
    let moved = engine.update_event(moved)?;

    assert!(!moved.is_conflicted());
    assert!(!engine.get_event(a)?.is_conflicted());
    assert!(engine
        .suggestions()?
        .iter()
        .all(|s| s.kind != SuggestionKind::ConflictResolution));
    Ok(())
}

#[tokio::test]
async fn deleting_one_side_of_a_conflict_clears_the_other() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = &ctx.engine;

    let a = engine.create_event(EventDraft::new("A", utc(2026, 10, 19, 9, 0)))?;
    let b = engine.create_event(EventDraft::new("B", utc(2026, 10, 19, 9, 15)))?;
    assert!(engine.get_event(a)?.is_conflicted());

    engine.delete_event(b)?;
    assert!(!engine.get_event(a)?.is_conflicted());
    assert!(engine.conflicting_events()?.is_empty());
    assert!(engine.get_event(b).unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn all_day_event_never_conflicts() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = &ctx.engine;

    let holiday = engine.create_event(EventDraft::new("Holiday", utc(2026, 10, 19, 0, 0)).all_day())?;
    let meeting = engine.create_event(EventDraft::new("Meeting", utc(2026, 10, 19, 9, 0)))?;

    assert!(!engine.get_event(holiday)?.is_conflicted());
    assert!(!engine.get_event(meeting)?.is_conflicted());
    Ok(())
}

#[tokio::test]
async fn time_relative_queries_follow_the_clock() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 10, 30));
    let engine = &ctx.engine;

    let running = engine.create_event(
        EventDraft::new("Workshop", utc(2026, 10, 19, 10, 0)).ending_at(utc(2026, 10, 19, 12, 0)),
    )?;
    let later_today = engine.create_event(EventDraft::new("Gym", utc(2026, 10, 19, 18, 0)))?;
    let next_week = engine.create_event(EventDraft::new("Trip", utc(2026, 10, 25, 8, 0)))?;
    engine.create_event(EventDraft::new("Too far", utc(2026, 10, 27, 8, 0)))?;

    let today: Vec<EventId> = engine.todays_events()?.iter().map(Event::id).collect();
    assert_eq!(today, vec![running, later_today]);

    let current: Vec<EventId> = engine.current_events()?.iter().map(Event::id).collect();
    assert_eq!(current, vec![running]);

    let upcoming: Vec<EventId> = engine.upcoming_events()?.iter().map(Event::id).collect();
    assert_eq!(upcoming, vec![later_today, next_week]);

    ctx.clock.advance(Duration::hours(2));
    assert!(engine.current_events()?.is_empty());

    let hour: Vec<EventId> = engine
        .events_in_hour(date(2026, 10, 19), 11)?
        .iter()
        .map(Event::id)
        .collect();
    assert_eq!(hour, vec![running]);
    Ok(())
}

#[tokio::test]
async fn find_slot_skips_first_meeting() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = &ctx.engine;

    let empty = engine
        .find_slot(Duration::hours(2), date(2026, 10, 19))?
        .expect("empty day has room");
    assert_eq!(empty.start, utc(2026, 10, 19, 9, 0));
    assert_eq!(empty.end, utc(2026, 10, 19, 11, 0));
    assert_eq!(empty.confidence, 0.9);

    engine.create_event(
        EventDraft::new("Standup", utc(2026, 10, 19, 9, 0)).ending_at(utc(2026, 10, 19, 10, 0)),
    )?;
    let slot = engine
        .find_slot(Duration::hours(2), date(2026, 10, 19))?
        .expect("slot after standup");
    assert_eq!(slot.start, utc(2026, 10, 19, 10, 0));
    assert_eq!(slot.end, utc(2026, 10, 19, 12, 0));
    assert_eq!(slot.confidence, 0.9);
    assert!(slot.conflicting_events.is_empty());
    Ok(())
}

#[tokio::test]
async fn suggestions_regenerate_after_each_mutation() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = &ctx.engine;

    let kinds = |engine: &CalendarEngine| -> EngineResult<Vec<SuggestionKind>> {
        Ok(engine.suggestions()?.iter().map(|s| s.kind).collect())
    };
    assert_eq!(
        kinds(engine)?,
        vec![SuggestionKind::FindTime, SuggestionKind::SmartSchedule]
    );

    for hour in [9, 12, 15] {
        engine.create_event(EventDraft::new("Tomorrow", utc(2026, 10, 20, hour, 0)))?;
    }
    assert_eq!(kinds(engine)?, vec![SuggestionKind::FindTime]);

    engine.create_event(
        EventDraft::new("Block", utc(2026, 10, 19, 9, 0)).ending_at(utc(2026, 10, 19, 16, 0)),
    )?;
    engine.create_event(EventDraft::new("Overlap", utc(2026, 10, 19, 15, 30)))?;
    let suggestions = engine.suggestions()?;
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].kind, SuggestionKind::ConflictResolution);
    assert_eq!(suggestions[0].related_events.len(), 2);
    Ok(())
}

#[tokio::test]
async fn subscribers_see_each_mutation() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = &ctx.engine;
    let mut changes = engine.subscribe();

    let a = engine.create_event(EventDraft::new("A", utc(2026, 10, 19, 9, 0)))?;
    let b = engine.create_event(EventDraft::new("B", utc(2026, 10, 19, 9, 30)))?;
    let edited = engine.get_event(a)?;
    engine.update_event(edited)?;
    engine.delete_event(b)?;
    engine.delete_event(b)?;

    let received: Vec<(ChangeKind, EventId, usize)> = std::iter::from_fn(|| changes.try_recv().ok())
        .map(|change| (change.kind, change.event_id, change.conflicted_count))
        .collect();
    assert_eq!(
        received,
        vec![
            (ChangeKind::Created, a, 0),
            (ChangeKind::Created, b, 2),
            (ChangeKind::Updated, a, 2),
            (ChangeKind::Deleted, b, 0),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn current_location_is_attached_when_available() -> EngineResult<()> {
    let triggers = Arc::new(RecordingTriggerService::default());
    let provider = Arc::new(StaticLocationProvider::new(Some(Coordinate {
        latitude: 52.52,
        longitude: 13.405,
    })));
    let engine = CalendarEngine::new(Arc::new(Default::default()), triggers)?
        .with_location_provider(provider.clone());

    let tagged = engine.create_event_at_current_location(EventDraft::new(
        "Site visit",
        utc(2026, 10, 19, 9, 0),
    ))?;
    let location = engine.get_event(tagged)?.location.expect("location");
    assert_eq!(location.name, "Current Location");
    assert_eq!(location.coordinate.map(|c| c.latitude), Some(52.52));

    provider.set(None);
    let named = engine.create_event_at_current_location(
        EventDraft::new("Dinner", utc(2026, 10, 19, 19, 0)).with_location(Location::named("Bistro")),
    )?;
    let location = engine.get_event(named)?.location.expect("location");
    assert_eq!(location.name, "Bistro");
    assert!(location.coordinate.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_stale_conflict_flags() -> EngineResult<()> {
    let ctx = setup_engine(utc(2026, 10, 19, 7, 0));
    let engine = Arc::new(ctx.engine);

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for i in 0..60i64 {
                let start = utc(2026, 10, 19, 8, 0) + Duration::minutes(i * 20);
                engine.create_event(
                    EventDraft::new(format!("e{i}"), start).ending_at(start + Duration::minutes(45)),
                )?;
                tokio::task::yield_now().await;
            }
            Ok::<(), EngineError>(())
        })
    };

    let readers = (0..4).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for _ in 0..50 {
                let snapshot = engine.all_events()?;
                for event in &snapshot {
                    let overlapping = snapshot.iter().any(|other| {
                        other.id() != event.id() && other.start < event.end && other.end > event.start
                    });
                    assert_eq!(event.is_conflicted(), overlapping);
                }
                tokio::task::yield_now().await;
            }
            Ok::<(), EngineError>(())
        })
    });

    writer.await.expect("writer task")?;
    for reader in join_all(readers).await {
        reader.expect("reader task")?;
    }
    Ok(())
}
