use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::event::{Event, EventId};
use crate::models::settings::DEFAULT_SWEEP_THRESHOLD;
use crate::services::schedule_utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictStrategy {
    /// Compare every unordered pair once.
    Pairwise,
    /// Sort by start and keep a min-heap of active end times.
    Sweep,
}

/// Result of a full conflict recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSet {
    members: HashSet<EventId>,
    pairs: BTreeSet<(EventId, EventId)>,
}

impl ConflictSet {
    fn record(&mut self, a: EventId, b: EventId) {
        let pair = if a <= b { (a, b) } else { (b, a) };
        self.pairs.insert(pair);
        self.members.insert(a);
        self.members.insert(b);
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = EventId> + '_ {
        self.members.iter().copied()
    }

    /// Overlapping pairs, each reported once with the smaller id first.
    pub fn pairs(&self) -> impl Iterator<Item = (EventId, EventId)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn conflicts_with(&self, id: EventId) -> Vec<EventId> {
        self.pairs
            .iter()
            .filter_map(|&(a, b)| {
                if a == id {
                    Some(b)
                } else if b == id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector {
    sweep_threshold: usize,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self {
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }
}

impl ConflictDetector {
    pub fn new(sweep_threshold: usize) -> Self {
        Self { sweep_threshold }
    }

    /// Recomputes the full conflict set. All-day events never conflict.
    pub fn recompute(&self, events: &[Event]) -> ConflictSet {
        let timed: Vec<&Event> = events.iter().filter(|event| event.is_timed()).collect();
        let strategy = if timed.len() >= self.sweep_threshold {
            ConflictStrategy::Sweep
        } else {
            ConflictStrategy::Pairwise
        };
        let conflicts = recompute_with(strategy, &timed);
        debug!(
            target: "engine::conflict",
            timed = timed.len(),
            conflicted = conflicts.len(),
            ?strategy,
            "conflicts recomputed"
        );
        conflicts
    }
}

pub fn conflicts(a: &Event, b: &Event) -> bool {
    a.id() != b.id()
        && a.is_timed()
        && b.is_timed()
        && schedule_utils::overlaps(a.start, a.end, b.start, b.end)
}

fn recompute_with(strategy: ConflictStrategy, timed: &[&Event]) -> ConflictSet {
    match strategy {
        ConflictStrategy::Pairwise => pairwise(timed),
        ConflictStrategy::Sweep => sweep(timed),
    }
}

fn pairwise(timed: &[&Event]) -> ConflictSet {
    let mut set = ConflictSet::default();
    for (index, a) in timed.iter().enumerate() {
        for b in &timed[index + 1..] {
            if conflicts(a, b) {
                set.record(a.id(), b.id());
            }
        }
    }
    set
}

fn sweep(timed: &[&Event]) -> ConflictSet {
    let mut ordered: Vec<&Event> = timed.to_vec();
    ordered.sort_by_key(|event| event.start);

    let mut set = ConflictSet::default();
    let mut active: BinaryHeap<Reverse<(DateTime<Utc>, usize)>> = BinaryHeap::new();

    for (index, event) in ordered.iter().enumerate() {
        // Anything ending at or before this start can no longer overlap.
        while let Some(Reverse((end, _))) = active.peek() {
            if *end <= event.start {
                active.pop();
            } else {
                break;
            }
        }

        for Reverse((_, other)) in active.iter() {
            let other = ordered[*other];
            if conflicts(event, other) {
                set.record(event.id(), other.id());
            }
        }

        active.push(Reverse((event.end, index)));
    }
    set
}
