use std::sync::RwLock;

use crate::models::event::Coordinate;

/// Optional source of the device position. Returns `None` when access is
/// unauthorised or no fix is available.
pub trait LocationProvider: Send + Sync {
    fn current_coordinate(&self) -> Option<Coordinate>;
}

/// Provider that reports whatever coordinate it was last given.
#[derive(Debug, Default)]
pub struct StaticLocationProvider {
    coordinate: RwLock<Option<Coordinate>>,
}

impl StaticLocationProvider {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self {
            coordinate: RwLock::new(coordinate),
        }
    }

    pub fn set(&self, coordinate: Option<Coordinate>) {
        if let Ok(mut guard) = self.coordinate.write() {
            *guard = coordinate;
        }
    }
}

impl LocationProvider for StaticLocationProvider {
    fn current_coordinate(&self) -> Option<Coordinate> {
        self.coordinate.read().ok().and_then(|guard| *guard)
    }
}
