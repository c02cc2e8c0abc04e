pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{EngineError, EngineResult};
pub use models::event::{
    Alert, AlertId, AlertOffset, Coordinate, Event, EventColor, EventDraft, EventId, Location,
    Priority, Recurrence,
};
pub use models::reminder::{FiredReminder, TriggerKey, TriggerPayload};
pub use models::settings::{EngineSettings, WorkingHours};
pub use models::suggestion::{Suggestion, SuggestionKind, TimeSlotRecommendation};
pub use services::calendar_engine::{CalendarEngine, ChangeKind, EngineChange};
pub use services::location_service::{LocationProvider, StaticLocationProvider};
pub use services::settings_service::{SettingsService, SettingsUpdateInput};
pub use services::trigger_service::{LocalTriggerService, TriggerService};
pub use utils::clock::{Clock, FixedClock, SystemClock};
