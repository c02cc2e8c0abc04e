pub mod event;
pub mod reminder;
pub mod settings;
pub mod suggestion;
