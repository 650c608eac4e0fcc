mod autosave;

pub use autosave::{AutoSaveEvent, AutoSaveRuntime, AutoSaveStatus};
