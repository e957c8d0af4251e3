//! Sculpting: brushes, undo, brush history and the deferred update pass

pub mod brush;
pub mod events;
pub mod history;
pub mod engine;

pub use brush::{Brush, BrushShape};
pub use events::{EditEvent, EditEventSink, EventLog, NullEvents};
pub use history::BrushHistory;
pub use engine::{EditEngine, EditTarget, UpdateSummary};
