//! Edit notifications for debris and sound collaborators

use std::sync::{Arc, Mutex};

use crate::core::types::Vec3;

/// Receives removal events produced while editing and pruning.
pub trait EditEventSink: Send {
    /// A brush carved material away at `pos`.
    fn material_removed(&mut self, pos: Vec3);

    /// Pruning destroyed a disconnected voxel at `pos`.
    fn fragment(&mut self, pos: Vec3);

    /// One prune pass destroyed `count` voxels.
    fn impact(&mut self, count: usize);
}

/// Sink that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEvents;

impl EditEventSink for NullEvents {
    fn material_removed(&mut self, _pos: Vec3) {}
    fn fragment(&mut self, _pos: Vec3) {}
    fn impact(&mut self, _count: usize) {}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditEvent {
    MaterialRemoved(Vec3),
    Fragment(Vec3),
    Impact(usize),
}

/// Recording sink. Clones share one log so a caller can keep a handle after
/// giving the sink to the terrain.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<EditEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn record(&self, event: EditEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl EditEventSink for EventLog {
    fn material_removed(&mut self, pos: Vec3) {
        self.record(EditEvent::MaterialRemoved(pos));
    }

    fn fragment(&mut self, pos: Vec3) {
        self.record(EditEvent::Fragment(pos));
    }

    fn impact(&mut self, count: usize) {
        self.record(EditEvent::Impact(count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_shared_between_clones() {
        let log = EventLog::new();
        let mut sink: Box<dyn EditEventSink> = Box::new(log.clone());
        sink.fragment(Vec3::X);
        sink.impact(3);
        assert_eq!(log.events(), vec![EditEvent::Fragment(Vec3::X), EditEvent::Impact(3)]);
        log.clear();
        assert!(log.events().is_empty());
    }
}
