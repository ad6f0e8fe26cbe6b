use std::path::Path;
use std::sync::{Arc, RwLock};

use events::EventBus;
use orchestrator::ProjectStore;

use crate::routes::sse::{
    spawn_buffer_writer, EventBuffer, SharedEventBuffer, DEFAULT_EVENT_BUFFER_SIZE,
};
use crate::run_manager::RunManager;

#[derive(Clone)]
pub struct AppState {
    pub store: ProjectStore,
    pub event_bus: EventBus,
    pub event_buffer: SharedEventBuffer,
    pub runs: RunManager,
}

impl AppState {
    /// Build the shared state, spawning the task that mirrors the bus
    /// into the SSE replay buffer. Must run inside a tokio runtime.
    pub fn new(workspace: &Path) -> Self {
        let event_bus = EventBus::new();
        let event_buffer = Arc::new(RwLock::new(EventBuffer::new(DEFAULT_EVENT_BUFFER_SIZE)));
        spawn_buffer_writer(&event_bus, Arc::clone(&event_buffer));
        let store = ProjectStore::new(workspace);
        let runs = RunManager::new(store.clone(), event_bus.clone());

        Self {
            store,
            event_bus,
            event_buffer,
            runs,
        }
    }
}
