use std::path::PathBuf;
use std::sync::Arc;

use crate::observability::metrics::Metrics;
use crate::platform::memory::{DevicePositionFeed, MemoryBlobStore, MemoryOptions, MemoryPlatform};
use crate::presentation::Dashboard;

pub struct AppState {
    pub dashboard: Arc<Dashboard>,
    pub blobs: Arc<MemoryBlobStore>,
    pub device: Arc<DevicePositionFeed>,
    pub memory: MemoryPlatform,
    pub metrics: Metrics,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(options: &MemoryOptions) -> Self {
        Self::with_platform(MemoryPlatform::new(options), options.event_buffer_size)
    }

    pub fn with_platform(memory: MemoryPlatform, event_buffer_size: usize) -> Self {
        let metrics = Metrics::new();
        let dashboard = Dashboard::new(&memory.platform(), metrics.clone(), event_buffer_size);
        dashboard.start();

        Self {
            dashboard,
            blobs: memory.blobs.clone(),
            device: memory.positions.clone(),
            memory,
            metrics,
            static_dir: PathBuf::from("static"),
        }
    }

    pub fn with_static_dir(mut self, static_dir: impl Into<PathBuf>) -> Self {
        self.static_dir = static_dir.into();
        self
    }
}
