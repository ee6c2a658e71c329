use crate::model::SourceId;

/// Per-source progress sink driven by the collector.
pub trait Progress: Send {
    fn set_status(&mut self, status: &str);
    fn set_max(&mut self, max: usize);
    fn set_progress(&mut self, value: usize);
}

/// Reports progress as `tracing` events.
pub struct LogProgress {
    source: SourceId,
    max: usize,
}

impl LogProgress {
    pub fn new(source: SourceId) -> Self {
        Self { source, max: 0 }
    }
}

impl Progress for LogProgress {
    fn set_status(&mut self, status: &str) {
        tracing::info!(source = %self.source, "{}", status);
    }

    fn set_max(&mut self, max: usize) {
        self.max = max;
        tracing::debug!(source = %self.source, chunks = max, "Planned collection");
    }

    fn set_progress(&mut self, value: usize) {
        tracing::info!(source = %self.source, "Committed chunk {}/{}", value, self.max);
    }
}
