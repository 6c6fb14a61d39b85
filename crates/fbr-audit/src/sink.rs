use anyhow::Result;
use async_trait::async_trait;
use fbr_schemas::DistributionLogEntry;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Append-only destination for distribution log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn append(&self, entry: &DistributionLogEntry) -> Result<()>;
}

/// Keeps entries in memory. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    entries: Arc<Mutex<Vec<DistributionLogEntry>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<DistributionLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn append(&self, entry: &DistributionLogEntry) -> Result<()> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }
}

/// Writes every entry to each inner sink in order (e.g. JSONL file and
/// database). All sinks are attempted; the first failure is returned.
#[derive(Clone, Default)]
pub struct FanoutLogSink {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutLogSink {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl LogSink for FanoutLogSink {
    async fn append(&self, entry: &DistributionLogEntry) -> Result<()> {
        let mut first_err = None;
        for (i, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = sink.append(entry).await {
                if first_err.is_none() {
                    first_err = Some(e.context(format!("log sink #{i}")));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
