//! Mock engine loader for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{EngineAssets, EngineError, EngineHandle, EngineLoader};

use super::MockEngine;

/// A recorded load attempt.
#[derive(Debug, Clone)]
pub struct RecordedLoad {
    /// Mirror that served the assets.
    pub mirror: String,
    /// Size of the code module.
    pub module_len: usize,
    /// Size of the binary payload.
    pub payload_len: usize,
}

/// Mock implementation of the EngineLoader trait.
///
/// Every successful load returns a clone of the same [`MockEngine`], so
/// tests can configure and inspect the engine the pipeline ends up using.
#[derive(Debug, Clone)]
pub struct MockEngineLoader {
    engine: MockEngine,
    loads: Arc<RwLock<Vec<RecordedLoad>>>,
    load_calls: Arc<AtomicUsize>,
    failing_mirrors: Arc<RwLock<Vec<String>>>,
    load_delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockEngineLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngineLoader {
    /// Create a loader around a fresh mock engine.
    pub fn new() -> Self {
        Self::with_engine(MockEngine::new())
    }

    /// Create a loader around an existing mock engine.
    pub fn with_engine(engine: MockEngine) -> Self {
        Self {
            engine,
            loads: Arc::new(RwLock::new(Vec::new())),
            load_calls: Arc::new(AtomicUsize::new(0)),
            failing_mirrors: Arc::new(RwLock::new(Vec::new())),
            load_delay: Arc::new(RwLock::new(None)),
        }
    }

    /// The engine handed out by successful loads.
    pub fn engine(&self) -> &MockEngine {
        &self.engine
    }

    /// Make initialization fail for assets from `mirror`.
    pub async fn fail_for_mirror(&self, mirror: impl Into<String>) {
        self.failing_mirrors.write().await.push(mirror.into());
    }

    /// Delay every initialization.
    pub async fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.write().await = Some(delay);
    }

    /// Number of times `load` was called.
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Successful loads.
    pub async fn recorded_loads(&self) -> Vec<RecordedLoad> {
        self.loads.read().await.clone()
    }
}

#[async_trait]
impl EngineLoader for MockEngineLoader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self, assets: EngineAssets) -> Result<EngineHandle, EngineError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.load_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_mirrors.read().await.contains(&assets.mirror) {
            return Err(EngineError::init_failed(format!(
                "payload from {} did not start",
                assets.mirror
            )));
        }

        self.loads.write().await.push(RecordedLoad {
            mirror: assets.mirror.clone(),
            module_len: assets.module.len(),
            payload_len: assets.payload.len(),
        });

        Ok(Arc::new(self.engine.clone()))
    }
}
