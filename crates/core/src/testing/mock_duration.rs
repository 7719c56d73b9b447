//! Mock duration source for testing.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::probe::{DurationSource, ProbeError};

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Duration(f64),
    Fail,
    Never,
}

/// Mock implementation of the DurationSource trait.
#[derive(Debug, Clone)]
pub struct MockDurationSource {
    behavior: Behavior,
    delay: Option<Duration>,
}

impl MockDurationSource {
    /// Resolves immediately with `secs`.
    pub fn with_duration(secs: f64) -> Self {
        Self {
            behavior: Behavior::Duration(secs),
            delay: None,
        }
    }

    /// Fails immediately, like a file the metadata reader cannot open.
    pub fn failing() -> Self {
        Self {
            behavior: Behavior::Fail,
            delay: None,
        }
    }

    /// Never resolves.
    pub fn never_resolves() -> Self {
        Self {
            behavior: Behavior::Never,
            delay: None,
        }
    }

    /// Waits `delay` before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl DurationSource for MockDurationSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn duration(&self, _path: &Path) -> Result<f64, ProbeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.behavior {
            Behavior::Duration(secs) => Ok(secs),
            Behavior::Fail => Err(ProbeError::unavailable("mock metadata error")),
            Behavior::Never => std::future::pending().await,
        }
    }
}
