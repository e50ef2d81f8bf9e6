//! Idempotent index provisioning.

use ev_core::{DistanceMetric, IndexDescriptor, IndexError, IndexInfo, StoreError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::backend::{CreateOutcome, VectorBackend};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// How an existing index differs from the requested descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorMismatch {
    pub expected_dimension: usize,
    pub actual_dimension: usize,
    pub expected_metric: DistanceMetric,
    pub actual_metric: DistanceMetric,
}

impl DescriptorMismatch {
    fn between(descriptor: &IndexDescriptor, info: &IndexInfo) -> Option<Self> {
        if descriptor.dimension == info.dimension && descriptor.metric == info.metric {
            return None;
        }
        Some(Self {
            expected_dimension: descriptor.dimension,
            actual_dimension: info.dimension,
            expected_metric: descriptor.metric,
            actual_metric: info.metric,
        })
    }

    pub fn dimension_differs(&self) -> bool {
        self.expected_dimension != self.actual_dimension
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnsureOutcome {
    /// This call created the index and saw it become ready.
    Created(IndexInfo),
    /// The index was already there.
    Existing {
        info: IndexInfo,
        mismatch: Option<DescriptorMismatch>,
    },
}

impl EnsureOutcome {
    pub fn info(&self) -> &IndexInfo {
        match self {
            Self::Created(info) | Self::Existing { info, .. } => info,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Makes sure an index exists before anything writes to it.
///
/// Calls through one manager are serialised, so concurrent pipeline runs
/// sharing it issue at most one create. Separate processes rely on the
/// store answering `AlreadyExists`.
pub struct IndexManager {
    backend: Arc<dyn VectorBackend>,
    poll_interval: Duration,
    ready_timeout: Duration,
    guard: Mutex<()>,
}

impl IndexManager {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub async fn list_indexes(&self) -> Result<Vec<IndexInfo>, IndexError> {
        Ok(self.backend.list_indexes().await?)
    }

    pub async fn ensure_index(&self, descriptor: &IndexDescriptor) -> Result<EnsureOutcome, IndexError> {
        descriptor.validate()?;
        let _guard = self.guard.lock().await;

        let indexes = self.backend.list_indexes().await?;
        if let Some(info) = indexes.into_iter().find(|i| i.name == descriptor.name) {
            let info = self.ready(info).await?;
            return Ok(existing(descriptor, info));
        }

        tracing::info!(
            index = %descriptor.name,
            dimension = descriptor.dimension,
            metric = %descriptor.metric,
            backend = self.backend.name(),
            "building new index"
        );
        match self.backend.create_index(descriptor).await {
            Ok(CreateOutcome::Created) => {}
            Ok(CreateOutcome::AlreadyExists) => {
                tracing::info!(index = %descriptor.name, "index created concurrently elsewhere");
                let info = self.backend.describe_index(&descriptor.name).await?;
                let info = self.ready(info).await?;
                return Ok(existing(descriptor, info));
            }
            Err(StoreError::Unavailable(msg)) => return Err(IndexError::Unavailable(msg)),
            Err(err) => return Err(IndexError::CreationFailed(err.to_string())),
        }

        let info = self.wait_until_ready(&descriptor.name).await?;
        tracing::info!(index = %descriptor.name, "index created");
        Ok(EnsureOutcome::Created(info))
    }

    /// An index that exists but is still initializing is waited on like a new one.
    async fn ready(&self, info: IndexInfo) -> Result<IndexInfo, IndexError> {
        if info.ready {
            return Ok(info);
        }
        tracing::info!(index = %info.name, "waiting for existing index to become ready");
        self.wait_until_ready(&info.name).await
    }

    async fn wait_until_ready(&self, name: &str) -> Result<IndexInfo, IndexError> {
        let started = Instant::now();
        loop {
            match self.backend.describe_index(name).await {
                Ok(info) if info.ready => return Ok(info),
                Ok(_) => tracing::debug!(index = %name, "index not ready yet"),
                // Creation may not be visible immediately.
                Err(StoreError::IndexNotFound(_)) | Err(StoreError::Unavailable(_)) => {
                    tracing::debug!(index = %name, "index not visible yet")
                }
                Err(err) => return Err(IndexError::CreationFailed(err.to_string())),
            }

            let waited = started.elapsed();
            if waited >= self.ready_timeout {
                return Err(IndexError::Timeout { name: name.to_string(), waited });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn existing(descriptor: &IndexDescriptor, info: IndexInfo) -> EnsureOutcome {
    let mismatch = DescriptorMismatch::between(descriptor, &info);
    if let Some(m) = &mismatch {
        tracing::warn!(
            index = %descriptor.name,
            expected_dimension = m.expected_dimension,
            actual_dimension = m.actual_dimension,
            expected_metric = %m.expected_metric,
            actual_metric = %m.actual_metric,
            "existing index does not match requested descriptor"
        );
    }
    EnsureOutcome::Existing { info, mismatch }
}
