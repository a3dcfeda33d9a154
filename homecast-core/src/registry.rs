//! Registry of lazily constructed playback adapters.
//!
//! Adapter handles (a casting session, an authenticated service client) are
//! expensive to build and shared by every request. Each registered adapter is
//! built on first use, exactly once even under concurrent first access; a failed
//! build is not cached, so the next request retries it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::adapter::{AdapterError, PlaybackAdapter};
use crate::errors::ConfigError;

/// Builds one adapter handle.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    /// Construct the adapter.
    ///
    /// # Errors
    /// - `AdapterError::Unavailable` - Credentials missing or device unreachable
    async fn build(&self) -> Result<Arc<dyn PlaybackAdapter>, AdapterError>;
}

/// Factory handing out an already constructed adapter.
#[derive(Debug, Clone)]
pub struct ReadyAdapter(pub Arc<dyn PlaybackAdapter>);

#[async_trait]
impl AdapterFactory for ReadyAdapter {
    async fn build(&self) -> Result<Arc<dyn PlaybackAdapter>, AdapterError> {
        Ok(Arc::clone(&self.0))
    }
}

struct AdapterSlot {
    name: String,
    factory: Arc<dyn AdapterFactory>,
    handle: OnceCell<Arc<dyn PlaybackAdapter>>,
}

impl std::fmt::Debug for AdapterSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSlot")
            .field("name", &self.name)
            .field("initialized", &self.handle.initialized())
            .finish()
    }
}

/// Named, lazily constructed adapters in registration order.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    slots: Vec<AdapterSlot>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    ///
    /// # Errors
    /// - `ConfigError::DuplicateBackend` - `name` is already registered
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn AdapterFactory>,
    ) -> Result<(), ConfigError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(ConfigError::DuplicateBackend { name });
        }

        self.slots.push(AdapterSlot {
            name,
            factory,
            handle: OnceCell::new(),
        });
        Ok(())
    }

    /// Registers an already constructed adapter under `name`.
    ///
    /// # Errors
    /// - `ConfigError::DuplicateBackend` - `name` is already registered
    pub fn register_ready(
        &mut self,
        name: impl Into<String>,
        adapter: Arc<dyn PlaybackAdapter>,
    ) -> Result<(), ConfigError> {
        self.register(name, Arc::new(ReadyAdapter(adapter)))
    }

    /// Whether an adapter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.iter().any(|slot| slot.name == name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no adapters are registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether the adapter under `name` has been constructed.
    pub fn is_initialized(&self, name: &str) -> bool {
        self.slot(name)
            .is_some_and(|slot| slot.handle.initialized())
    }

    /// Returns the adapter for `name`, constructing it on first use.
    ///
    /// Concurrent first callers share a single construction.
    ///
    /// # Errors
    /// - `AdapterError::Unavailable` - `name` is not registered, or construction failed
    pub async fn get(&self, name: &str) -> Result<Arc<dyn PlaybackAdapter>, AdapterError> {
        let slot = self.slot(name).ok_or_else(|| AdapterError::Unavailable {
            reason: format!("no backend registered as '{name}'"),
        })?;

        let handle = slot
            .handle
            .get_or_try_init(|| async {
                debug!(adapter = %slot.name, "Constructing adapter");
                slot.factory.build().await.inspect_err(|e| {
                    warn!(adapter = %slot.name, error = %e, "Adapter construction failed");
                })
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    fn slot(&self, name: &str) -> Option<&AdapterSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }
}
