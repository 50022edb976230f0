//! Engine registration and discovery.
//!
//! The registry maps engine names to their capability descriptors and
//! constructors. Availability probes run at most once per entry per process;
//! the cached result is the only process-wide mutable state in the crate.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::EngineDescriptor;
use crate::device::Device;
use crate::interface::{TtsEngine, TtsError};

// ── Construction Context ───────────────────────────────

/// Everything a registered constructor gets to build an engine instance.
/// The reference path has already been checked for existence.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub reference_wav: PathBuf,
    pub device: Device,
    /// Engine-specific constructor settings (endpoints, model directories).
    pub options: HashMap<String, serde_json::Value>,
}

/// Constructor for one engine. Must be cheap: no model weights, no network.
pub type BuildFn =
    Arc<dyn Fn(&EngineContext) -> Result<Box<dyn TtsEngine>, TtsError> + Send + Sync>;

// ── Registry Entries ────────────────────────────────────

pub(crate) struct EngineEntry {
    descriptor: Arc<EngineDescriptor>,
    build: BuildFn,
    probed: OnceLock<bool>,
}

impl EngineEntry {
    pub(crate) fn descriptor(&self) -> &Arc<EngineDescriptor> {
        &self.descriptor
    }

    /// Cached availability. The first caller runs the probe; concurrent
    /// callers block on that one run instead of racing their own.
    pub(crate) fn available(&self) -> bool {
        *self
            .probed
            .get_or_init(|| self.descriptor.run_probe())
    }

    pub(crate) fn build(&self, ctx: &EngineContext) -> Result<Box<dyn TtsEngine>, TtsError> {
        (self.build)(ctx)
    }
}

// ── Listing ─────────────────────────────────────────────

/// One row of the registry listing, ready for a UI or CLI table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineListing {
    pub name: String,
    pub display_name: String,
    pub available: bool,
}

// ── Registry ────────────────────────────────────────────

/// Name-keyed engine registry. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    entries: Arc<RwLock<HashMap<String, Arc<EngineEntry>>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, populated with the built-in engines on
    /// first access.
    pub fn global() -> &'static EngineRegistry {
        static GLOBAL: OnceLock<EngineRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let registry = EngineRegistry::new();
            crate::engines::register_builtins(&registry);
            registry
        })
    }

    /// Register an engine. A duplicate name silently replaces the previous
    /// entry (last write wins) and resets its probe cache.
    pub fn register(
        &self,
        descriptor: EngineDescriptor,
        build: impl Fn(&EngineContext) -> Result<Box<dyn TtsEngine>, TtsError> + Send + Sync + 'static,
    ) {
        let name = descriptor.name().to_string();
        let entry = Arc::new(EngineEntry {
            descriptor: Arc::new(descriptor),
            build: Arc::new(build),
            probed: OnceLock::new(),
        });
        if self.write_entries().insert(name.clone(), entry).is_some() {
            debug!(engine = %name, "replaced existing engine registration");
        }
    }

    /// Remove an engine. Used primarily by test harnesses.
    pub fn unregister(&self, name: &str) -> bool {
        self.write_entries().remove(name).is_some()
    }

    pub fn descriptor(&self, name: &str) -> Result<Arc<EngineDescriptor>, TtsError> {
        Ok(self.entry(name)?.descriptor().clone())
    }

    /// Cached availability of one engine.
    pub fn is_available(&self, name: &str) -> Result<bool, TtsError> {
        let entry = self.entry(name)?;
        Ok(entry.available())
    }

    /// All registered engines with availability, sorted by name. Probes run
    /// (and get cached) for entries not yet checked.
    pub fn list(&self) -> Vec<EngineListing> {
        let mut entries: Vec<(String, Arc<EngineEntry>)> = self
            .read_entries()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        // Probe outside the lock; probes may take their full timeout.
        entries
            .into_iter()
            .map(|(name, entry)| EngineListing {
                name,
                display_name: entry.descriptor().display_name().to_string(),
                available: entry.available(),
            })
            .collect()
    }

    /// Registered names, sorted, without probing anything.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_entries().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every cached probe result so the next query re-checks.
    pub fn invalidate_probes(&self) {
        let mut entries = self.write_entries();
        for entry in entries.values_mut() {
            *entry = Arc::new(EngineEntry {
                descriptor: entry.descriptor.clone(),
                build: entry.build.clone(),
                probed: OnceLock::new(),
            });
        }
    }

    pub(crate) fn entry(&self, name: &str) -> Result<Arc<EngineEntry>, TtsError> {
        if let Some(entry) = self.read_entries().get(name) {
            return Ok(entry.clone());
        }
        // Guard dropped above; names() takes the read lock again.
        Err(TtsError::UnknownEngine {
            name: name.to_string(),
            known: self.names(),
        })
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<EngineEntry>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<EngineEntry>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
