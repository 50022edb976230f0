//! Engine construction and lifecycle handles.
//!
//! The factory turns a registered name plus a reference recording into an
//! [`EngineHandle`]. Handles start cold: model weights are only touched when
//! the first generate call drives the load state machine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::descriptor::EngineDescriptor;
use crate::device::Device;
use crate::interface::{RawAudio, SpeechRequest, SynthesisResult, TtsEngine, TtsError};
use crate::params::ResolvedParams;
use crate::pipeline;
use crate::registry::{EngineContext, EngineRegistry};

// ── Factory ─────────────────────────────────────────────

pub struct EngineFactory {
    registry: EngineRegistry,
}

impl EngineFactory {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    /// Factory over the process-wide registry.
    pub fn with_global() -> Self {
        Self::new(EngineRegistry::global().clone())
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Build a cold engine handle.
    ///
    /// Checks run in a fixed order: name, then reference file, then the
    /// cached dependency probe, then device/options. A caller with a bad
    /// reference path hears about that even when the engine's dependency is
    /// also missing.
    pub fn create(
        &self,
        name: &str,
        reference_wav: impl AsRef<Path>,
        device: Option<&str>,
        options: HashMap<String, serde_json::Value>,
    ) -> Result<EngineHandle, TtsError> {
        let entry = self.registry.entry(name)?;

        let reference = reference_wav.as_ref();
        if !reference.is_file() {
            return Err(TtsError::ReferenceNotFound {
                path: reference.to_path_buf(),
            });
        }

        if !entry.available() {
            let hint = entry
                .descriptor()
                .hint()
                .unwrap_or("dependency probe reported unavailable")
                .to_string();
            return Err(TtsError::DependencyMissing {
                engine: name.to_string(),
                hint,
            });
        }

        let device = match device {
            Some(value) => Device::parse(value)?,
            None => Device::auto(),
        };

        let ctx = EngineContext {
            reference_wav: reference.to_path_buf(),
            device,
            options,
        };
        let engine = entry.build(&ctx)?;
        info!(
            engine = name,
            device = %device,
            reference = %reference.display(),
            "created engine handle"
        );

        Ok(EngineHandle {
            descriptor: entry.descriptor().clone(),
            engine,
            state: LoadState::Unloaded,
            reference: ctx.reference_wav,
            device,
        })
    }
}

// ── Handles ─────────────────────────────────────────────

/// Lifecycle of an engine's heavy state.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    /// Terminal: the first load failed and will not be retried.
    Failed { reason: String },
}

/// An owned, stateful engine instance.
///
/// `Send` but deliberately not shareable: synthesis takes `&mut self`, so
/// concurrent generate calls on one handle are ruled out at compile time.
pub struct EngineHandle {
    descriptor: Arc<EngineDescriptor>,
    engine: Box<dyn TtsEngine>,
    state: LoadState,
    reference: PathBuf,
    device: Device,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("descriptor", &self.descriptor.name())
            .field("state", &self.state)
            .field("reference", &self.reference)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// Capability record of the engine behind this handle.
    pub fn descriptor(&self) -> Arc<EngineDescriptor> {
        self.descriptor.clone()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn reference(&self) -> &Path {
        &self.reference
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Run the full synthesis pipeline for one request.
    pub fn generate(&mut self, request: &SpeechRequest) -> Result<SynthesisResult, TtsError> {
        pipeline::generate(self, request)
    }

    /// Drive the load state machine. `Failed` is terminal and reproduces
    /// the original failure verbatim on every call.
    pub(crate) fn ensure_loaded(&mut self) -> Result<(), TtsError> {
        let engine_name = self.descriptor.name().to_string();
        match &self.state {
            LoadState::Ready => Ok(()),
            LoadState::Failed { reason } => Err(TtsError::GenerationFailure {
                engine: engine_name,
                reason: reason.clone(),
            }),
            LoadState::Loading => Err(TtsError::GenerationFailure {
                engine: engine_name,
                reason: "engine load was interrupted".to_string(),
            }),
            LoadState::Unloaded => {
                self.state = LoadState::Loading;
                info!(engine = %engine_name, device = %self.device, "loading engine");
                match self.engine.load() {
                    Ok(()) => {
                        self.state = LoadState::Ready;
                        Ok(())
                    }
                    Err(e) => {
                        let reason = format!("{e:#}");
                        warn!(engine = %engine_name, error = %reason, "engine load failed");
                        self.state = LoadState::Failed {
                            reason: reason.clone(),
                        };
                        Err(TtsError::GenerationFailure {
                            engine: engine_name,
                            reason,
                        })
                    }
                }
            }
        }
    }

    pub(crate) fn dispatch(
        &mut self,
        text: &str,
        language: &str,
        params: &ResolvedParams,
    ) -> Result<RawAudio, TtsError> {
        self.engine
            .synthesize(text, language, params)
            .map_err(|e| TtsError::generation(self.descriptor.name(), &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EngineContext;

    struct NullEngine;

    impl TtsEngine for NullEngine {
        fn load(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn synthesize(
            &mut self,
            _text: &str,
            _language: &str,
            _params: &ResolvedParams,
        ) -> anyhow::Result<RawAudio> {
            Ok(RawAudio::mono(vec![0.0; 16], 16000))
        }
    }

    fn null_build(_: &EngineContext) -> Result<Box<dyn TtsEngine>, TtsError> {
        Ok(Box::new(NullEngine))
    }

    fn reference_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn unknown_engine_is_rejected() {
        let factory = EngineFactory::new(EngineRegistry::new());
        let reference = reference_file();
        let err = factory
            .create("nonexistent-engine", reference.path(), None, HashMap::new())
            .unwrap_err();
        assert!(matches!(err, TtsError::UnknownEngine { .. }));
    }

    #[test]
    fn missing_reference_is_reported_before_missing_dependency() {
        let registry = EngineRegistry::new();
        registry.register(
            EngineDescriptor::new("broken", "Broken").probe(|| false),
            null_build,
        );
        let factory = EngineFactory::new(registry);

        let err = factory
            .create("broken", "./definitely-missing.wav", None, HashMap::new())
            .unwrap_err();
        assert!(
            matches!(err, TtsError::ReferenceNotFound { .. }),
            "reference check must precede the dependency probe, got {err:?}"
        );
    }

    #[test]
    fn unavailable_dependency_carries_the_hint() {
        let registry = EngineRegistry::new();
        registry.register(
            EngineDescriptor::new("needy", "Needy")
                .probe(|| false)
                .dependency_hint("install the needy runtime"),
            null_build,
        );
        let factory = EngineFactory::new(registry);
        let reference = reference_file();

        let err = factory
            .create("needy", reference.path(), None, HashMap::new())
            .unwrap_err();
        match err {
            TtsError::DependencyMissing { engine, hint } => {
                assert_eq!(engine, "needy");
                assert_eq!(hint, "install the needy runtime");
            }
            other => panic!("expected DependencyMissing, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_device_override_is_invalid_option() {
        let registry = EngineRegistry::new();
        registry.register(EngineDescriptor::new("ok", "Ok"), null_build);
        let factory = EngineFactory::new(registry);
        let reference = reference_file();

        let err = factory
            .create("ok", reference.path(), Some("quantum"), HashMap::new())
            .unwrap_err();
        assert!(matches!(err, TtsError::InvalidOption { ref name, .. } if name == "device"));
    }

    #[test]
    fn new_handles_start_unloaded_on_the_requested_device() {
        let registry = EngineRegistry::new();
        registry.register(EngineDescriptor::new("ok", "Ok"), null_build);
        let factory = EngineFactory::new(registry);
        let reference = reference_file();

        let handle = factory
            .create("ok", reference.path(), Some("cpu"), HashMap::new())
            .unwrap();
        assert_eq!(*handle.state(), LoadState::Unloaded);
        assert_eq!(handle.device(), Device::Cpu);
        assert_eq!(handle.reference(), reference.path());
    }
}
