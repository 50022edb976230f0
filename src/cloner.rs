//! High-level one-call facade over the engine registry and pipeline.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::descriptor::EngineDescriptor;
use crate::factory::{EngineFactory, EngineHandle};
use crate::interface::{SpeechRequest, SynthesisResult, TtsError};
use crate::params::{ParamSpec, ParamValue};
use crate::registry::{EngineListing, EngineRegistry};

pub const DEFAULT_ENGINE: &str = "xtts";

/// Timestamped output name used when a caller asks to save without naming a
/// destination.
pub fn timestamped_output() -> PathBuf {
    let stamp = chrono::Local::now().format("generated_audio_%Y%m%d_%H%M%S.wav");
    PathBuf::from(stamp.to_string())
}

// ── Say options ─────────────────────────────────────────────

/// Per-call knobs for [`VoiceCloner::say`].
#[derive(Debug, Clone)]
pub struct SayOptions {
    pub language: String,
    pub speed: f32,
    pub overrides: HashMap<String, ParamValue>,
    /// Write the result here. Takes precedence over `save`.
    pub save_to: Option<PathBuf>,
    /// Write the result to a timestamped wav in the working directory.
    pub save: bool,
}

impl Default for SayOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            speed: 1.0,
            overrides: HashMap::new(),
            save_to: None,
            save: false,
        }
    }
}

impl SayOptions {
    pub fn language(mut self, code: impl Into<String>) -> Self {
        self.language = code.into();
        self
    }

    pub fn speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    pub fn save_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_to = Some(path.into());
        self
    }
}

// ── Voice cloner ────────────────────────────────────────────

/// Owns one engine handle bound to one reference voice.
pub struct VoiceCloner {
    handle: EngineHandle,
}

impl VoiceCloner {
    /// Create a cloner for `reference` using the globally registered engines.
    /// `engine` defaults to [`DEFAULT_ENGINE`], `device` to auto-detection.
    pub fn new(
        reference: impl Into<PathBuf>,
        engine: Option<&str>,
        device: Option<&str>,
        options: HashMap<String, serde_json::Value>,
    ) -> Result<Self, TtsError> {
        let name = engine.unwrap_or(DEFAULT_ENGINE);
        let handle = EngineFactory::with_global().create(name, reference.into(), device, options)?;
        Ok(Self { handle })
    }

    /// Wrap an already-created handle, for callers that drive the factory
    /// themselves.
    pub fn with_handle(handle: EngineHandle) -> Self {
        Self { handle }
    }

    /// Clone the reference voice saying `text`.
    pub fn say(&mut self, text: &str, options: &SayOptions) -> Result<SynthesisResult> {
        if text.trim().is_empty() {
            bail!("nothing to say: text is empty");
        }

        let mut request = SpeechRequest::new(text, options.language.as_str());
        request.speed = options.speed;
        request.overrides = options.overrides.clone();

        let result = self.handle.generate(&request)?;

        if let Some(path) = self.output_path(options) {
            result
                .write_wav(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                path = %path.display(),
                seconds = result.duration_seconds() as f64,
                "saved generated audio"
            );
        }
        Ok(result)
    }

    fn output_path(&self, options: &SayOptions) -> Option<PathBuf> {
        if let Some(path) = &options.save_to {
            return Some(path.clone());
        }
        if options.save {
            return Some(timestamped_output());
        }
        None
    }

    pub fn descriptor(&self) -> Arc<EngineDescriptor> {
        self.handle.descriptor()
    }

    pub fn engine_parameters(&self) -> BTreeMap<String, ParamSpec> {
        self.handle.descriptor().param_specs().clone()
    }

    pub fn supported_languages(&self) -> BTreeSet<String> {
        self.handle.descriptor().language_set().clone()
    }

    pub fn handle_mut(&mut self) -> &mut EngineHandle {
        &mut self.handle
    }

    /// Every registered engine with its probed availability.
    pub fn available_engines() -> Vec<EngineListing> {
        EngineRegistry::global().list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{RawAudio, TtsEngine};
    use crate::params::ResolvedParams;
    use crate::registry::EngineContext;

    struct Beeper;

    impl TtsEngine for Beeper {
        fn load(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn synthesize(
            &mut self,
            text: &str,
            _language: &str,
            _params: &ResolvedParams,
        ) -> anyhow::Result<RawAudio> {
            let samples = vec![0.25; text.len() * 10];
            Ok(RawAudio::mono(samples, 16000))
        }
    }

    fn beeper_cloner() -> VoiceCloner {
        let registry = EngineRegistry::new();
        registry.register(
            EngineDescriptor::new("beeper", "Beeper").language("en"),
            |_ctx: &EngineContext| Ok(Box::new(Beeper) as Box<dyn TtsEngine>),
        );
        let reference = tempfile::NamedTempFile::new().unwrap();
        let handle = EngineFactory::new(registry)
            .create("beeper", reference.path(), Some("cpu"), HashMap::new())
            .unwrap();
        VoiceCloner::with_handle(handle)
    }

    #[test]
    fn say_rejects_empty_text() {
        let mut cloner = beeper_cloner();
        let err = cloner.say("   ", &SayOptions::default()).unwrap_err();
        assert!(err.to_string().contains("text is empty"));
    }

    #[test]
    fn say_returns_audio_and_saves_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clip.wav");
        let mut cloner = beeper_cloner();
        let options = SayOptions::default().save_to(&out);
        let result = cloner.say("hello", &options).unwrap();
        assert_eq!(result.samples.len(), 50);
        assert_eq!(result.sample_rate, 16000);
        assert!(out.is_file(), "expected {} to exist", out.display());
    }

    #[test]
    fn introspection_reflects_the_descriptor() {
        let cloner = beeper_cloner();
        assert_eq!(cloner.descriptor().name(), "beeper");
        assert!(cloner.supported_languages().contains("en"));
        assert!(cloner.engine_parameters().is_empty());
    }

    #[test]
    fn timestamped_name_is_used_when_save_is_set() {
        let cloner = beeper_cloner();
        let options = SayOptions {
            save: true,
            ..SayOptions::default()
        };
        let path = cloner.output_path(&options).unwrap();
        let name = path.to_string_lossy().into_owned();
        assert!(name.starts_with("generated_audio_"), "got {name}");
        assert!(name.ends_with(".wav"), "got {name}");
    }
}
