//! Core contract shared by every synthesis engine: the `TtsEngine` trait,
//! the request/result value types, and the error taxonomy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::params::{ParamValue, ResolvedParams};

// ── Error Taxonomy ─────────────────────────────────────

/// Every failure the registry, factory, and pipeline can surface.
///
/// Variants carry the offending names and values so callers can render
/// actionable messages without parsing error strings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TtsError {
    #[error("unknown engine '{name}' (registered: {known:?})")]
    UnknownEngine { name: String, known: Vec<String> },

    #[error("engine '{engine}' is missing a dependency: {hint}")]
    DependencyMissing { engine: String, hint: String },

    #[error("reference audio not found: {}", .path.display())]
    ReferenceNotFound { path: PathBuf },

    #[error("engine '{engine}' does not support language '{language}' (supported: {supported:?})")]
    UnsupportedLanguage {
        engine: String,
        language: String,
        supported: Vec<String>,
    },

    #[error("unknown parameter '{name}' for engine '{engine}'")]
    UnknownParameter { engine: String, name: String },

    #[error("parameter '{name}' = {value} outside [{min}, {max}]")]
    ParameterOutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid value '{value}' for '{name}' (allowed: {options:?})")]
    InvalidOption {
        name: String,
        value: String,
        options: Vec<String>,
    },

    #[error("generation failed in engine '{engine}': {reason}")]
    GenerationFailure { engine: String, reason: String },
}

impl TtsError {
    /// Wrap an engine-internal error, preserving its full chain text.
    pub(crate) fn generation(engine: &str, err: &anyhow::Error) -> Self {
        TtsError::GenerationFailure {
            engine: engine.to_string(),
            reason: format!("{err:#}"),
        }
    }
}

// ── Engine Trait ────────────────────────────────────────

/// A single speech-synthesis backend.
///
/// Implementations are owned by one `EngineHandle` and are never shared:
/// both methods take `&mut self` and callers serialize access. Internal
/// failures are plain `anyhow` errors; the pipeline wraps them into the
/// public taxonomy together with the engine name.
pub trait TtsEngine: Send {
    /// One-time heavy initialization (sessions, tokenizers, server-side
    /// weight loads). Called at most once per instance, lazily, before the
    /// first synthesis.
    fn load(&mut self) -> anyhow::Result<()>;

    /// Blocking synthesis. `text` has already passed tag rewriting and
    /// `params` contains a validated value for every declared parameter.
    fn synthesize(
        &mut self,
        text: &str,
        language: &str,
        params: &ResolvedParams,
    ) -> anyhow::Result<RawAudio>;
}

// ── Requests and Results ────────────────────────────────

/// One synthesis request. Built fresh per call; nothing is retained
/// between calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub language: String,
    /// Per-call parameter overrides; unspecified parameters fall back to
    /// the engine's declared defaults.
    #[serde(default)]
    pub overrides: HashMap<String, ParamValue>,
    /// Playback-speed factor applied by the pipeline after synthesis.
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            overrides: HashMap::new(),
            speed: 1.0,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }
}

/// Engine output before normalization. `samples` may be interleaved
/// multi-channel; the pipeline mixes down and validates.
#[derive(Debug, Clone)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl RawAudio {
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: 1,
            sample_rate,
        }
    }
}

/// Final pipeline product: mono f32 PCM plus its sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SynthesisResult {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Write as 32-bit float mono WAV.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        crate::audio::write_wav(path.as_ref(), &self.samples, self.sample_rate)
    }
}
