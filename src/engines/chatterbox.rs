//! In-process voice-cloning engine running exported Chatterbox ONNX graphs.
//!
//! Two variants share the implementation: turbo (smaller, English-only,
//! understands paralinguistic tags) and standard (larger, no tags). Model
//! weights and the tokenizer are read from a model directory at load time;
//! obtaining them is outside this crate's scope.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::audio;
use crate::descriptor::EngineDescriptor;
use crate::device::Device;
use crate::engines::onnx;
use crate::interface::{RawAudio, TtsEngine};
use crate::params::{ParamSpec, ResolvedParams};
use crate::registry::EngineContext;

pub const OUTPUT_SAMPLE_RATE: u32 = 24000;
const CONDITIONING_RATE: u32 = 16000;
const MAX_REFERENCE_SECONDS: usize = 10;

pub const PARALINGUISTIC_TAGS: [&str; 6] = ["laugh", "chuckle", "cough", "sigh", "gasp", "yawn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatterboxVariant {
    Turbo,
    Standard,
}

impl ChatterboxVariant {
    pub fn engine_name(self) -> &'static str {
        match self {
            ChatterboxVariant::Turbo => "chatterbox-turbo",
            ChatterboxVariant::Standard => "chatterbox-standard",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ChatterboxVariant::Turbo => "Chatterbox Turbo (350M)",
            ChatterboxVariant::Standard => "Chatterbox Standard (500M)",
        }
    }

    fn model_file(self) -> &'static str {
        match self {
            ChatterboxVariant::Turbo => "turbo.onnx",
            ChatterboxVariant::Standard => "standard.onnx",
        }
    }
}

pub fn descriptor(variant: ChatterboxVariant) -> EngineDescriptor {
    let descriptor = EngineDescriptor::new(variant.engine_name(), variant.display_name())
        .language("en")
        .param(
            "cfg_weight",
            ParamSpec::float(0.5, 0.0, 1.0, "classifier-free guidance weight"),
        )
        .param(
            "exaggeration",
            ParamSpec::float(0.5, 0.0, 1.5, "emotion exaggeration intensity"),
        )
        .probe(onnx::runtime_available)
        .dependency_hint(
            "install the ONNX Runtime shared library (libonnxruntime) where the loader can find it",
        );
    match variant {
        ChatterboxVariant::Turbo => descriptor.tags(PARALINGUISTIC_TAGS),
        ChatterboxVariant::Standard => descriptor,
    }
}

fn default_model_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voxclone")
        .join("models")
        .join("chatterbox")
}

pub struct ChatterboxEngine {
    variant: ChatterboxVariant,
    model_dir: PathBuf,
    device: Device,
    reference_wav: PathBuf,
    session: Option<Session>,
    tokenizer: Option<Tokenizer>,
    reference: Vec<f32>,
}

impl ChatterboxEngine {
    pub fn from_context(variant: ChatterboxVariant, ctx: &EngineContext) -> Self {
        let model_dir = ctx
            .options
            .get("model_dir")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .unwrap_or_else(default_model_dir);
        Self {
            variant,
            model_dir,
            device: ctx.device,
            reference_wav: ctx.reference_wav.clone(),
            session: None,
            tokenizer: None,
            reference: Vec::new(),
        }
    }
}

impl TtsEngine for ChatterboxEngine {
    fn load(&mut self) -> Result<()> {
        onnx::ensure_initialized()?;

        let raw = audio::read_wav(&self.reference_wav).context("failed to read reference audio")?;
        let mono = audio::downmix(&raw.samples, raw.channels);
        let mut reference = if raw.sample_rate == CONDITIONING_RATE {
            mono
        } else {
            audio::resample(&mono, CONDITIONING_RATE as f64 / raw.sample_rate as f64)
                .context("failed to resample reference audio")?
        };
        reference.truncate(CONDITIONING_RATE as usize * MAX_REFERENCE_SECONDS);
        if reference.is_empty() {
            bail!("reference audio is empty");
        }
        self.reference = reference;

        let tokenizer_path = self.model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer {}: {e}", tokenizer_path.display()))?;
        self.tokenizer = Some(tokenizer);

        let model_path = self.model_dir.join(self.variant.model_file());
        info!(
            model = %model_path.display(),
            device = %self.device,
            "loading chatterbox session"
        );
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .with_execution_providers(onnx::providers_for(self.device))?
            .commit_from_file(&model_path)
            .with_context(|| format!("failed to load model {}", model_path.display()))?;
        self.session = Some(session);
        Ok(())
    }

    fn synthesize(
        &mut self,
        text: &str,
        _language: &str,
        params: &ResolvedParams,
    ) -> Result<RawAudio> {
        let tokenizer = self
            .tokenizer
            .as_ref()
            .ok_or_else(|| anyhow!("engine not loaded"))?;
        let encoding = tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        if ids.is_empty() {
            bail!("text produced no tokens");
        }

        let cfg_weight = params.float("cfg_weight").unwrap_or(0.5) as f32;
        let exaggeration = params.float("exaggeration").unwrap_or(0.5) as f32;

        let text_len = ids.len();
        let reference_len = self.reference.len();
        let inputs = ort::inputs![
            "text_ids" => Tensor::from_array(([1usize, text_len], ids))?,
            "reference" => Tensor::from_array(([1usize, reference_len], self.reference.clone()))?,
            "cfg_weight" => Tensor::from_array(([1usize], vec![cfg_weight]))?,
            "exaggeration" => Tensor::from_array(([1usize], vec![exaggeration]))?,
        ]?;

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| anyhow!("engine not loaded"))?;
        let outputs = session.run(inputs)?;
        let audio_value = outputs
            .get("audio")
            .ok_or_else(|| anyhow!("model returned no 'audio' output"))?;
        let (_, samples) = audio_value.try_extract_raw_tensor::<f32>()?;
        debug!(samples = samples.len(), "chatterbox inference complete");
        Ok(RawAudio::mono(samples.to_vec(), OUTPUT_SAMPLE_RATE))
    }
}
