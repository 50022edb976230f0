//! Multilingual voice-cloning engine backed by a local XTTS inference server.
//!
//! Talks to an xtts-api-server style process over HTTP: `GET /health` for the
//! availability probe, `POST /load` to bring the model up, `POST /synthesize`
//! to clone speech. The server returns raw WAV bytes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::audio;
use crate::descriptor::EngineDescriptor;
use crate::device::Device;
use crate::interface::{RawAudio, TtsEngine};
use crate::params::{ParamSpec, ResolvedParams};
use crate::registry::EngineContext;

pub const ENGINE_NAME: &str = "xtts";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8020";
pub const DEFAULT_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

const LANGUAGES: [&str; 16] = [
    "en", "es", "fr", "de", "it", "pt", "pl", "tr", "ru", "nl", "cs", "ar", "zh", "ja", "hu", "ko",
];

const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
const LOAD_TIMEOUT: Duration = Duration::from_secs(600);
const SYNTH_TIMEOUT: Duration = Duration::from_secs(300);

pub fn descriptor() -> EngineDescriptor {
    EngineDescriptor::new(ENGINE_NAME, "Coqui XTTS v2")
        .languages(LANGUAGES)
        .param("temperature", ParamSpec::float(0.7, 0.1, 1.0, "sampling temperature"))
        .param(
            "gpt_cond_len",
            ParamSpec::int(128, 32, 256, "conditioning window length in latent frames"),
        )
        .probe(|| server_alive(DEFAULT_ENDPOINT))
        .dependency_hint(format!(
            "start an XTTS server on {DEFAULT_ENDPOINT} (override with the 'endpoint' option)"
        ))
}

/// Quick reachability check, also used as the availability probe.
pub fn server_alive(endpoint: &str) -> bool {
    // The server is local; never route through a proxy.
    let Ok(client) = Client::builder()
        .timeout(HEALTH_TIMEOUT)
        .no_proxy()
        .build()
    else {
        return false;
    };
    match client.get(format!("{endpoint}/health")).send() {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[derive(Serialize)]
struct LoadBody<'a> {
    model: &'a str,
    device: String,
}

#[derive(Serialize)]
struct SynthesizeBody<'a> {
    text: &'a str,
    language: &'a str,
    speaker_wav: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gpt_cond_len: Option<i64>,
}

pub struct XttsEngine {
    endpoint: String,
    model: String,
    device: Device,
    reference_wav: PathBuf,
    client: Option<Client>,
}

impl XttsEngine {
    pub fn from_context(ctx: &EngineContext) -> Self {
        let endpoint = ctx
            .options
            .get("endpoint")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        let model = ctx
            .options
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();
        Self {
            endpoint,
            model,
            device: ctx.device,
            reference_wav: ctx.reference_wav.clone(),
            client: None,
        }
    }
}

impl TtsEngine for XttsEngine {
    fn load(&mut self) -> Result<()> {
        // The probe checks the default endpoint; a custom one gets verified here.
        if !server_alive(&self.endpoint) {
            bail!("xtts server at {} is not responding", self.endpoint);
        }
        let client = Client::builder()
            .timeout(SYNTH_TIMEOUT)
            .no_proxy()
            .build()
            .context("failed to build http client")?;

        info!(
            endpoint = %self.endpoint,
            model = %self.model,
            device = %self.device,
            "requesting server-side model load"
        );
        let resp = client
            .post(format!("{}/load", self.endpoint))
            .timeout(LOAD_TIMEOUT)
            .json(&LoadBody {
                model: &self.model,
                device: self.device.to_string(),
            })
            .send()
            .context("load request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            bail!("xtts server refused to load model ({status}): {body}");
        }

        self.client = Some(client);
        Ok(())
    }

    fn synthesize(
        &mut self,
        text: &str,
        language: &str,
        params: &ResolvedParams,
    ) -> Result<RawAudio> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| anyhow!("engine not loaded"))?;
        let body = SynthesizeBody {
            text,
            language,
            speaker_wav: self.reference_wav.display().to_string(),
            temperature: params.float("temperature"),
            gpt_cond_len: params.int("gpt_cond_len"),
        };
        debug!(
            endpoint = %self.endpoint,
            chars = text.chars().count(),
            "sending synthesis request"
        );
        let resp = client
            .post(format!("{}/synthesize", self.endpoint))
            .json(&body)
            .send()
            .context("synthesis request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            bail!("xtts server returned {status}: {body}");
        }
        let bytes = resp.bytes().context("failed to read synthesis response")?;
        audio::decode_wav(&bytes).context("server returned an unreadable wav")
    }
}
