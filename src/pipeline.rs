//! The synthesis pipeline.
//!
//! One entry point, [`generate`], runs every request through the same
//! stations regardless of engine: language check, parameter resolution,
//! tag rewriting, lazy load plus dispatch, normalization, and the optional
//! speed transform. All validation happens before any engine code runs.

use tracing::{debug, info};

use crate::audio;
use crate::factory::EngineHandle;
use crate::interface::{SpeechRequest, SynthesisResult, TtsError};
use crate::params;
use crate::tags;

pub const SPEED_MIN: f32 = 0.25;
pub const SPEED_MAX: f32 = 4.0;

pub fn generate(
    handle: &mut EngineHandle,
    request: &SpeechRequest,
) -> Result<SynthesisResult, TtsError> {
    let descriptor = handle.descriptor();
    let engine_name = descriptor.name().to_string();

    if !descriptor.supports_language(&request.language) {
        return Err(TtsError::UnsupportedLanguage {
            engine: engine_name,
            language: request.language.clone(),
            supported: descriptor.language_set().iter().cloned().collect(),
        });
    }

    let resolved = params::resolve(&engine_name, descriptor.param_specs(), &request.overrides)?;

    if !request.speed.is_finite() || request.speed < SPEED_MIN || request.speed > SPEED_MAX {
        return Err(TtsError::ParameterOutOfRange {
            name: "speed".to_string(),
            value: request.speed as f64,
            min: SPEED_MIN as f64,
            max: SPEED_MAX as f64,
        });
    }

    let outcome = tags::rewrite(&request.text, descriptor.tag_vocabulary());
    if !outcome.stripped.is_empty() {
        debug!(
            engine = %engine_name,
            stripped = ?outcome.stripped,
            "removed inline tags outside the engine vocabulary"
        );
    }

    handle.ensure_loaded()?;
    debug!(
        engine = %engine_name,
        language = %request.language,
        chars = outcome.text.chars().count(),
        "dispatching synthesis"
    );
    let raw = handle.dispatch(&outcome.text, &request.language, &resolved)?;

    let failure = |reason: String| TtsError::GenerationFailure {
        engine: engine_name.clone(),
        reason,
    };

    if raw.sample_rate == 0 {
        return Err(failure("engine reported a zero sample rate".to_string()));
    }
    let mono = audio::downmix(&raw.samples, raw.channels);
    if mono.is_empty() {
        return Err(failure("engine produced no samples".to_string()));
    }
    if let Some(bad) = mono.iter().find(|s| !s.is_finite()) {
        return Err(failure(format!("engine produced a non-finite sample: {bad}")));
    }

    let samples = if (request.speed - 1.0).abs() > f32::EPSILON {
        audio::resample(&mono, 1.0 / request.speed as f64)
            .map_err(|e| TtsError::generation(&engine_name, &e))?
    } else {
        mono
    };

    let result = SynthesisResult {
        samples,
        sample_rate: raw.sample_rate,
    };
    info!(
        engine = %engine_name,
        seconds = result.duration_seconds() as f64,
        rate = result.sample_rate,
        "synthesis complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::EngineDescriptor;
    use crate::factory::{EngineFactory, LoadState};
    use crate::interface::{RawAudio, TtsEngine};
    use crate::params::{ParamSpec, ResolvedParams};
    use crate::registry::{EngineContext, EngineRegistry};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// What the fake engine should hand back to the pipeline.
    #[derive(Clone)]
    enum Output {
        Echo { rate: u32, per_char: usize },
        Fixed(RawAudio),
        LoadError(String),
        SynthError(String),
    }

    #[derive(Clone, Default)]
    struct Probe {
        loads: Arc<AtomicUsize>,
        synths: Arc<AtomicUsize>,
        last_text: Arc<Mutex<Option<String>>>,
    }

    struct FakeEngine {
        output: Output,
        probe: Probe,
    }

    impl TtsEngine for FakeEngine {
        fn load(&mut self) -> anyhow::Result<()> {
            self.probe.loads.fetch_add(1, Ordering::SeqCst);
            if let Output::LoadError(msg) = &self.output {
                anyhow::bail!("{msg}");
            }
            Ok(())
        }

        fn synthesize(
            &mut self,
            text: &str,
            _language: &str,
            _params: &ResolvedParams,
        ) -> anyhow::Result<RawAudio> {
            self.probe.synths.fetch_add(1, Ordering::SeqCst);
            *self.probe.last_text.lock().unwrap() = Some(text.to_string());
            match &self.output {
                Output::Echo { rate, per_char } => Ok(RawAudio::mono(
                    vec![0.1; text.chars().count() * per_char],
                    *rate,
                )),
                Output::Fixed(raw) => Ok(raw.clone()),
                Output::SynthError(msg) => anyhow::bail!("{msg}"),
                Output::LoadError(_) => unreachable!("load failures never reach synthesis"),
            }
        }
    }

    fn handle_for(descriptor: EngineDescriptor, output: Output) -> (crate::EngineHandle, Probe) {
        let probe = Probe::default();
        let registry = EngineRegistry::new();
        let build_probe = probe.clone();
        registry.register(descriptor, move |_ctx: &EngineContext| {
            Ok(Box::new(FakeEngine {
                output: output.clone(),
                probe: build_probe.clone(),
            }) as Box<dyn TtsEngine>)
        });

        let reference = tempfile::NamedTempFile::new().unwrap();
        let handle = EngineFactory::new(registry)
            .create("fake", reference.path(), Some("cpu"), HashMap::new())
            .unwrap();
        (handle, probe)
    }

    fn echo_descriptor() -> EngineDescriptor {
        EngineDescriptor::new("fake", "Fake Engine")
            .language("en")
            .param("temperature", ParamSpec::float(0.7, 0.1, 1.0, "sampling"))
    }

    #[test]
    fn echo_engine_round_trip_scales_with_text_length() {
        let (mut handle, _) = handle_for(
            echo_descriptor(),
            Output::Echo {
                rate: 16000,
                per_char: 160,
            },
        );
        let result = handle.generate(&SpeechRequest::new("hello", "en")).unwrap();
        assert_eq!(result.samples.len(), 5 * 160);
        assert_eq!(result.sample_rate, 16000);
        assert_eq!(*handle.state(), LoadState::Ready);
    }

    #[test]
    fn unsupported_language_never_reaches_the_engine() {
        let (mut handle, probe) = handle_for(
            echo_descriptor(),
            Output::Echo {
                rate: 16000,
                per_char: 1,
            },
        );
        let err = handle.generate(&SpeechRequest::new("hola", "es")).unwrap_err();
        assert!(matches!(err, TtsError::UnsupportedLanguage { ref language, .. } if language == "es"));
        assert_eq!(probe.loads.load(Ordering::SeqCst), 0);
        assert_eq!(probe.synths.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn out_of_range_parameter_aborts_before_load_or_dispatch() {
        let (mut handle, probe) = handle_for(
            echo_descriptor(),
            Output::Echo {
                rate: 16000,
                per_char: 1,
            },
        );
        let request = SpeechRequest::new("hello", "en").with_param("temperature", 1.5);
        let err = handle.generate(&request).unwrap_err();
        match err {
            TtsError::ParameterOutOfRange { name, value, min, max } => {
                assert_eq!(name, "temperature");
                assert!((value - 1.5).abs() < 1e-9);
                assert!((min - 0.1).abs() < 1e-9);
                assert!((max - 1.0).abs() < 1e-9);
            }
            other => panic!("expected ParameterOutOfRange, got {other:?}"),
        }
        assert_eq!(probe.loads.load(Ordering::SeqCst), 0, "no load on bad params");
        assert_eq!(probe.synths.load(Ordering::SeqCst), 0, "no dispatch on bad params");
        assert_eq!(*handle.state(), LoadState::Unloaded);
    }

    #[test]
    fn known_tags_are_kept_and_unknown_tags_are_stripped_before_dispatch() {
        let descriptor = echo_descriptor().tags(["laugh", "sigh"]);
        let (mut handle, probe) = handle_for(
            descriptor,
            Output::Echo {
                rate: 16000,
                per_char: 1,
            },
        );
        handle
            .generate(&SpeechRequest::new("Hi [laugh] there [foo]", "en"))
            .unwrap();
        let seen = probe.last_text.lock().unwrap().clone().unwrap();
        assert_eq!(seen, "Hi [laugh] there");
    }

    #[test]
    fn empty_vocabulary_passes_brackets_through_to_the_engine() {
        let (mut handle, probe) = handle_for(
            echo_descriptor(),
            Output::Echo {
                rate: 16000,
                per_char: 1,
            },
        );
        handle
            .generate(&SpeechRequest::new("keep [foo] intact", "en"))
            .unwrap();
        let seen = probe.last_text.lock().unwrap().clone().unwrap();
        assert_eq!(seen, "keep [foo] intact");
    }

    #[test]
    fn failed_load_is_terminal_and_reproduces_the_original_error() {
        let (mut handle, probe) = handle_for(
            echo_descriptor(),
            Output::LoadError("weights not found".to_string()),
        );
        let request = SpeechRequest::new("hello", "en");

        let first = handle.generate(&request).unwrap_err();
        let second = handle.generate(&request).unwrap_err();

        assert!(matches!(first, TtsError::GenerationFailure { ref reason, .. } if reason.contains("weights not found")));
        assert_eq!(first, second, "failed handles must reproduce the original error");
        assert_eq!(probe.loads.load(Ordering::SeqCst), 1, "load is never retried");
        assert!(matches!(handle.state(), LoadState::Failed { .. }));
    }

    #[test]
    fn engine_errors_are_wrapped_with_the_engine_name() {
        let (mut handle, _) = handle_for(
            echo_descriptor(),
            Output::SynthError("inference blew up".to_string()),
        );
        let err = handle.generate(&SpeechRequest::new("hello", "en")).unwrap_err();
        match err {
            TtsError::GenerationFailure { engine, reason } => {
                assert_eq!(engine, "fake");
                assert!(reason.contains("inference blew up"));
            }
            other => panic!("expected GenerationFailure, got {other:?}"),
        }
    }

    #[test]
    fn empty_output_is_a_generation_failure() {
        let (mut handle, _) = handle_for(
            echo_descriptor(),
            Output::Fixed(RawAudio::mono(Vec::new(), 16000)),
        );
        let err = handle.generate(&SpeechRequest::new("hello", "en")).unwrap_err();
        assert!(matches!(err, TtsError::GenerationFailure { ref reason, .. } if reason.contains("no samples")));
    }

    #[test]
    fn non_finite_output_is_a_generation_failure() {
        let (mut handle, _) = handle_for(
            echo_descriptor(),
            Output::Fixed(RawAudio::mono(vec![0.0, f32::NAN, 0.1], 16000)),
        );
        let err = handle.generate(&SpeechRequest::new("hello", "en")).unwrap_err();
        assert!(matches!(err, TtsError::GenerationFailure { ref reason, .. } if reason.contains("non-finite")));
    }

    #[test]
    fn zero_sample_rate_is_a_generation_failure() {
        let (mut handle, _) = handle_for(
            echo_descriptor(),
            Output::Fixed(RawAudio::mono(vec![0.1; 64], 0)),
        );
        let err = handle.generate(&SpeechRequest::new("hello", "en")).unwrap_err();
        assert!(matches!(err, TtsError::GenerationFailure { ref reason, .. } if reason.contains("sample rate")));
    }

    #[test]
    fn stereo_output_is_downmixed_to_mono() {
        let stereo = RawAudio {
            samples: vec![0.5, -0.5, 0.25, 0.75],
            channels: 2,
            sample_rate: 16000,
        };
        let (mut handle, _) = handle_for(echo_descriptor(), Output::Fixed(stereo));
        let result = handle.generate(&SpeechRequest::new("hello", "en")).unwrap();
        assert_eq!(result.samples, vec![0.0, 0.5]);
    }

    #[test]
    fn speed_two_halves_the_sample_count_at_unchanged_rate() {
        let (mut handle, _) = handle_for(
            echo_descriptor(),
            Output::Echo {
                rate: 16000,
                per_char: 800,
            },
        );
        let baseline = handle.generate(&SpeechRequest::new("hello", "en")).unwrap();
        let fast = handle
            .generate(&SpeechRequest::new("hello", "en").with_speed(2.0))
            .unwrap();

        assert_eq!(fast.sample_rate, baseline.sample_rate);
        let target = baseline.samples.len() as f64 / 2.0;
        assert!(
            (fast.samples.len() as f64 - target).abs() <= target * 0.02,
            "got {} samples, wanted ~{target}",
            fast.samples.len()
        );
    }

    #[test]
    fn speed_outside_bounds_is_rejected_without_dispatch() {
        let (mut handle, probe) = handle_for(
            echo_descriptor(),
            Output::Echo {
                rate: 16000,
                per_char: 1,
            },
        );
        let err = handle
            .generate(&SpeechRequest::new("hello", "en").with_speed(10.0))
            .unwrap_err();
        assert!(matches!(err, TtsError::ParameterOutOfRange { ref name, .. } if name == "speed"));
        assert_eq!(probe.synths.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_parameter_is_rejected_with_engine_name() {
        let (mut handle, _) = handle_for(
            echo_descriptor(),
            Output::Echo {
                rate: 16000,
                per_char: 1,
            },
        );
        let err = handle
            .generate(&SpeechRequest::new("hello", "en").with_param("verbosity", 2))
            .unwrap_err();
        assert!(matches!(
            err,
            TtsError::UnknownParameter { ref engine, ref name } if engine == "fake" && name == "verbosity"
        ));
    }
}
