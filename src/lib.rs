//! Voice cloning speech synthesis with interchangeable engines.
//!
//! ```no_run
//! use voxclone::{SayOptions, VoiceCloner};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut cloner = VoiceCloner::new("reference.wav", None, None, Default::default())?;
//! let audio = cloner.say("Hello there!", &SayOptions::default())?;
//! audio.write_wav("hello.wav")?;
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cloner;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod engines;
pub mod factory;
pub mod interface;
pub mod params;
pub mod pipeline;
pub mod registry;
pub mod tags;

pub use cloner::{SayOptions, VoiceCloner};
pub use descriptor::EngineDescriptor;
pub use device::Device;
pub use factory::{EngineFactory, EngineHandle, LoadState};
pub use interface::{RawAudio, SpeechRequest, SynthesisResult, TtsEngine, TtsError};
pub use params::{ParamSpec, ParamValue, ResolvedParams};
pub use registry::{BuildFn, EngineContext, EngineListing, EngineRegistry};
