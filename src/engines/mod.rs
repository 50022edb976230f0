//! Built-in engine catalog.

pub(crate) mod onnx;

pub mod chatterbox;
pub mod xtts;

use crate::interface::TtsEngine;
use crate::registry::EngineRegistry;

use chatterbox::{ChatterboxEngine, ChatterboxVariant};
use xtts::XttsEngine;

/// Register every built-in engine. The global registry calls this once;
/// private registries in tests may call it too.
pub fn register_builtins(registry: &EngineRegistry) {
    for variant in [ChatterboxVariant::Turbo, ChatterboxVariant::Standard] {
        registry.register(chatterbox::descriptor(variant), move |ctx| {
            Ok(Box::new(ChatterboxEngine::from_context(variant, ctx)) as Box<dyn TtsEngine>)
        });
    }
    registry.register(xtts::descriptor(), |ctx| {
        Ok(Box::new(XttsEngine::from_context(ctx)) as Box<dyn TtsEngine>)
    });
}
