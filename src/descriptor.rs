//! Immutable capability records describing what each engine can do.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::params::ParamSpec;

/// Cheap availability check for an engine's optional dependency. Must not
/// load models or block for long; the registry caches its result.
pub type ProbeFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// What one engine supports: languages, inline-tag vocabulary, tunable
/// parameters, and how to probe its dependency. Built once at registration
/// and never mutated; shared via `Arc`.
#[derive(Clone)]
pub struct EngineDescriptor {
    name: String,
    display_name: String,
    languages: BTreeSet<String>,
    tags: BTreeSet<String>,
    params: BTreeMap<String, ParamSpec>,
    probe: ProbeFn,
    dependency_hint: Option<String>,
}

impl EngineDescriptor {
    /// Start a descriptor. The default probe reports available, which is
    /// right for engines without an optional heavy dependency.
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            languages: BTreeSet::new(),
            tags: BTreeSet::new(),
            params: BTreeMap::new(),
            probe: Arc::new(|| true),
            dependency_hint: None,
        }
    }

    pub fn language(mut self, code: impl AsRef<str>) -> Self {
        self.languages.insert(code.as_ref().to_lowercase());
        self
    }

    pub fn languages(mut self, codes: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        for code in codes {
            self.languages.insert(code.as_ref().to_lowercase());
        }
        self
    }

    pub fn tag(mut self, tag: impl AsRef<str>) -> Self {
        self.tags.insert(tag.as_ref().to_lowercase());
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        for tag in tags {
            self.tags.insert(tag.as_ref().to_lowercase());
        }
        self
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    pub fn probe(mut self, probe: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// What to tell the user when the probe reports unavailable.
    pub fn dependency_hint(mut self, hint: impl Into<String>) -> Self {
        self.dependency_hint = Some(hint.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn language_set(&self) -> &BTreeSet<String> {
        &self.languages
    }

    /// Tag vocabulary; empty means inline-tag processing is disabled.
    pub fn tag_vocabulary(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn param_specs(&self) -> &BTreeMap<String, ParamSpec> {
        &self.params
    }

    pub fn supports_language(&self, code: &str) -> bool {
        self.languages.contains(&code.to_lowercase())
    }

    pub fn hint(&self) -> Option<&str> {
        self.dependency_hint.as_deref()
    }

    pub(crate) fn run_probe(&self) -> bool {
        (self.probe)()
    }
}

impl fmt::Debug for EngineDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineDescriptor")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("languages", &self.languages)
            .field("tags", &self.tags)
            .field("params", &self.params.keys().collect::<Vec<_>>())
            .finish()
    }
}
