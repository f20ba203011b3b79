//! Pipeline configuration (§3): the mapping loaded from each YAML file
//! under `<vault>/.memory-loop/sync/`.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Overwrite,
    Preserve,
    Merge,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Preserve
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchConfig {
    pub field: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Defaults {
    pub merge_strategy: Option<MergeStrategy>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
    pub strategy: Option<MergeStrategy>,
    #[serde(default)]
    pub normalize: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub connector: String,
    #[serde(rename = "match")]
    pub match_config: MatchConfig,
    #[serde(default)]
    pub defaults: Defaults,
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub vocabulary: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Error)]
pub enum PipelineConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("pipeline has no `fields` entries")]
    EmptyFields,
    #[error("field `{0}` has `normalize: true` but no `vocabulary` is configured")]
    MissingVocabulary(String),
}

impl PipelineConfig {
    pub fn parse(yaml: &str) -> Result<Self, PipelineConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineConfigError> {
        if self.fields.is_empty() {
            return Err(PipelineConfigError::EmptyFields);
        }
        if self.vocabulary.is_empty() {
            if let Some(field) = self.fields.iter().find(|f| f.normalize) {
                return Err(PipelineConfigError::MissingVocabulary(field.target.clone()));
            }
        }
        Ok(())
    }

    /// The merge strategy in effect for `field`, resolving the per-field
    /// override against `defaults.merge_strategy`, which itself falls back
    /// to `preserve`.
    pub fn effective_strategy(&self, field: &FieldMapping) -> MergeStrategy {
        field
            .strategy
            .or(self.defaults.merge_strategy)
            .unwrap_or_default()
    }

    /// The dotted target key for `field`, prefixed by `defaults.namespace`
    /// when configured.
    pub fn effective_target(&self, field: &FieldMapping) -> String {
        match &self.defaults.namespace {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}.{}", field.target),
            _ => field.target.clone(),
        }
    }
}
