//! Run configuration shared by the converter, sampler, and migration paths.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{IoResultExt, KbError, Result};

/// Generic schema/annotation predicates that never describe facts.
pub const DEFAULT_NON_FACTUAL_PREDICATES: &[&str] = &[
    "rdfs:domain",
    "domain",
    "rdfs:range",
    "range",
    "rdfs:subClassOf",
    "subClassOf",
    "rdfs:subPropertyOf",
    "subPropertyOf",
    "rdfs:label",
    "label",
    "rdfs:comment",
    "comment",
    "rdfs:isDefinedBy",
    "isDefinedBy",
    "rdfs:seeAlso",
    "seeAlso",
];

/// Names of the type/class relation, in priority order.
pub const DEFAULT_CATEGORY_PREDICATES: &[&str] = &["rdf:type", "type"];

/// Maximum number of dictionary entries per `map<k>.tsv` chunk.
pub const DEFAULT_MAP_CHUNK_SIZE: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    /// Predicates dropped before internalization.
    pub non_factual_predicates: Vec<String>,
    /// Candidate names of the category relation; the first one present wins.
    pub category_predicates: Vec<String>,
    /// Entries per dictionary chunk file.
    pub map_chunk_size: usize,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            non_factual_predicates: DEFAULT_NON_FACTUAL_PREDICATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            category_predicates: DEFAULT_CATEGORY_PREDICATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            map_chunk_size: DEFAULT_MAP_CHUNK_SIZE,
        }
    }
}

impl KbConfig {
    /// Load a config from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).at(path)?;
        let config: KbConfig =
            serde_json::from_str(&text).map_err(|source| KbError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.map_chunk_size == 0 {
            return Err(KbError::Config("map_chunk_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn is_non_factual(&self, predicate: &str) -> bool {
        self.non_factual_predicates.iter().any(|p| p == predicate)
    }
}
