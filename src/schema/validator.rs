// Copyright 2024 The Atlas Crawler Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Schema Validator: validates every record against its
//! dataset's JSON Schema before it is written, and tracks the schema's own
//! content hash for the manifest's schema registry.

use crate::ids::sha256_hex;
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),
    #[error("failed to compile schema for {dataset}: {source}")]
    Compile {
        dataset: String,
        source: jsonschema::ValidationError<'static>,
    },
    #[error("record failed schema validation for {dataset}: {excerpt}")]
    Invalid { dataset: String, excerpt: String },
}

pub struct CompiledSchema {
    pub uri: String,
    pub content_hash: String,
    validator: Validator,
}

/// Holds one compiled [Validator] per dataset, addressable by dataset name.
pub struct SchemaRegistry {
    schemas: HashMap<String, CompiledSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Registers `schema_text` (a JSON Schema document) under `dataset`,
    /// addressable at `uri`. Forbidden-additional-properties is the default
    /// unless the schema text itself opts out.
    pub fn register(
        &mut self,
        dataset: &str,
        uri: &str,
        schema_text: &str,
    ) -> Result<(), SchemaError> {
        let schema_value: Value = serde_json::from_str(schema_text)
            .expect("embedded schema text must be valid JSON");
        let validator = jsonschema::validator_for(&schema_value).map_err(|e| SchemaError::Compile {
            dataset: dataset.to_string(),
            source: e.to_owned(),
        })?;
        self.schemas.insert(
            dataset.to_string(),
            CompiledSchema {
                uri: uri.to_string(),
                content_hash: sha256_hex(schema_text.as_bytes()),
                validator,
            },
        );
        Ok(())
    }

    pub fn schema_uri(&self, dataset: &str) -> Option<&str> {
        self.schemas.get(dataset).map(|s| s.uri.as_str())
    }

    pub fn schema_hash(&self, dataset: &str) -> Option<&str> {
        self.schemas.get(dataset).map(|s| s.content_hash.as_str())
    }

    pub fn validate(&self, dataset: &str, record: &Value) -> Result<(), SchemaError> {
        let compiled = self
            .schemas
            .get(dataset)
            .ok_or_else(|| SchemaError::UnknownDataset(dataset.to_string()))?;
        if let Err(first_error) = compiled.validator.validate(record) {
            let excerpt = serde_json::to_string(record)
                .unwrap_or_default()
                .chars()
                .take(256)
                .collect::<String>();
            log::warn!(
                "schema validation failed for {dataset}: {first_error} (excerpt: {excerpt})"
            );
            return Err(SchemaError::Invalid {
                dataset: dataset.to_string(),
                excerpt,
            });
        }
        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_additional_properties_by_default() {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "widgets",
                "schemas/widgets.schema.json",
                r#"{"type":"object","properties":{"name":{"type":"string"}},"required":["name"],"additionalProperties":false}"#,
            )
            .unwrap();
        assert!(registry.validate("widgets", &json!({"name": "a"})).is_ok());
        assert!(registry
            .validate("widgets", &json!({"name": "a", "extra": 1}))
            .is_err());
    }

    #[test]
    fn unknown_dataset_is_an_error() {
        let registry = SchemaRegistry::new();
        assert!(matches!(
            registry.validate("nope", &json!({})),
            Err(SchemaError::UnknownDataset(_))
        ));
    }
}
