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

//! Schema Validator.

pub mod validator;

pub use validator::{SchemaError, SchemaRegistry};

const PAGES_SCHEMA: &str = include_str!("schemas/pages.schema.json");
const EDGES_SCHEMA: &str = include_str!("schemas/edges.schema.json");
const ASSETS_SCHEMA: &str = include_str!("schemas/assets.schema.json");
const ACCESSIBILITY_SCHEMA: &str = include_str!("schemas/accessibility.schema.json");
const CONSOLE_SCHEMA: &str = include_str!("schemas/console.schema.json");
const STYLES_SCHEMA: &str = include_str!("schemas/styles.schema.json");
const DOM_SNAPSHOTS_SCHEMA: &str = include_str!("schemas/dom_snapshots.schema.json");
const ERRORS_SCHEMA: &str = include_str!("schemas/errors.schema.json");
const PROVENANCE_SCHEMA: &str = include_str!("schemas/provenance.schema.json");

/// Builds the registry every dataset in the archive validates against,
/// with schema URIs matching the `schemas/<name>.schema.json` layout
/// written into the archive by the Archive Finalizer.
pub fn build_registry() -> Result<SchemaRegistry, SchemaError> {
    let mut registry = SchemaRegistry::new();
    registry.register("pages", "schemas/pages.schema.json", PAGES_SCHEMA)?;
    registry.register("edges", "schemas/edges.schema.json", EDGES_SCHEMA)?;
    registry.register("assets", "schemas/assets.schema.json", ASSETS_SCHEMA)?;
    registry.register(
        "accessibility",
        "schemas/accessibility.schema.json",
        ACCESSIBILITY_SCHEMA,
    )?;
    registry.register("console", "schemas/console.schema.json", CONSOLE_SCHEMA)?;
    registry.register("styles", "schemas/styles.schema.json", STYLES_SCHEMA)?;
    registry.register(
        "dom_snapshots",
        "schemas/dom_snapshots.schema.json",
        DOM_SNAPSHOTS_SCHEMA,
    )?;
    registry.register("errors", "schemas/errors.schema.json", ERRORS_SCHEMA)?;
    registry.register(
        "provenance",
        "schemas/provenance.schema.json",
        PROVENANCE_SCHEMA,
    )?;
    Ok(registry)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_dataset_schema_compiles() {
        let registry = build_registry().unwrap();
        for dataset in [
            "pages",
            "edges",
            "assets",
            "accessibility",
            "console",
            "styles",
            "dom_snapshots",
            "errors",
            "provenance",
        ] {
            assert!(registry.schema_uri(dataset).is_some());
            assert!(registry.schema_hash(dataset).is_some());
        }
    }
}
