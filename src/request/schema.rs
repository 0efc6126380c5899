use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use jsonschema::{JSONSchema, SchemaResolver, SchemaResolverError};
use serde_json::Value;
use url::Url;

/// included request schema, the root document
static REQUEST_SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/request.json"));
/// included directive schema, referenced from the request schema
static DIRECTIVE_SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/directive.json"));

pub fn load_schema() -> Result<JSONSchema> {
    let schema_json: Value = serde_json::from_str(REQUEST_SCHEMA).context("Bundled request schema is valid JSON")?;
    compile_schema(&schema_json)
}

fn compile_schema(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::options()
        .with_resolver(BundledResolver)
        .compile(schema)
        .map_err(|err| anyhow!("Invalid request schema: {err}"))
}

/*
The request schema holds relative references to the other bundled documents. Without an $id they
resolve against the json-schema:/// base, so only that scheme is served, from memory.
*/
struct BundledResolver;

impl SchemaResolver for BundledResolver {
    fn resolve(&self, _root_schema: &Value, url: &Url, _original_reference: &str) -> Result<Arc<Value>, SchemaResolverError> {
        match url.scheme() {
            "json-schema" => {
                let document = match url.path().trim_start_matches('/') {
                    "directive.json" => DIRECTIVE_SCHEMA,
                    other => return Err(anyhow!("no bundled schema called {other}")),
                };
                Ok(Arc::new(serde_json::from_str(document)?))
            }
            _ => Err(anyhow!("scheme is not supported"))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bundled_schema_compiles() {
        assert!(load_schema().is_ok());
    }

    #[test]
    fn parameter_rules() {
        let schema = load_schema().unwrap();
        let valid = json!({"r1": "a_R1.fq", "r2": "a_R2.fq", "out_dir": "runA", "out_reads": 10});
        assert!(schema.is_valid(&valid));
        let rate = json!({"r1": "a_R1.fq", "r2": "a_R2.fq", "out_dir": "runA", "sample_rate": 0.5});
        assert!(schema.is_valid(&rate));

        let leading_slash = json!({"r1": "a_R1.fq", "r2": "a_R2.fq", "out_dir": "/runA", "out_reads": 10});
        assert!(!schema.is_valid(&leading_slash));
        let zero_reads = json!({"r1": "a_R1.fq", "r2": "a_R2.fq", "out_dir": "runA", "out_reads": 0});
        assert!(!schema.is_valid(&zero_reads));
        let big_rate = json!({"r1": "a_R1.fq", "r2": "a_R2.fq", "out_dir": "runA", "sample_rate": 1.5});
        assert!(!schema.is_valid(&big_rate));
        let both = json!({"r1": "a_R1.fq", "r2": "a_R2.fq", "out_dir": "runA", "out_reads": 10, "sample_rate": 0.5});
        assert!(!schema.is_valid(&both));
        let neither = json!({"r1": "a_R1.fq", "r2": "a_R2.fq", "out_dir": "runA"});
        assert!(!schema.is_valid(&neither));
    }
}
