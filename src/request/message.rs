use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use log::{info, warn};
use serde_json::Value;

use crate::request::DownsampleRequest;

/// included launch plan, the workflow's "Test Data" fixture
static TEST_DATA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/launch_plans/test_data.json"));

#[derive(Debug)]
pub enum MessageError {
    JSONValidationError(Vec<String>),
    JSONDecodeError,
    DeserialisationError(String),
    MessageReadError,
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessageError::JSONValidationError(errors) => write!(f, "message fails validation: {}", errors.join("; ")),
            MessageError::JSONDecodeError => write!(f, "message is not valid JSON"),
            MessageError::DeserialisationError(reason) => {
                write!(f, "message can't be deserialised into a request: {reason}")
            }
            MessageError::MessageReadError => write!(f, "message can't be read"),
        }
    }
}

impl std::error::Error for MessageError {}

/// A JSON request message on disk, checked against the compiled request schema
pub struct Message<'a> {
    pub path: PathBuf,
    pub compiled_schema: &'a JSONSchema,
}

impl Message<'_> {
    pub fn read(&self) -> Result<DownsampleRequest, MessageError> {
        let json_string = self.read_file()?;
        parse(self.compiled_schema, &json_string)
    }

    fn read_file(&self) -> Result<String, MessageError> {
        let path: &Path = self.path.as_path();
        info!("Reading message at {}", path.display());
        fs::read_to_string(path).map_err(|err| {
            warn!("Can't read message request at path {}: {}", path.display(), err);
            MessageError::MessageReadError
        })
    }
}

/// The bundled "Test Data" launch plan
pub fn test_data(compiled_schema: &JSONSchema) -> Result<DownsampleRequest, MessageError> {
    info!("Loading bundled test data launch plan");
    parse(compiled_schema, TEST_DATA)
}

/// Parse, validate, then deserialise a raw message
pub fn parse(compiled_schema: &JSONSchema, json_string: &str) -> Result<DownsampleRequest, MessageError> {
    let json: Value = parse_untyped_json(json_string)?;

    match validate(compiled_schema, &json) {
        Ok(_) => {
            info!("Message is valid");
            parse_json(json)
        }
        Err(err) => {
            warn!("Message fails validation");
            Err(err)
        }
    }
}

fn validate(compiled_schema: &JSONSchema, json: &Value) -> Result<(), MessageError> {
    info!("Validating raw message against JSON schema");
    compiled_schema.validate(json).map_err(|errors| {
        let errors: Vec<String> = errors
            .map(|err| format!("{} at {}", err, err.instance_path))
            .collect();
        for err in &errors {
            warn!("{err}");
        }
        MessageError::JSONValidationError(errors)
    })
}

fn parse_json(value: Value) -> Result<DownsampleRequest, MessageError> {
    info!("Deserialising valid JSON into typed Rust object");
    // from_value is a generic function, so request DownsampleRequest specifically
    serde_json::from_value::<DownsampleRequest>(value).map_err(|err| {
        warn!("Can't deserialise message: {err}");
        MessageError::DeserialisationError(err.to_string())
    })
}

fn parse_untyped_json(json_string: &str) -> Result<Value, MessageError> {
    info!("Parsing JSON into untyped structure");
    // from_str is a generic function, so request Value (generic json) specifically
    serde_json::from_str::<Value>(json_string)
        .map_err(|_| MessageError::JSONDecodeError)
}
