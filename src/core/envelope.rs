//! Tagged message envelope exchanged over the stream.
//!
//! On the wire an envelope is a JSON object whose `"Action"` member is the
//! tag; every other member is a field. The same shape serves requests,
//! responses and unsolicited pushes.

use serde_json::{Map, Value};

use super::constants::{FIELD_ACTION, FIELD_DESC, FIELD_ERROR, FIELD_ID, FIELD_RESULT};
use super::error::{DecodeError, RpcError};

/// A tagged message.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    tag: String,
    fields: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope with the given tag and fields.
    pub fn new(tag: impl Into<String>, fields: Map<String, Value>) -> Self {
        let mut fields = fields;
        fields.remove(FIELD_ACTION);
        Self {
            tag: tag.into(),
            fields,
        }
    }

    /// Create a request envelope carrying a correlation id.
    pub fn request(method: impl Into<String>, id: u64, params: Map<String, Value>) -> Self {
        let mut envelope = Self::new(method, params);
        envelope.fields.insert(FIELD_ID.to_owned(), Value::from(id));
        envelope
    }

    /// Parse an envelope from its wire text.
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(DecodeError::NotAnObject);
        };
        let tag = match fields.remove(FIELD_ACTION) {
            Some(Value::String(tag)) => tag,
            Some(_) => return Err(DecodeError::InvalidTag),
            None => return Err(DecodeError::MissingTag),
        };
        Ok(Self { tag, fields })
    }

    /// Encode to wire text.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(FIELD_ACTION.to_owned(), Value::String(self.tag.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        serde_json::to_string(&Value::Object(object))
    }

    /// The tag (method name or push kind).
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// All fields except the tag.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// A single field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// A string field.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Correlation id, if the envelope carries one.
    pub fn id(&self) -> Option<u64> {
        self.fields.get(FIELD_ID).and_then(Value::as_u64)
    }

    /// Embedded error code; absent means success.
    pub fn error_code(&self) -> i64 {
        self.fields
            .get(FIELD_ERROR)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Embedded error description.
    pub fn error_description(&self) -> &str {
        self.str_field(FIELD_DESC).unwrap_or_default()
    }

    /// Result payload.
    pub fn result(&self) -> Option<&Value> {
        self.fields.get(FIELD_RESULT)
    }

    /// Consume a response: fail on a non-zero error code, else yield the result.
    pub fn into_result(mut self) -> Result<Value, RpcError> {
        let code = self.error_code();
        if code != 0 {
            return Err(RpcError::Remote {
                code,
                description: self.error_description().to_owned(),
            });
        }
        Ok(self.fields.remove(FIELD_RESULT).unwrap_or(Value::Null))
    }
}
