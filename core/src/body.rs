//! Request payloads.
//!
//! # Design
//! A request carries at most one body kind. The JSON kinds stay as
//! `serde_json` trees until build time so the selected `Converter` decides
//! the wire format. Form bodies are always URL-encoded here.

use std::fmt;

use serde_json::{Map, Value};

use crate::url::encode;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Raw,
    Form,
    Json,
    JsonArray,
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BodyKind::Raw => "raw",
            BodyKind::Form => "form",
            BodyKind::Json => "json",
            BodyKind::JsonArray => "json array",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub key: String,
    pub value: String,
    pub encoded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Raw { bytes: Vec<u8>, content_type: String },
    Form(Vec<FormField>),
    Json(Map<String, Value>),
    JsonArray(Vec<Value>),
}

impl Body {
    pub fn kind(&self) -> BodyKind {
        match self {
            Body::Raw { .. } => BodyKind::Raw,
            Body::Form(_) => BodyKind::Form,
            Body::Json(_) => BodyKind::Json,
            Body::JsonArray(_) => BodyKind::JsonArray,
        }
    }

    /// Empty body of the given kind, used when a helper locks the kind in.
    pub fn empty(kind: BodyKind) -> Body {
        match kind {
            BodyKind::Raw => Body::Raw {
                bytes: Vec::new(),
                content_type: "application/octet-stream".to_string(),
            },
            BodyKind::Form => Body::Form(Vec::new()),
            BodyKind::Json => Body::Json(Map::new()),
            BodyKind::JsonArray => Body::JsonArray(Vec::new()),
        }
    }
}

/// `k=v&k2=v2` with the same unreserved-set encoding as query strings.
pub fn encode_form(fields: &[FormField]) -> String {
    fields
        .iter()
        .map(|f| format!("{}={}", encode(&f.key, f.encoded), encode(&f.value, f.encoded)))
        .collect::<Vec<_>>()
        .join("&")
}
