//! Body converters.
//!
//! # Design
//! The built-in codecs use serde directly so typed decoding keeps full
//! fidelity (XML numbers stay numbers). Host-specific formats plug in through
//! `CustomConverter`, which works on a `serde_json::Value` tree and is
//! bridged to typed values with `serde_json::{to_value, from_value}`.

use std::fmt;
use std::sync::Arc;

use serde::de::value::{Error as ValueError, SeqDeserializer, StringDeserializer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

const XML_ROOT: &str = "root";
const XML_ITEM: &str = "item";

/// Codec supplied by the host for formats the built-ins do not cover.
pub trait CustomConverter: Send + Sync + fmt::Debug {
    fn content_type(&self) -> &str;
    fn encode(&self, value: &Value) -> Result<Vec<u8>, Error>;
    fn decode(&self, body: &[u8]) -> Result<Value, Error>;
}

/// Serializes request bodies and deserializes response bodies.
#[derive(Debug, Clone, Default)]
pub enum Converter {
    #[default]
    Json,
    Xml,
    /// UTF-8 text. Strings are sent as-is; other values as JSON text.
    Text,
    /// Raw bytes. Decodes into `Vec<u8>`; encodes byte arrays and strings.
    Bytes,
    Custom(Arc<dyn CustomConverter>),
}

/// Serde-friendly selector for the built-in converters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    #[default]
    Json,
    Xml,
    Text,
    Bytes,
}

impl From<ConverterKind> for Converter {
    fn from(kind: ConverterKind) -> Self {
        match kind {
            ConverterKind::Json => Converter::Json,
            ConverterKind::Xml => Converter::Xml,
            ConverterKind::Text => Converter::Text,
            ConverterKind::Bytes => Converter::Bytes,
        }
    }
}

impl Converter {
    pub fn custom(converter: impl CustomConverter + 'static) -> Self {
        Converter::Custom(Arc::new(converter))
    }

    pub fn content_type(&self) -> &str {
        match self {
            Converter::Json => "application/json; charset=utf-8",
            Converter::Xml => "application/xml; charset=utf-8",
            Converter::Text => "text/plain; charset=utf-8",
            Converter::Bytes => "application/octet-stream",
            Converter::Custom(custom) => custom.content_type(),
        }
    }

    pub fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, Error>
    where
        T: Serialize + ?Sized,
    {
        match self {
            Converter::Json => serde_json::to_vec(value).map_err(|e| Error::Encode(e.to_string())),
            Converter::Xml => {
                let value = to_tree(value)?;
                let xml = match value {
                    Value::Array(items) => {
                        let mut wrapper = serde_json::Map::new();
                        wrapper.insert(XML_ITEM.to_string(), Value::Array(items));
                        quick_xml::se::to_string_with_root(XML_ROOT, &wrapper)
                    }
                    other => quick_xml::se::to_string_with_root(XML_ROOT, &other),
                }
                .map_err(|e| Error::Encode(e.to_string()))?;
                Ok(xml.into_bytes())
            }
            Converter::Text => match to_tree(value)? {
                Value::String(text) => Ok(text.into_bytes()),
                other => Ok(other.to_string().into_bytes()),
            },
            Converter::Bytes => match to_tree(value)? {
                Value::String(text) => Ok(text.into_bytes()),
                Value::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|n| u8::try_from(n).ok())
                            .ok_or_else(|| Error::Encode(format!("{item} is not a byte")))
                    })
                    .collect(),
                other => Err(Error::Encode(format!("cannot send {other} as raw bytes"))),
            },
            Converter::Custom(custom) => custom.encode(&to_tree(value)?),
        }
    }

    pub fn deserialize<T>(&self, body: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        match self {
            Converter::Json => serde_json::from_slice(body).map_err(|e| Error::decode(e, body)),
            Converter::Xml => {
                let text = std::str::from_utf8(body).map_err(|e| Error::decode(e, body))?;
                quick_xml::de::from_str(text).map_err(|e| Error::decode(e, body))
            }
            Converter::Text => {
                let text = String::from_utf8(body.to_vec()).map_err(|e| Error::decode(e, body))?;
                T::deserialize(StringDeserializer::<ValueError>::new(text))
                    .map_err(|e| Error::decode(e, body))
            }
            Converter::Bytes => {
                T::deserialize(SeqDeserializer::<_, ValueError>::new(body.iter().copied()))
                    .map_err(|e| Error::decode(e, body))
            }
            Converter::Custom(custom) => {
                let tree = custom.decode(body)?;
                serde_json::from_value(tree).map_err(|e| Error::decode(e, body))
            }
        }
    }
}

fn to_tree<T: Serialize + ?Sized>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::Encode(e.to_string()))
}
