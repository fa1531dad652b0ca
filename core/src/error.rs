//! Error types for request building and execution.
//!
//! # Design
//! Mistakes made while assembling a request are recorded as a `BuildError`
//! and surfaced by `RequestBuilder::build`, so a fluent chain never has to be
//! broken up with `?`. Those errors are `Clone` because a frozen builder keeps
//! reporting the same failure on every call. Everything that happens after
//! the descriptor exists (transport, status, decoding) lands in `Error`.

use thiserror::Error;

use crate::body::BodyKind;
use crate::http::HttpMethod;

/// Call-site mistakes detected while assembling a request. Never retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The URL references `{name}` but no value was supplied for it.
    #[error("missing value for path parameter `{name}`")]
    MissingPathParam { name: String },

    /// A `"Name: value"` header line had no colon or an empty name.
    #[error("malformed header line `{line}`")]
    MalformedHeader { line: String },

    /// A header name or value contains characters not allowed on the wire.
    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// A second body kind was attached to a request that already has one.
    #[error("request body is already {existing}, cannot switch to {requested}")]
    ConflictingBodyType {
        existing: BodyKind,
        requested: BodyKind,
    },

    /// `GET` and `HEAD` requests cannot carry a body.
    #[error("{method} requests cannot carry a body")]
    BodyNotAllowed { method: HttpMethod },

    /// The URL is still relative after default-domain resolution.
    #[error("url `{url}` is relative and no domain is configured")]
    RelativeUrl { url: String },

    /// `set_domain_to` named a domain the config does not know.
    #[error("unknown domain `{name}`")]
    UnknownDomain { name: String },

    /// `set_named_converter` named a converter the config does not know.
    #[error("unknown converter `{name}`")]
    UnknownConverter { name: String },

    /// A JSON fragment handed to the builder failed to parse or serialize.
    #[error("invalid json: {0}")]
    InvalidJson(String),
}

/// Errors returned by request execution and response decoding.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be built.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// Opaque failure from the transport (network, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body could not be decoded into the requested type.
    #[error("decode failed: {reason}")]
    Decode { reason: String, payload: Vec<u8> },

    /// A value could not be encoded by the selected converter.
    #[error("encode failed: {0}")]
    Encode(String),

    /// `OnlyCache` was requested and nothing valid is stored under `key`.
    #[error("no cached response for key {key}")]
    CacheMiss { key: String },
}

impl Error {
    /// Wrap any transport-side failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(err))
    }

    pub(crate) fn decode(reason: impl ToString, payload: &[u8]) -> Self {
        Error::Decode {
            reason: reason.to_string(),
            payload: payload.to_vec(),
        }
    }
}
