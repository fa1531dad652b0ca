//! Fluent HTTP request builder with pluggable converters and cache policy.
//!
//! # Overview
//! A `RequestBuilder` accumulates method, URL template, path and query
//! parameters, headers, body, cache policy, and timeout overrides, then
//! freezes them into an immutable `HttpRequest`. An injected `Transport`
//! performs the round-trip; a `Converter` decodes the response. The core
//! never opens sockets itself (host-does-IO pattern), so everything up to
//! the transport call is deterministic and testable.
//!
//! # Design
//! - `ClientConfig` is built once and shared as `Arc`; it replaces any
//!   process-wide registry.
//! - Build errors are deferred: setters record the first failure and
//!   `build()` reports it.
//! - Interceptors are declared on the descriptor and executed by
//!   `InterceptorChain`, which wraps any transport.
//! - `UreqTransport` (feature `ureq`) is the bundled blocking transport.

pub mod body;
pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod converter;
pub mod error;
pub mod headers;
pub mod http;
pub mod interceptor;
pub mod spec;
pub mod transport;
pub mod url;

pub use body::{Body, BodyKind, FormField};
pub use builder::RequestBuilder;
pub use cache::{CacheMode, CacheStore, CacheStrategy};
pub use client::HttpClient;
pub use config::{ClientConfig, ClientConfigBuilder, ClientSettings};
pub use converter::{Converter, ConverterKind, CustomConverter};
pub use error::{BuildError, Error};
pub use headers::Headers;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Timeouts};
pub use interceptor::{Interceptor, InterceptorChain};
pub use spec::RequestSpec;
pub use transport::Transport;
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
pub use url::resolve_domain;
