//! The mutable accumulator behind `RequestBuilder`.
//!
//! # Design
//! `RequestSpec` records everything a call site says about a request. Setters
//! never return errors; the first mistake is stored and reported by
//! `RequestBuilder::build`, which keeps chains unbroken. The param-assembly
//! hook receives `&mut RequestSpec`, so common parameters are added through
//! the same API as per-call ones.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::body::{Body, BodyKind, FormField};
use crate::cache::{CacheMode, CacheStrategy};
use crate::error::BuildError;
use crate::headers::Headers;
use crate::http::{non_zero, HttpMethod, Timeouts};
use crate::url::{PathParam, QueryParam};

pub const RANGE_HEADER: &str = "Range";
pub const CACHE_CONTROL_HEADER: &str = "Cache-Control";

#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: HttpMethod,
    url: String,
    paths: Vec<PathParam>,
    query: Vec<QueryParam>,
    headers: Headers,
    body: Option<Body>,
    cache: CacheStrategy,
    timeouts: Timeouts,
    download_offset: Option<u64>,
    tag: Option<String>,
    assembly_enabled: bool,
    decoder_enabled: bool,
    error: Option<BuildError>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            paths: Vec::new(),
            query: Vec::new(),
            headers: Headers::new(),
            body: None,
            cache: CacheStrategy::default(),
            timeouts: Timeouts::default(),
            download_offset: None,
            tag: None,
            assembly_enabled: true,
            decoder_enabled: true,
            error: None,
        }
    }

    /// Record a build error. Only the first one is kept.
    pub fn fail(&mut self, error: BuildError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn record(&mut self, result: Result<(), BuildError>) {
        if let Err(error) = result {
            self.fail(error);
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        self.error.as_ref()
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// URL as given, before domain, path, and query resolution.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    // ----- path -----

    pub fn add_path(&mut self, name: impl Into<String>, value: impl ToString) {
        self.paths.push(PathParam {
            name: name.into(),
            value: value.to_string(),
            encoded: false,
        });
    }

    pub fn add_encoded_path(&mut self, name: impl Into<String>, value: impl ToString) {
        self.paths.push(PathParam {
            name: name.into(),
            value: value.to_string(),
            encoded: true,
        });
    }

    pub fn paths(&self) -> &[PathParam] {
        &self.paths
    }

    // ----- query -----

    pub fn add_query(&mut self, key: impl Into<String>, value: impl ToString) {
        self.push_query(key.into(), Some(value.to_string()), false);
    }

    pub fn add_encoded_query(&mut self, key: impl Into<String>, value: impl ToString) {
        self.push_query(key.into(), Some(value.to_string()), true);
    }

    /// Query key without a value, rendered as `?key`.
    pub fn add_query_key(&mut self, key: impl Into<String>) {
        self.push_query(key.into(), None, false);
    }

    pub fn add_all_query<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: ToString,
    {
        for (key, value) in pairs {
            self.add_query(key, value);
        }
    }

    pub fn add_all_encoded_query<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: ToString,
    {
        for (key, value) in pairs {
            self.add_encoded_query(key, value);
        }
    }

    fn push_query(&mut self, key: String, value: Option<String>, encoded: bool) {
        self.query.push(QueryParam {
            key,
            value,
            encoded,
        });
    }

    pub fn query(&self) -> &[QueryParam] {
        &self.query
    }

    // ----- headers -----

    pub fn add_header(&mut self, name: &str, value: &str) {
        let result = self.headers.add(name, value);
        self.record(result);
    }

    pub fn add_header_line(&mut self, line: &str) {
        let result = self.headers.add_line(line);
        self.record(result);
    }

    pub fn add_non_ascii_header(&mut self, name: &str, value: &str) {
        let result = self.headers.add_non_ascii(name, value);
        self.record(result);
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        let result = self.headers.set(name, value);
        self.record(result);
    }

    pub fn set_non_ascii_header(&mut self, name: &str, value: &str) {
        let result = self.headers.set_non_ascii(name, value);
        self.record(result);
    }

    pub fn add_all_header<K, V>(&mut self, headers: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self.add_header(name.as_ref(), value.as_ref());
        }
    }

    pub fn set_all_header<K, V>(&mut self, headers: impl IntoIterator<Item = (K, V)>)
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self.set_header(name.as_ref(), value.as_ref());
        }
    }

    pub fn remove_all_header(&mut self, name: &str) {
        self.headers.remove_all(name);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// `Range: bytes=start-[end]`. An `end` before `start` means "to EOF".
    /// With `connect_last_progress`, `start` is also recorded as the offset a
    /// progress reporter should resume from.
    pub fn set_range_header(&mut self, start: u64, end: Option<u64>, connect_last_progress: bool) {
        let value = match end.filter(|end| *end >= start) {
            Some(end) => format!("bytes={start}-{end}"),
            None => format!("bytes={start}-"),
        };
        self.set_header(RANGE_HEADER, &value);
        if connect_last_progress {
            self.download_offset = Some(start);
        }
    }

    pub fn download_offset(&self) -> Option<u64> {
        self.download_offset
    }

    // ----- body -----

    /// Body of `kind`, created empty on first use. `None` after recording a
    /// conflict or a body on a body-less method.
    fn body_of(&mut self, kind: BodyKind) -> Option<&mut Body> {
        if !self.method.permits_body() {
            self.fail(BuildError::BodyNotAllowed {
                method: self.method,
            });
            return None;
        }
        if let Some(existing) = self.body.as_ref().map(Body::kind) {
            if existing != kind {
                self.fail(BuildError::ConflictingBodyType {
                    existing,
                    requested: kind,
                });
                return None;
            }
        }
        Some(self.body.get_or_insert_with(|| Body::empty(kind)))
    }

    /// Replace the body. A body of a different kind already present is a
    /// `ConflictingBodyType` error.
    pub fn set_body(&mut self, body: Body) {
        if let Some(slot) = self.body_of(body.kind()) {
            *slot = body;
        }
    }

    pub fn set_raw_body(&mut self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) {
        self.set_body(Body::Raw {
            bytes: bytes.into(),
            content_type: content_type.into(),
        });
    }

    pub fn add_form(&mut self, key: impl Into<String>, value: impl ToString) {
        self.push_form(key.into(), value.to_string(), false);
    }

    pub fn add_encoded_form(&mut self, key: impl Into<String>, value: impl ToString) {
        self.push_form(key.into(), value.to_string(), true);
    }

    fn push_form(&mut self, key: String, value: String, encoded: bool) {
        if let Some(Body::Form(fields)) = self.body_of(BodyKind::Form) {
            fields.push(FormField {
                key,
                value,
                encoded,
            });
        }
    }

    /// Set `key` in the JSON object body.
    pub fn add_json<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.insert_json(key.into(), value),
            Err(e) => self.fail(BuildError::InvalidJson(e.to_string())),
        }
    }

    /// Set `key` to a JSON value given as text, e.g. `{"city":"Suzhou"}`.
    pub fn add_json_element(&mut self, key: impl Into<String>, json: &str) {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => self.insert_json(key.into(), value),
            Err(e) => self.fail(BuildError::InvalidJson(e.to_string())),
        }
    }

    /// Merge every member of a JSON object given as text.
    pub fn add_all_json(&mut self, json: &str) {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(members)) => {
                for (key, value) in members {
                    self.insert_json(key, value);
                }
            }
            Ok(other) => self.fail(BuildError::InvalidJson(format!(
                "expected a json object, got {other}"
            ))),
            Err(e) => self.fail(BuildError::InvalidJson(e.to_string())),
        }
    }

    fn insert_json(&mut self, key: String, value: Value) {
        if let Some(Body::Json(members)) = self.body_of(BodyKind::Json) {
            members.insert(key, value);
        }
    }

    /// Append one element to the JSON array body.
    pub fn push_json<T: Serialize + ?Sized>(&mut self, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.push_json_value(value),
            Err(e) => self.fail(BuildError::InvalidJson(e.to_string())),
        }
    }

    /// Append one element given as JSON text.
    pub fn push_json_element(&mut self, json: &str) {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => self.push_json_value(value),
            Err(e) => self.fail(BuildError::InvalidJson(e.to_string())),
        }
    }

    pub fn extend_json_array<T: Serialize>(&mut self, values: impl IntoIterator<Item = T>) {
        for value in values {
            self.push_json(&value);
        }
    }

    fn push_json_value(&mut self, value: Value) {
        if let Some(Body::JsonArray(items)) = self.body_of(BodyKind::JsonArray) {
            items.push(value);
        }
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    // ----- cache -----

    pub fn cache_strategy(&self) -> &CacheStrategy {
        &self.cache
    }

    pub fn set_cache_strategy(&mut self, strategy: CacheStrategy) {
        self.cache = strategy;
    }

    pub fn set_cache_mode(&mut self, mode: CacheMode) {
        self.cache.mode = mode;
    }

    pub fn set_cache_key(&mut self, key: impl Into<String>) {
        self.cache.key = Some(key.into());
    }

    pub fn set_cache_valid_time(&mut self, valid_time: Duration) {
        self.cache.valid_time = Some(valid_time);
    }

    pub fn cache_control(&mut self, directive: &str) {
        self.set_header(CACHE_CONTROL_HEADER, directive);
    }

    // ----- timeouts -----

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.timeouts.connect = non_zero(timeout);
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.timeouts.read = non_zero(timeout);
    }

    pub fn set_write_timeout(&mut self, timeout: Duration) {
        self.timeouts.write = non_zero(timeout);
    }

    // ----- flags -----

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    pub fn is_assembly_enabled(&self) -> bool {
        self.assembly_enabled
    }

    pub fn set_assembly_enabled(&mut self, enabled: bool) {
        self.assembly_enabled = enabled;
    }

    pub fn is_decoder_enabled(&self) -> bool {
        self.decoder_enabled
    }

    pub fn set_decoder_enabled(&mut self, enabled: bool) {
        self.decoder_enabled = enabled;
    }
}
