//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! builder produces an `HttpRequest`, an injected `Transport` turns it into an
//! `HttpResponse`. Everything the transport needs to honour (timeouts, cache
//! policy, interceptors, resume offset) travels inside the descriptor so the
//! transport never has to look back at the builder.

use std::fmt;
use std::time::Duration;

use crate::cache::CacheStrategy;
use crate::interceptor::Interceptor;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether a request with this method may carry a body.
    pub fn permits_body(self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Head)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request timeout overrides. `None` means "use the transport default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Timeouts {
    /// Fill every unset field from `defaults`.
    pub fn or(self, defaults: Timeouts) -> Timeouts {
        Timeouts {
            connect: self.connect.or(defaults.connect),
            read: self.read.or(defaults.read),
            write: self.write.or(defaults.write),
        }
    }

    pub fn is_default(&self) -> bool {
        self.connect.is_none() && self.read.is_none() && self.write.is_none()
    }
}

/// A zero duration is how callers ask for the transport default.
pub(crate) fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

/// An HTTP request described as plain data.
///
/// Produced once by `RequestBuilder::build` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub cache: CacheStrategy,
    pub timeouts: Timeouts,
    pub interceptors: Vec<Interceptor>,
    /// Byte offset an external progress reporter should resume from.
    pub download_offset: Option<u64>,
    pub tag: Option<String>,
}

impl HttpRequest {
    /// Last value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn has_interceptor(&self, interceptor: Interceptor) -> bool {
        self.interceptors.contains(&interceptor)
    }
}

/// An HTTP response described as plain data.
///
/// Constructed by the transport after executing an `HttpRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Last match wins, the same rule as `Headers::get`.
fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
