//! The seam between request shaping and network I/O.
//!
//! The core never opens sockets. A `Transport` receives a finished
//! `HttpRequest` and returns the raw `HttpResponse`; HTTP status codes are
//! data, not errors, at this layer.

use std::sync::Arc;

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};

#[cfg(feature = "ureq")]
mod ureq_backend;

#[cfg(feature = "ureq")]
pub use self::ureq_backend::UreqTransport;

pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        (**self).execute(request)
    }
}
