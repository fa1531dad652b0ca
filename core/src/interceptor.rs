//! Declarative interceptors and the transport decorator that runs them.
//!
//! # Design
//! The builder only records which interceptors a request wants. Any
//! `Transport` wrapped in `InterceptorChain` honours them: `Log` traces the
//! exchange, `Cache` runs the `CacheMode` state machine against a shared
//! `CacheStore`. `RequestBuilder::execute` builds the chain itself over the
//! config's store; a host executing descriptors directly wraps its transport
//! the same way. The config's transport should be the bare one.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cache::{CacheMode, CacheStore, CacheStrategy};
use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interceptor {
    /// Trace request and response lines.
    Log,
    /// Read and write the response cache per the request's `CacheStrategy`.
    Cache,
}

#[derive(Debug)]
pub struct InterceptorChain<T> {
    inner: T,
    cache: Arc<CacheStore>,
}

impl<T: Transport> InterceptorChain<T> {
    pub fn new(inner: T) -> Self {
        Self::with_cache(inner, Arc::new(CacheStore::new()))
    }

    pub fn with_cache(inner: T, cache: Arc<CacheStore>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    fn network(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        if !request.has_interceptor(Interceptor::Log) {
            return self.inner.execute(request);
        }
        info!(method = %request.method, url = %request.url, "--> request");
        for (name, value) in &request.headers {
            debug!("{name}: {value}");
        }
        if let Some(body) = &request.body {
            debug!(bytes = body.len(), body = %String::from_utf8_lossy(body), "request body");
        }
        let started = Instant::now();
        let result = self.inner.execute(request);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => {
                info!(status = response.status, elapsed_ms, url = %request.url, "<-- response");
                debug!(bytes = response.body.len(), body = %response.text(), "response body");
            }
            Err(err) => warn!(elapsed_ms, url = %request.url, error = %err, "<-- failed"),
        }
        result
    }

    fn write(&self, key: &str, response: &HttpResponse) {
        if response.is_success() {
            self.cache.put(key, response);
        }
    }

    fn cached(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let strategy = &request.cache;
        let key = cache_key(strategy);

        match strategy.mode {
            CacheMode::OnlyNetwork => self.network(request),
            CacheMode::OnlyCache => {
                self.cache
                    .get(&key, strategy.valid_time)
                    .ok_or_else(|| Error::CacheMiss { key: key.clone() })
            }
            CacheMode::NetworkSuccessWriteCache => {
                let response = self.network(request)?;
                self.write(&key, &response);
                Ok(response)
            }
            CacheMode::ReadCacheFailedRequestNetwork => {
                if let Some(hit) = self.cache.get(&key, strategy.valid_time) {
                    debug!(%key, "cache hit");
                    return Ok(hit);
                }
                let response = self.network(request)?;
                self.write(&key, &response);
                Ok(response)
            }
            CacheMode::RequestNetworkFailedReadCache => match self.network(request) {
                Ok(response) => {
                    self.write(&key, &response);
                    Ok(response)
                }
                Err(err) => match self.cache.get(&key, strategy.valid_time) {
                    Some(hit) => {
                        warn!(%key, error = %err, "network failed, answering from cache");
                        Ok(hit)
                    }
                    None => Err(err),
                },
            },
        }
    }
}

/// Descriptors always carry a key after `build`; an empty key only shows up
/// when a host constructs `HttpRequest` by hand.
fn cache_key(strategy: &CacheStrategy) -> String {
    strategy.key.clone().unwrap_or_default()
}

impl<T: Transport> Transport for InterceptorChain<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        if request.has_interceptor(Interceptor::Cache) {
            self.cached(request)
        } else {
            self.network(request)
        }
    }
}
