//! Client-wide configuration, set up once at startup and shared read-only.
//!
//! # Design
//! `ClientConfig` holds what would otherwise be process globals: default
//! domain, converter, transport, timeouts, cache defaults, and the optional
//! hooks. It is immutable after `build()` and shared as `Arc<ClientConfig>`,
//! so concurrent readers need no locking. The response cache is owned here
//! too, and every request executes through an `InterceptorChain` over it, so
//! cache modes work with any bare transport. `ClientSettings` is the
//! serde-loadable subset for hosts that keep configuration in files or the
//! environment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheMode, CacheStore};
use crate::converter::{Converter, ConverterKind};
use crate::error::Error;
use crate::http::{non_zero, Timeouts};
use crate::spec::RequestSpec;
use crate::transport::Transport;

/// Hook run on every request with assembly enabled, right before build.
pub type ParamAssembly = Arc<dyn Fn(&mut RequestSpec) + Send + Sync>;

/// Transform applied to response bodies before decoding, e.g. decryption.
pub type ResultDecoder = Arc<dyn Fn(Vec<u8>) -> Result<Vec<u8>, Error> + Send + Sync>;

#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) domain: Option<String>,
    pub(crate) domains: HashMap<String, String>,
    pub(crate) converter: Converter,
    pub(crate) converters: HashMap<String, Converter>,
    pub(crate) timeouts: Timeouts,
    pub(crate) cache_mode: CacheMode,
    pub(crate) cache_valid_time: Option<Duration>,
    pub(crate) debug: bool,
    pub(crate) param_assembly: Option<ParamAssembly>,
    pub(crate) result_decoder: Option<ResultDecoder>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("cached_responses", &self.cache.len())
            .field("domain", &self.domain)
            .field("domains", &self.domains)
            .field("converter", &self.converter)
            .field("timeouts", &self.timeouts)
            .field("cache_mode", &self.cache_mode)
            .field("cache_valid_time", &self.cache_valid_time)
            .field("debug", &self.debug)
            .field("param_assembly", &self.param_assembly.is_some())
            .field("result_decoder", &self.result_decoder.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn builder(transport: impl Transport + 'static) -> ClientConfigBuilder {
        ClientConfigBuilder::new(Arc::new(transport))
    }

    /// Apply file- or env-loaded settings on top of the defaults.
    pub fn from_settings(settings: &ClientSettings, transport: impl Transport + 'static) -> ClientConfig {
        settings.apply(Self::builder(transport)).build()
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn named_domain(&self, name: &str) -> Option<&str> {
        self.domains.get(name).map(String::as_str)
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn cache_store(&self) -> &Arc<CacheStore> {
        &self.cache
    }
}

#[must_use = "ClientConfigBuilder does nothing until .build() is called"]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            config: ClientConfig {
                transport,
                cache: Arc::new(CacheStore::new()),
                domain: None,
                domains: HashMap::new(),
                converter: Converter::default(),
                converters: HashMap::new(),
                timeouts: Timeouts::default(),
                cache_mode: CacheMode::default(),
                cache_valid_time: None,
                debug: false,
                param_assembly: None,
                result_decoder: None,
            },
        }
    }

    /// Base URL prepended to relative request URLs.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.config.domain = Some(domain.into());
        self
    }

    /// Extra base URL selectable per request with `set_domain_to(name)`.
    pub fn named_domain(mut self, name: impl Into<String>, domain: impl Into<String>) -> Self {
        self.config.domains.insert(name.into(), domain.into());
        self
    }

    pub fn converter(mut self, converter: Converter) -> Self {
        self.config.converter = converter;
        self
    }

    /// Converter selectable per request with `set_named_converter(name)`.
    pub fn named_converter(mut self, name: impl Into<String>, converter: Converter) -> Self {
        self.config.converters.insert(name.into(), converter);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.connect = non_zero(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.read = non_zero(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.write = non_zero(timeout);
        self
    }

    /// Cache mode and validity used by requests that do not set their own.
    pub fn cache(mut self, mode: CacheMode, valid_time: Option<Duration>) -> Self {
        self.config.cache_mode = mode;
        self.config.cache_valid_time = valid_time;
        self
    }

    /// Share a response cache with other configs instead of a private one.
    pub fn cache_store(mut self, cache: Arc<CacheStore>) -> Self {
        self.config.cache = cache;
        self
    }

    /// Attach the log interceptor to every request.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn on_param_assembly<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestSpec) + Send + Sync + 'static,
    {
        self.config.param_assembly = Some(Arc::new(hook));
        self
    }

    pub fn result_decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(Vec<u8>) -> Result<Vec<u8>, Error> + Send + Sync + 'static,
    {
        self.config.result_decoder = Some(Arc::new(decoder));
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Serde-loadable configuration. Durations are milliseconds; zero means
/// "transport default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub domain: Option<String>,
    pub domains: HashMap<String, String>,
    pub converter: ConverterKind,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub cache_mode: CacheMode,
    pub cache_valid_time_ms: Option<u64>,
    pub debug: bool,
}

impl ClientSettings {
    /// Read `RXHTTP_*` variables, leaving unset or unparsable ones at default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(0)
        };
        Self {
            domain: lookup("RXHTTP_DOMAIN").filter(|d| !d.is_empty()),
            debug: lookup("RXHTTP_DEBUG")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            connect_timeout_ms: millis("RXHTTP_CONNECT_TIMEOUT_MS"),
            read_timeout_ms: millis("RXHTTP_READ_TIMEOUT_MS"),
            write_timeout_ms: millis("RXHTTP_WRITE_TIMEOUT_MS"),
            ..Self::default()
        }
    }

    pub fn apply(&self, builder: ClientConfigBuilder) -> ClientConfigBuilder {
        let mut builder = builder
            .converter(self.converter.into())
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .read_timeout(Duration::from_millis(self.read_timeout_ms))
            .write_timeout(Duration::from_millis(self.write_timeout_ms))
            .cache(
                self.cache_mode,
                self.cache_valid_time_ms.map(Duration::from_millis),
            )
            .debug(self.debug);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        for (name, domain) in &self.domains {
            builder = builder.named_domain(name.clone(), domain.clone());
        }
        builder
    }
}
