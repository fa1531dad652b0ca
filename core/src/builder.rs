//! Fluent request builder.
//!
//! # Design
//! `RequestBuilder` wraps a `RequestSpec` plus the shared `ClientConfig`.
//! Chained setters consume and return `self`; terminal operations take
//! `&mut self` so the built descriptor stays with the builder. `build()`
//! memoises its result: calling it again returns the same descriptor, and
//! setters called after that point are ignored with a warning. Execution
//! always goes through an `InterceptorChain` over the config's cache store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::body::{encode_form, Body, FORM_CONTENT_TYPE};
use crate::cache::{default_cache_key, CacheMode, CacheStrategy};
use crate::config::ClientConfig;
use crate::converter::Converter;
use crate::error::{BuildError, Error};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::interceptor::{Interceptor, InterceptorChain};
use crate::spec::RequestSpec;
use crate::transport::Transport;
use crate::url::{append_query, is_absolute, resolve_domain, substitute_paths};

const CONTENT_TYPE: &str = "Content-Type";

#[must_use = "RequestBuilder does nothing until .build() or .execute() is called"]
#[derive(Clone)]
pub struct RequestBuilder {
    config: Arc<ClientConfig>,
    spec: RequestSpec,
    converter: Converter,
    transport: Option<Arc<dyn Transport>>,
    request: Option<HttpRequest>,
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("spec", &self.spec)
            .field("converter", &self.converter)
            .field("own_transport", &self.transport.is_some())
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    pub fn new(config: Arc<ClientConfig>, method: HttpMethod, url: impl Into<String>) -> Self {
        let mut spec = RequestSpec::new(method, url);
        spec.set_cache_strategy(CacheStrategy {
            mode: config.cache_mode,
            key: None,
            valid_time: config.cache_valid_time,
        });
        Self {
            converter: config.converter.clone(),
            config,
            spec,
            transport: None,
            request: None,
        }
    }

    fn edit(mut self, f: impl FnOnce(&mut RequestSpec)) -> Self {
        if let Some(request) = &self.request {
            warn!(url = %request.url, "request already built, ignoring change");
        } else {
            f(&mut self.spec);
        }
        self
    }

    pub fn spec(&self) -> &RequestSpec {
        &self.spec
    }

    pub fn method(&self) -> HttpMethod {
        self.spec.method()
    }

    /// URL as given, before domain, path, and query resolution.
    pub fn simple_url(&self) -> &str {
        self.spec.url()
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn is_built(&self) -> bool {
        self.request.is_some()
    }

    // ----- url -----

    pub fn set_url(self, url: impl Into<String>) -> Self {
        self.edit(|s| s.set_url(url))
    }

    pub fn add_path(self, name: impl Into<String>, value: impl ToString) -> Self {
        self.edit(|s| s.add_path(name, value))
    }

    pub fn add_encoded_path(self, name: impl Into<String>, value: impl ToString) -> Self {
        self.edit(|s| s.add_encoded_path(name, value))
    }

    pub fn add_query(self, key: impl Into<String>, value: impl ToString) -> Self {
        self.edit(|s| s.add_query(key, value))
    }

    pub fn add_encoded_query(self, key: impl Into<String>, value: impl ToString) -> Self {
        self.edit(|s| s.add_encoded_query(key, value))
    }

    pub fn add_query_key(self, key: impl Into<String>) -> Self {
        self.edit(|s| s.add_query_key(key))
    }

    pub fn add_all_query<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.edit(|s| s.add_all_query(pairs))
    }

    pub fn add_all_encoded_query<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.edit(|s| s.add_all_encoded_query(pairs))
    }

    /// Prefix the URL with `domain` unless it is already absolute.
    pub fn set_domain_if_absent(self, domain: &str) -> Self {
        self.edit(|s| {
            let url = resolve_domain(s.url(), domain);
            s.set_url(url);
        })
    }

    /// Prefix the URL with the config's domain registered under `name`.
    pub fn set_domain_to(self, name: &str) -> Self {
        let domain = self.config.named_domain(name).map(str::to_string);
        self.edit(|s| match domain {
            Some(domain) => {
                let url = resolve_domain(s.url(), &domain);
                s.set_url(url);
            }
            None => s.fail(BuildError::UnknownDomain {
                name: name.to_string(),
            }),
        })
    }

    // ----- headers -----

    pub fn add_header(self, name: &str, value: &str) -> Self {
        self.edit(|s| s.add_header(name, value))
    }

    /// Append a `"Name: value"` line.
    pub fn add_header_line(self, line: &str) -> Self {
        self.edit(|s| s.add_header_line(line))
    }

    pub fn add_non_ascii_header(self, name: &str, value: &str) -> Self {
        self.edit(|s| s.add_non_ascii_header(name, value))
    }

    pub fn set_header(self, name: &str, value: &str) -> Self {
        self.edit(|s| s.set_header(name, value))
    }

    pub fn set_non_ascii_header(self, name: &str, value: &str) -> Self {
        self.edit(|s| s.set_non_ascii_header(name, value))
    }

    pub fn add_all_header<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.edit(|s| s.add_all_header(headers))
    }

    pub fn set_all_header<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.edit(|s| s.set_all_header(headers))
    }

    pub fn remove_all_header(self, name: &str) -> Self {
        self.edit(|s| s.remove_all_header(name))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.spec.header(name)
    }

    /// Resume or slice a download. `end = None` reads to EOF.
    pub fn set_range_header(self, start: u64, end: Option<u64>, connect_last_progress: bool) -> Self {
        self.edit(|s| s.set_range_header(start, end, connect_last_progress))
    }

    // ----- body -----

    pub fn set_body(self, body: Body) -> Self {
        self.edit(|s| s.set_body(body))
    }

    pub fn set_raw_body(self, bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        self.edit(|s| s.set_raw_body(bytes, content_type))
    }

    pub fn add_form(self, key: impl Into<String>, value: impl ToString) -> Self {
        self.edit(|s| s.add_form(key, value))
    }

    pub fn add_encoded_form(self, key: impl Into<String>, value: impl ToString) -> Self {
        self.edit(|s| s.add_encoded_form(key, value))
    }

    pub fn add_json<T: Serialize + ?Sized>(self, key: impl Into<String>, value: &T) -> Self {
        self.edit(|s| s.add_json(key, value))
    }

    pub fn add_json_element(self, key: impl Into<String>, json: &str) -> Self {
        self.edit(|s| s.add_json_element(key, json))
    }

    pub fn add_all_json(self, json: &str) -> Self {
        self.edit(|s| s.add_all_json(json))
    }

    pub fn push_json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        self.edit(|s| s.push_json(value))
    }

    pub fn push_json_element(self, json: &str) -> Self {
        self.edit(|s| s.push_json_element(json))
    }

    pub fn extend_json_array<T: Serialize>(self, values: impl IntoIterator<Item = T>) -> Self {
        self.edit(|s| s.extend_json_array(values))
    }

    // ----- cache / timeouts / misc -----

    pub fn set_cache_mode(self, mode: CacheMode) -> Self {
        self.edit(|s| s.set_cache_mode(mode))
    }

    pub fn set_cache_key(self, key: impl Into<String>) -> Self {
        self.edit(|s| s.set_cache_key(key))
    }

    pub fn set_cache_valid_time(self, valid_time: Duration) -> Self {
        self.edit(|s| s.set_cache_valid_time(valid_time))
    }

    pub fn cache_control(self, directive: &str) -> Self {
        self.edit(|s| s.cache_control(directive))
    }

    pub fn connect_timeout(self, timeout: Duration) -> Self {
        self.edit(|s| s.set_connect_timeout(timeout))
    }

    pub fn read_timeout(self, timeout: Duration) -> Self {
        self.edit(|s| s.set_read_timeout(timeout))
    }

    pub fn write_timeout(self, timeout: Duration) -> Self {
        self.edit(|s| s.set_write_timeout(timeout))
    }

    pub fn tag(self, tag: impl Into<String>) -> Self {
        self.edit(|s| s.set_tag(tag))
    }

    /// Whether the config's param-assembly hook runs for this request.
    pub fn set_assembly_enabled(self, enabled: bool) -> Self {
        self.edit(|s| s.set_assembly_enabled(enabled))
    }

    /// Whether the config's result decoder runs on this response.
    pub fn set_decoder_enabled(self, enabled: bool) -> Self {
        self.edit(|s| s.set_decoder_enabled(enabled))
    }

    pub fn set_converter(mut self, converter: Converter) -> Self {
        if self.request.is_some() {
            warn!("request already built, ignoring converter change");
        } else {
            self.converter = converter;
        }
        self
    }

    /// Send this request through `transport` instead of the config's. The
    /// config's cache store still applies.
    pub fn set_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        if self.request.is_some() {
            warn!("request already built, ignoring transport change");
        } else {
            self.transport = Some(transport);
        }
        self
    }

    pub fn set_xml_converter(self) -> Self {
        self.set_converter(Converter::Xml)
    }

    pub fn set_named_converter(self, name: &str) -> Self {
        let converter = self.config.converters.get(name).cloned();
        match converter {
            Some(converter) => self.set_converter(converter),
            None => self.edit(|s| {
                s.fail(BuildError::UnknownConverter {
                    name: name.to_string(),
                })
            }),
        }
    }

    // ----- build -----

    /// Resolve the immutable descriptor. The first successful call is
    /// memoised; later calls return it unchanged.
    pub fn build(&mut self) -> Result<&HttpRequest, Error> {
        let request = match self.request.take() {
            Some(request) => request,
            None => {
                let request = self.assemble()?;
                debug!(
                    method = %request.method,
                    url = %request.url,
                    cache_mode = ?request.cache.mode,
                    "request built"
                );
                request
            }
        };
        Ok(self.request.insert(request))
    }

    fn assemble(&self) -> Result<HttpRequest, Error> {
        let mut spec = self.spec.clone();
        if spec.is_assembly_enabled() {
            if let Some(hook) = &self.config.param_assembly {
                hook(&mut spec);
            }
        }
        if let Some(error) = spec.error() {
            return Err(error.clone().into());
        }

        let mut url = spec.url().to_string();
        if let Some(domain) = self.config.domain() {
            url = resolve_domain(&url, domain);
        }
        let url = substitute_paths(&url, spec.paths())?;
        if !is_absolute(&url) {
            return Err(BuildError::RelativeUrl { url }.into());
        }
        let url = append_query(&url, spec.query());

        let (body, content_type) = match spec.body() {
            None => (None, None),
            Some(Body::Raw {
                bytes,
                content_type,
            }) => (Some(bytes.clone()), Some(content_type.clone())),
            Some(Body::Form(fields)) => (
                Some(encode_form(fields).into_bytes()),
                Some(FORM_CONTENT_TYPE.to_string()),
            ),
            Some(Body::Json(members)) => (
                Some(self.converter.serialize(members)?),
                Some(self.converter.content_type().to_string()),
            ),
            Some(Body::JsonArray(items)) => (
                Some(self.converter.serialize(items)?),
                Some(self.converter.content_type().to_string()),
            ),
        };

        let mut headers = spec.headers().clone();
        if let Some(content_type) = content_type {
            if !headers.contains(CONTENT_TYPE) {
                headers.add_non_ascii(CONTENT_TYPE, &content_type)?;
            }
        }

        let mut cache = spec.cache_strategy().clone();
        if cache.key.is_none() {
            cache.key = Some(default_cache_key(spec.method(), &url, body.as_deref()));
        }

        let mut interceptors = Vec::new();
        if self.config.is_debug() {
            interceptors.push(Interceptor::Log);
        }
        if cache.uses_cache() {
            interceptors.push(Interceptor::Cache);
        }

        Ok(HttpRequest {
            method: spec.method(),
            url,
            headers: headers.to_vec(),
            body,
            cache,
            timeouts: spec.timeouts().or(self.config.timeouts()),
            interceptors,
            download_offset: spec.download_offset(),
            tag: spec.tag().map(str::to_string),
        })
    }

    // ----- execute -----

    /// Send the request and return the raw response, whatever its status.
    pub fn execute(&mut self) -> Result<HttpResponse, Error> {
        let transport = match &self.transport {
            Some(transport) => Arc::clone(transport),
            None => Arc::clone(self.config.transport()),
        };
        let chain = InterceptorChain::with_cache(transport, Arc::clone(self.config.cache_store()));
        let request = self.build()?;
        debug!(method = %request.method, url = %request.url, "executing");
        chain.execute(request)
    }

    /// Body as text. Non-2xx statuses fail with `HttpStatus`.
    pub fn execute_str(&mut self) -> Result<String, Error> {
        let body = self.execute_success()?;
        String::from_utf8(body).map_err(|e| Error::decode(&e, e.as_bytes()))
    }

    /// Body decoded with this request's converter.
    pub fn execute_class<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let body = self.execute_success()?;
        self.converter.deserialize(&body)
    }

    pub fn execute_list<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, Error> {
        self.execute_class::<Vec<T>>()
    }

    fn execute_success(&mut self) -> Result<Vec<u8>, Error> {
        let response = check_status(self.execute()?)?;
        match &self.config.result_decoder {
            Some(decoder) if self.spec.is_decoder_enabled() => decoder(response.body),
            _ => Ok(response.body),
        }
    }
}

fn check_status(response: HttpResponse) -> Result<HttpResponse, Error> {
    if response.is_success() {
        return Ok(response);
    }
    Err(Error::HttpStatus {
        status: response.status,
        body: response.text(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the last request and answers with a canned response.
    struct Canned {
        response: HttpResponse,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.as_bytes().to_vec(),
                },
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transport for Canned {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    fn config(transport: Arc<Canned>) -> Arc<ClientConfig> {
        Arc::new(ClientConfig::builder(transport).domain("http://x.com/").build())
    }

    fn get(url: &str) -> RequestBuilder {
        RequestBuilder::new(config(Canned::new(200, "{}")), HttpMethod::Get, url)
    }

    fn post(url: &str) -> RequestBuilder {
        RequestBuilder::new(config(Canned::new(200, "{}")), HttpMethod::Post, url)
    }

    #[test]
    fn build_resolves_domain_paths_and_query() {
        let mut builder = get("/article/list/{page}/json")
            .add_path("page", 0)
            .add_query("k", "性能优化")
            .add_query_key("debug");
        let request = builder.build().unwrap();
        assert_eq!(
            request.url,
            "http://x.com/article/list/0/json?k=%E6%80%A7%E8%83%BD%E4%BC%98%E5%8C%96&debug"
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn build_is_memoised() {
        let mut builder = get("/a").add_query("page", 1);
        let first = builder.build().unwrap().clone();
        let first_ptr: *const HttpRequest = builder.build().unwrap();
        let second_ptr: *const HttpRequest = builder.build().unwrap();
        assert_eq!(first_ptr, second_ptr);
        assert_eq!(&first, builder.build().unwrap());
    }

    #[test]
    fn changes_after_build_are_ignored() {
        let mut builder = get("/a");
        let before = builder.build().unwrap().clone();
        let mut builder = builder.add_query("late", 1).set_header("X-Late", "1");
        assert_eq!(builder.build().unwrap(), &before);
        assert!(builder.spec().query().is_empty());
    }

    #[test]
    fn change_after_build_emits_warning() {
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct WarningCapture {
            warnings: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                if *event.metadata().level() == tracing::Level::WARN {
                    let mut visitor = MessageVisitor(String::new());
                    event.record(&mut visitor);
                    self.warnings.lock().unwrap().push(visitor.0);
                }
            }
        }

        struct MessageVisitor(String);
        impl tracing::field::Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = format!("{value:?}");
                }
            }
        }

        let capture = WarningCapture::default();
        let warnings = Arc::clone(&capture.warnings);
        let subscriber = tracing_subscriber::registry().with(capture);

        tracing::subscriber::with_default(subscriber, || {
            let mut builder = get("/a");
            builder.build().unwrap();
            let _ = builder.add_query("late", 1);
        });

        let captured = warnings.lock().unwrap();
        assert!(
            captured.iter().any(|w| w.contains("already built")),
            "expected an already-built warning, got: {:?}",
            *captured
        );
    }

    #[test]
    fn missing_path_param_fails_build() {
        let err = get("/article/{page}").build().unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::MissingPathParam { ref name }) if name == "page"
        ));
    }

    #[test]
    fn conflicting_body_fails_build() {
        let err = post("/a")
            .add_form("k", "v")
            .push_json(&json!({"name": "张三"}))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::ConflictingBodyType { .. })
        ));
    }

    #[test]
    fn failed_build_is_not_memoised() {
        let mut builder = get("/a/{id}");
        assert!(builder.build().is_err());
        assert!(!builder.is_built());
        let mut builder = builder.add_path("id", 7);
        assert_eq!(builder.build().unwrap().url, "http://x.com/a/7");
    }

    #[test]
    fn malformed_header_line_fails_build() {
        let err = get("/a").add_header_line("NoColonHere").build().unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::MalformedHeader { .. })));
    }

    #[test]
    fn relative_url_without_domain_fails() {
        let config = Arc::new(ClientConfig::builder(Canned::new(200, "")).build());
        let err = RequestBuilder::new(config, HttpMethod::Get, "a/b")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::RelativeUrl { .. })));
    }

    #[test]
    fn form_body_gets_form_content_type() {
        let mut builder = post("/article/query/0/json").add_form("k", "a b");
        let request = builder.build().unwrap();
        assert_eq!(request.body.as_deref(), Some(&b"k=a%20b"[..]));
        assert_eq!(request.header("content-type"), Some(FORM_CONTENT_TYPE));
    }

    #[test]
    fn json_body_uses_converter() {
        let mut builder = post("/a").add_json("name", "张三").add_json("sex", &1);
        let request = builder.build().unwrap();
        let body: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "张三", "sex": 1}));
        assert_eq!(request.header("Content-Type"), Some("application/json; charset=utf-8"));
    }

    #[test]
    fn xml_converter_encodes_json_tree() {
        let mut builder = post("/a").add_json("name", "张三").set_xml_converter();
        let request = builder.build().unwrap();
        assert_eq!(
            request.body.as_deref(),
            Some("<root><name>张三</name></root>".as_bytes())
        );
        assert_eq!(request.header("Content-Type"), Some("application/xml; charset=utf-8"));
    }

    #[test]
    fn explicit_content_type_wins() {
        let mut builder = post("/a")
            .set_header("Content-Type", "application/vnd.api+json")
            .add_json("a", &1);
        let request = builder.build().unwrap();
        let content_types: Vec<&str> = request
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(content_types, vec!["application/vnd.api+json"]);
    }

    #[test]
    fn only_network_installs_no_cache_interceptor() {
        let mut builder = get("/a");
        let request = builder.build().unwrap();
        assert!(!request.has_interceptor(Interceptor::Cache));
        assert!(request.cache.key.is_some());
    }

    #[test]
    fn cache_mode_installs_cache_interceptor() {
        let mut builder = get("/a")
            .set_cache_mode(CacheMode::ReadCacheFailedRequestNetwork)
            .set_cache_valid_time(Duration::from_secs(60));
        let request = builder.build().unwrap();
        assert!(request.has_interceptor(Interceptor::Cache));
        assert_eq!(request.cache.valid_time, Some(Duration::from_secs(60)));
    }

    #[test]
    fn explicit_cache_key_is_kept() {
        let mut builder = get("/a")
            .set_cache_mode(CacheMode::OnlyCache)
            .set_cache_key("articles");
        assert_eq!(builder.build().unwrap().cache.key.as_deref(), Some("articles"));
    }

    #[test]
    fn debug_config_installs_log_interceptor() {
        let config = Arc::new(
            ClientConfig::builder(Canned::new(200, ""))
                .domain("http://x.com")
                .debug(true)
                .build(),
        );
        let mut builder = RequestBuilder::new(config, HttpMethod::Get, "/a");
        assert_eq!(builder.build().unwrap().interceptors, vec![Interceptor::Log]);
    }

    #[test]
    fn request_timeouts_override_config() {
        let config = Arc::new(
            ClientConfig::builder(Canned::new(200, ""))
                .domain("http://x.com")
                .connect_timeout(Duration::from_secs(10))
                .read_timeout(Duration::from_secs(10))
                .build(),
        );
        let mut builder = RequestBuilder::new(config, HttpMethod::Get, "/a")
            .read_timeout(Duration::from_secs(1))
            .write_timeout(Duration::ZERO);
        let timeouts = builder.build().unwrap().timeouts;
        assert_eq!(timeouts.connect, Some(Duration::from_secs(10)));
        assert_eq!(timeouts.read, Some(Duration::from_secs(1)));
        assert_eq!(timeouts.write, None);
    }

    #[test]
    fn range_header_tags_offset_on_descriptor() {
        let mut builder = get("/file").set_range_header(100, None, true);
        let request = builder.build().unwrap();
        assert_eq!(request.header("Range"), Some("bytes=100-"));
        assert_eq!(request.download_offset, Some(100));

        let mut builder = get("/file").set_range_header(100, None, false);
        assert_eq!(builder.build().unwrap().download_offset, None);
    }

    #[test]
    fn named_domain_and_unknown_domain() {
        let config = Arc::new(
            ClientConfig::builder(Canned::new(200, ""))
                .named_domain("update", "http://update.x.com/")
                .build(),
        );
        let mut builder =
            RequestBuilder::new(Arc::clone(&config), HttpMethod::Get, "/v1").set_domain_to("update");
        assert_eq!(builder.build().unwrap().url, "http://update.x.com/v1");

        let err = RequestBuilder::new(config, HttpMethod::Get, "/v1")
            .set_domain_to("missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::UnknownDomain { .. })));
    }

    #[test]
    fn domain_if_absent_beats_default_domain() {
        let mut builder = get("v1/users").set_domain_if_absent("https://api.y.com");
        assert_eq!(builder.build().unwrap().url, "https://api.y.com/v1/users");
    }

    #[test]
    fn assembly_hook_adds_common_params_once() {
        let transport = Canned::new(200, "");
        let config = Arc::new(
            ClientConfig::builder(Arc::clone(&transport))
                .domain("http://x.com")
                .on_param_assembly(|spec| {
                    spec.add_query("token", "abc");
                    spec.add_header("X-Platform", "rust");
                })
                .build(),
        );
        let mut builder = RequestBuilder::new(Arc::clone(&config), HttpMethod::Get, "/a");
        builder.build().unwrap();
        let request = builder.build().unwrap();
        assert_eq!(request.url, "http://x.com/a?token=abc");
        assert_eq!(request.header("x-platform"), Some("rust"));

        let mut opted_out =
            RequestBuilder::new(config, HttpMethod::Get, "/a").set_assembly_enabled(false);
        assert_eq!(opted_out.build().unwrap().url, "http://x.com/a");
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Article {
        id: u32,
        title: String,
    }

    #[test]
    fn execute_class_decodes_success() {
        let transport = Canned::new(200, r#"{"id":1,"title":"Rust"}"#);
        let mut builder = RequestBuilder::new(config(Arc::clone(&transport)), HttpMethod::Get, "/a");
        let article: Article = builder.execute_class().unwrap();
        assert_eq!(
            article,
            Article {
                id: 1,
                title: "Rust".to_string()
            }
        );
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn execute_list_decodes_arrays() {
        let transport = Canned::new(200, r#"[{"id":1,"title":"a"},{"id":2,"title":"b"}]"#);
        let mut builder = RequestBuilder::new(config(transport), HttpMethod::Get, "/a");
        let articles: Vec<Article> = builder.execute_list().unwrap();
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn execute_str_rejects_error_status() {
        let transport = Canned::new(500, "boom");
        let mut builder = RequestBuilder::new(config(transport), HttpMethod::Get, "/a");
        let err = builder.execute_str().unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 500, ref body } if body == "boom"));
    }

    #[test]
    fn execute_returns_raw_error_status() {
        let transport = Canned::new(404, "");
        let mut builder = RequestBuilder::new(config(transport), HttpMethod::Get, "/a");
        assert_eq!(builder.execute().unwrap().status, 404);
    }

    #[test]
    fn execute_class_surfaces_decode_payload() {
        let transport = Canned::new(200, "<html>");
        let mut builder = RequestBuilder::new(config(transport), HttpMethod::Get, "/a");
        let err = builder.execute_class::<Article>().unwrap_err();
        assert!(matches!(err, Error::Decode { ref payload, .. } if payload == b"<html>"));
    }

    #[test]
    fn result_decoder_runs_unless_disabled() {
        let transport = Canned::new(200, "olleh");
        let config = Arc::new(
            ClientConfig::builder(transport)
                .domain("http://x.com")
                .result_decoder(|mut body| {
                    body.reverse();
                    Ok(body)
                })
                .build(),
        );
        let mut decoded = RequestBuilder::new(Arc::clone(&config), HttpMethod::Get, "/a");
        assert_eq!(decoded.execute_str().unwrap(), "hello");

        let mut raw =
            RequestBuilder::new(config, HttpMethod::Get, "/a").set_decoder_enabled(false);
        assert_eq!(raw.execute_str().unwrap(), "olleh");
    }

    #[test]
    fn named_converter_is_selected() {
        let config = Arc::new(
            ClientConfig::builder(Canned::new(200, "plain"))
                .domain("http://x.com")
                .named_converter("text", Converter::Text)
                .build(),
        );
        let mut builder =
            RequestBuilder::new(Arc::clone(&config), HttpMethod::Get, "/a").set_named_converter("text");
        assert!(matches!(builder.converter(), Converter::Text));
        let text: String = builder.execute_class().unwrap();
        assert_eq!(text, "plain");

        let err = RequestBuilder::new(config, HttpMethod::Get, "/a")
            .set_named_converter("yaml")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::UnknownConverter { .. })));
    }

    fn header_values<'a>(request: &'a HttpRequest, name: &str) -> Vec<&'a str> {
        request
            .headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    #[test]
    fn bulk_header_setters_reach_descriptor() {
        let mut builder = get("/a")
            .add_header("X-A", "1")
            .add_all_header([("X-A", "2"), ("X-B", "3")])
            .set_all_header([("x-a", "9")])
            .remove_all_header("X-Missing");
        let request = builder.build().unwrap();
        assert_eq!(header_values(request, "X-A"), vec!["9"]);
        assert_eq!(header_values(request, "X-B"), vec!["3"]);
    }

    #[test]
    fn non_ascii_header_needs_opt_in() {
        let mut builder = get("/a")
            .set_non_ascii_header("X-Name", "李四")
            .set_non_ascii_header("X-Name", "张三");
        assert_eq!(header_values(builder.build().unwrap(), "x-name"), vec!["张三"]);

        let err = get("/a").set_header("X-Name", "张三").build().unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::InvalidHeader { .. })));
    }

    #[test]
    fn cache_control_sets_a_single_header() {
        let mut builder = get("/a").cache_control("no-cache").cache_control("max-age=60");
        assert_eq!(
            header_values(builder.build().unwrap(), "Cache-Control"),
            vec!["max-age=60"]
        );
    }

    #[test]
    fn encoded_query_and_form_are_copied_verbatim() {
        let mut builder = post("/a")
            .add_all_encoded_query([("q", "a%20b"), ("sort", "-date")])
            .add_encoded_form("k", "%E6%80%A7")
            .add_form("plain", "a b");
        let request = builder.build().unwrap();
        assert_eq!(request.url, "http://x.com/a?q=a%20b&sort=-date");
        assert_eq!(
            request.body.as_deref(),
            Some(&b"k=%E6%80%A7&plain=a%20b"[..])
        );
    }

    #[test]
    fn tag_reaches_descriptor() {
        let mut builder = get("/a").tag("article-list");
        assert_eq!(builder.build().unwrap().tag.as_deref(), Some("article-list"));
    }

    #[test]
    fn query_lands_before_fragment() {
        let mut builder = get("/a#top").add_query("k", "v");
        assert_eq!(builder.build().unwrap().url, "http://x.com/a?k=v#top");
    }

    #[test]
    fn cache_modes_work_with_a_bare_transport() {
        let transport = Canned::new(200, "net");
        let config = config(Arc::clone(&transport));

        let err = RequestBuilder::new(Arc::clone(&config), HttpMethod::Get, "/a")
            .set_cache_mode(CacheMode::OnlyCache)
            .execute_str()
            .unwrap_err();
        assert!(matches!(err, Error::CacheMiss { .. }), "unexpected error: {err:?}");
        assert!(transport.seen.lock().unwrap().is_empty());

        for _ in 0..2 {
            let body = RequestBuilder::new(Arc::clone(&config), HttpMethod::Get, "/a")
                .set_cache_mode(CacheMode::ReadCacheFailedRequestNetwork)
                .execute_str()
                .unwrap();
            assert_eq!(body, "net");
        }
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
        assert_eq!(config.cache_store().len(), 1);
    }

    #[test]
    fn request_transport_overrides_config_transport() {
        let shared = Canned::new(200, "shared");
        let own = Canned::new(200, "own");
        let config = config(Arc::clone(&shared));
        let own_transport: Arc<dyn Transport> = own.clone();

        let body = RequestBuilder::new(Arc::clone(&config), HttpMethod::Get, "/a")
            .set_transport(own_transport)
            .execute_str()
            .unwrap();
        assert_eq!(body, "own");
        assert_eq!(own.seen.lock().unwrap().len(), 1);
        assert!(shared.seen.lock().unwrap().is_empty());

        let body = RequestBuilder::new(config, HttpMethod::Get, "/a")
            .execute_str()
            .unwrap();
        assert_eq!(body, "shared");
    }
}
