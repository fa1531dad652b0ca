//! Entry points that start a request against a shared configuration.
//!
//! # Design
//! `HttpClient` holds only an `Arc<ClientConfig>` and carries no mutable
//! state between calls. Each factory returns a fresh `RequestBuilder`; the
//! `_form`, `_json`, and `_json_array` variants lock the body kind up front
//! so a mismatched setter later fails the build instead of silently
//! switching encodings.

use std::sync::Arc;

use crate::body::{Body, BodyKind};
use crate::builder::RequestBuilder;
use crate::config::ClientConfig;
use crate::http::HttpMethod;

#[derive(Debug, Clone)]
pub struct HttpClient {
    config: Arc<ClientConfig>,
}

macro_rules! body_factories {
    ($($name:ident => $method:ident, $kind:ident;)*) => {
        $(
            pub fn $name(&self, url: impl Into<String>) -> RequestBuilder {
                self.with_body(HttpMethod::$method, url, BodyKind::$kind)
            }
        )*
    };
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::from_arc(Arc::new(config))
    }

    pub fn from_arc(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub fn request(&self, method: HttpMethod, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Arc::clone(&self.config), method, url)
    }

    pub fn get(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Get, url)
    }

    pub fn head(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Head, url)
    }

    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Post, url)
    }

    pub fn put(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Put, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Patch, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(HttpMethod::Delete, url)
    }

    body_factories! {
        post_form => Post, Form;
        put_form => Put, Form;
        patch_form => Patch, Form;
        delete_form => Delete, Form;
        post_json => Post, Json;
        put_json => Put, Json;
        patch_json => Patch, Json;
        delete_json => Delete, Json;
        post_json_array => Post, JsonArray;
        put_json_array => Put, JsonArray;
        patch_json_array => Patch, JsonArray;
        delete_json_array => Delete, JsonArray;
    }

    fn with_body(&self, method: HttpMethod, url: impl Into<String>, kind: BodyKind) -> RequestBuilder {
        self.request(method, url).set_body(Body::empty(kind))
    }
}
