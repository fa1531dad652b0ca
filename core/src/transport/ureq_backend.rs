//! Blocking transport backed by `ureq`.
//!
//! Status codes are never turned into errors so the builder can interpret
//! them. Each distinct set of effective timeouts gets one agent, kept for
//! reuse so its connection pool survives across requests. Response bodies
//! are read without ureq's default size cap unless `body_limit` sets one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use ureq::http;
use ureq::Agent;

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse, Timeouts};
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    defaults: Timeouts,
    agents: Arc<Mutex<HashMap<Timeouts, Agent>>>,
    body_limit: u64,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(Timeouts::default())
    }
}

impl UreqTransport {
    pub fn new(defaults: Timeouts) -> Self {
        Self {
            agent: agent_for(defaults),
            defaults,
            agents: Arc::new(Mutex::new(HashMap::new())),
            body_limit: u64::MAX,
        }
    }

    /// Fail responses whose body exceeds `limit` bytes.
    pub fn body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    fn agent(&self, timeouts: Timeouts) -> Agent {
        let wanted = timeouts.or(self.defaults);
        if wanted == self.defaults {
            return self.agent.clone();
        }
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        agents
            .entry(wanted)
            .or_insert_with(|| {
                debug!(?wanted, "building agent with request timeouts");
                agent_for(wanted)
            })
            .clone()
    }

    fn extra_agents(&self) -> usize {
        self.agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn agent_for(timeouts: Timeouts) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_connect(timeouts.connect)
        .timeout_recv_body(timeouts.read)
        .timeout_recv_response(timeouts.read)
        .timeout_send_body(timeouts.write)
        .build()
        .new_agent()
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let agent = self.agent(request.timeouts);

        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = match &request.body {
            Some(body) => agent.run(builder.body(body.as_slice()).map_err(Error::transport)?),
            None => agent.run(builder.body(()).map_err(Error::transport)?),
        }
        .map_err(Error::transport)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.body_limit)
            .read_to_vec()
            .map_err(Error::transport)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
