//! In-memory collaborators for unit tests

use crate::crawler::transport::{RawResponse, Transport, TransportError};
use crate::url::Resolver;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub type Scripted = Result<RawResponse, TransportError>;

/// Transport answering from per-URL scripts
///
/// Each URL has a queue of responses; the last one repeats once the queue is
/// down to a single entry. Unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn route(&self, url: &str, responses: Vec<Scripted>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
    }

    pub fn page(&self, url: &str, html: &str) {
        self.route(url, vec![Ok(RawResponse::new(200, html))]);
    }

    pub fn redirect(&self, url: &str, location: &str) {
        self.route(
            url,
            vec![Ok(RawResponse::new(302, "").with_header("location", location))],
        );
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url, _timeout: Duration) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url.as_str()) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok(RawResponse::new(404, "not found")),
        }
    }
}

/// Resolver mapping every name to a public address unless overridden
pub struct StaticResolver {
    overrides: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn public() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    pub fn with(mut self, host: &str, ips: &[&str]) -> Self {
        let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
        self.overrides.insert(host.to_string(), ips);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        match self.overrides.get(host) {
            Some(ips) if ips.is_empty() => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no such host",
            )),
            Some(ips) => Ok(ips.clone()),
            None => Ok(vec!["93.184.216.34".parse().unwrap()]),
        }
    }
}
