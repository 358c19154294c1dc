//! Remote client for the PDDIKTI public search API.
//!
//! Both calls are best-effort: every request waits a fixed delay first,
//! and any transport, status or validation failure comes back as
//! [`Fetched::Absent`] with the reason attached instead of an error.

use std::fmt::Write;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use ureq::Agent;

use crate::error::SchemaError;
use crate::models::{DetailRecord, SearchSummary};
use crate::schema;

pub const DEFAULT_BASE_URL: &str = "https://api-pddikti.kemdiktisaintek.go.id";
pub const DEFAULT_DELAY_MS: u64 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const ORIGIN: &str = "https://pddikti.kemdiktisaintek.go.id";
const REFERER: &str = "https://pddikti.kemdiktisaintek.go.id/";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Wait applied before every request.
    pub delay: Duration,
    pub timeout: Duration,
    pub origin: String,
    pub referer: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            origin: ORIGIN.to_string(),
            referer: REFERER.to_string(),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `PDDIKTI_BASE_URL` and `PDDIKTI_DELAY_MS`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            std::env::var("PDDIKTI_BASE_URL").ok(),
            std::env::var("PDDIKTI_DELAY_MS").ok(),
        )
    }

    pub fn with_overrides(mut self, base_url: Option<String>, delay_ms: Option<String>) -> Self {
        if let Some(base_url) = base_url {
            let trimmed = base_url.trim().trim_end_matches('/');
            if !trimmed.is_empty() {
                self.base_url = trimmed.to_string();
            }
        }
        if let Some(raw) = delay_ms {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.delay = Duration::from_millis(ms),
                Err(err) => warn!("ignoring PDDIKTI_DELAY_MS={raw:?}: {err}"),
            }
        }
        self
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Origin", self.origin.clone()),
            ("Referer", self.referer.clone()),
            ("User-Agent", self.user_agent.clone()),
        ]
    }
}

/// Why a remote call produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("unreadable response body: {0}")]
    Body(String),
    #[error(transparent)]
    Invalid(#[from] SchemaError),
}

/// Outcome of a best-effort remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Found(T),
    Absent(FetchFailure),
}

impl<T> Fetched<T> {
    /// Drops the failure reason.
    pub fn found(self) -> Option<T> {
        match self {
            Fetched::Found(value) => Some(value),
            Fetched::Absent(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match self {
            Fetched::Found(_) => None,
            Fetched::Absent(reason) => Some(reason),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Fetched::Found(_))
    }
}

/// The two remote lookups the pipeline and the tool server depend on.
#[async_trait]
pub trait StudentSource: Send + Sync {
    async fn search(&self, query: &str) -> Fetched<Vec<SearchSummary>>;

    async fn get_detail(&self, id: &str) -> Fetched<DetailRecord>;
}

pub struct PddiktiClient {
    config: ClientConfig,
    agent: Agent,
}

impl PddiktiClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { config, agent }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}/pencarian/mhs/{}",
            self.config.base_url,
            encode_component(query)
        )
    }

    pub fn detail_url(&self, id: &str) -> String {
        format!("{}/detail/mhs/{}", self.config.base_url, id)
    }

    async fn get_json(&self, url: String) -> Result<Value, FetchFailure> {
        tokio::time::sleep(self.config.delay).await;

        debug!("GET {url}");
        let agent = self.agent.clone();
        let headers = self.config.headers();
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url, &headers))
            .await
            .map_err(|err| FetchFailure::Transport(format!("request task failed: {err}")))?
    }
}

#[async_trait]
impl StudentSource for PddiktiClient {
    async fn search(&self, query: &str) -> Fetched<Vec<SearchSummary>> {
        info!("searching for: {query}");

        let outcome = self
            .get_json(self.search_url(query))
            .await
            .and_then(|payload| schema::parse_search_results(payload).map_err(FetchFailure::from));

        match outcome {
            Ok(results) => {
                info!("found {} students for {query}", results.len());
                Fetched::Found(results)
            }
            Err(reason) => {
                warn!("error searching for {query}: {reason}");
                Fetched::Absent(reason)
            }
        }
    }

    async fn get_detail(&self, id: &str) -> Fetched<DetailRecord> {
        let outcome = self
            .get_json(self.detail_url(id))
            .await
            .and_then(|payload| schema::parse_detail(payload).map_err(FetchFailure::from));

        match outcome {
            Ok(detail) => Fetched::Found(detail),
            Err(reason) => {
                warn!("error fetching detail for ID {id}: {reason}");
                Fetched::Absent(reason)
            }
        }
    }
}

fn fetch_blocking(
    agent: &Agent,
    url: &str,
    headers: &[(&'static str, String)],
) -> Result<Value, FetchFailure> {
    let mut request = agent.get(url);
    for (name, value) in headers {
        request = request.header(*name, value.as_str());
    }

    let response = request.call().map_err(|err| match err {
        ureq::Error::StatusCode(code) => FetchFailure::Status(code),
        other => FetchFailure::Transport(other.to_string()),
    })?;

    let body = response
        .into_body()
        .read_to_string()
        .map_err(|err| FetchFailure::Body(err.to_string()))?;

    serde_json::from_str(&body).map_err(|err| FetchFailure::Body(format!("not JSON: {err}")))
}

/// Percent-encode a path segment the way browsers' `encodeURIComponent` does.
pub fn encode_component(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => {
                let _ = write!(encoded, "%{byte:02X}");
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Read, Write as _};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Instant;

    use super::*;

    struct Received {
        at: Instant,
        request_line: String,
        headers: HashMap<String, String>,
    }

    /// Answer one connection per canned `(status, body)` pair, in order.
    fn canned_upstream(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Received>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (sender, receiver) = mpsc::channel();

        std::thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut head = Vec::new();
                let mut buffer = [0u8; 1024];
                while !head.windows(4).any(|window| window == b"\r\n\r\n") {
                    let read = stream.read(&mut buffer).unwrap();
                    if read == 0 {
                        break;
                    }
                    head.extend_from_slice(&buffer[..read]);
                }
                let at = Instant::now();

                let head = String::from_utf8_lossy(&head).to_string();
                let mut lines = head.split("\r\n");
                let request_line = lines.next().unwrap_or_default().to_string();
                let headers = lines
                    .filter_map(|line| line.split_once(':'))
                    .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_string()))
                    .collect();
                let _ = sender.send(Received {
                    at,
                    request_line,
                    headers,
                });

                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });

        (base_url, receiver)
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_component("Joko Kehutanan UGM"), "Joko%20Kehutanan%20UGM");
        assert_eq!(encode_component("a/b?c=d&e"), "a%2Fb%3Fc%3Dd%26e");
        assert_eq!(encode_component("it's (ok)!~*"), "it's%20(ok)!~*");
        assert_eq!(encode_component("é"), "%C3%A9");
    }

    #[test]
    fn builds_search_and_detail_urls() {
        let client = PddiktiClient::new(ClientConfig::default());
        assert_eq!(
            client.search_url("Bahlil UI"),
            "https://api-pddikti.kemdiktisaintek.go.id/pencarian/mhs/Bahlil%20UI"
        );
        assert_eq!(
            client.detail_url("abc=="),
            "https://api-pddikti.kemdiktisaintek.go.id/detail/mhs/abc=="
        );
    }

    #[test]
    fn overrides_trim_base_url_and_parse_delay() {
        let config = ClientConfig::default().with_overrides(
            Some("http://localhost:8080/".to_string()),
            Some("25".to_string()),
        );
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.delay, Duration::from_millis(25));
    }

    #[test]
    fn invalid_overrides_keep_defaults() {
        let config = ClientConfig::default()
            .with_overrides(Some("   ".to_string()), Some("soon".to_string()));
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn sends_browser_header_triple() {
        let headers = ClientConfig::default().headers();
        let names: Vec<&str> = headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["Origin", "Referer", "User-Agent"]);
        assert_eq!(headers[0].1, ORIGIN);
        assert!(headers[2].1.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn fetched_exposes_value_or_reason() {
        let found: Fetched<u8> = Fetched::Found(3);
        assert!(found.is_found());
        assert_eq!(found.failure(), None);
        assert_eq!(found.found(), Some(3));

        let absent: Fetched<u8> = Fetched::Absent(FetchFailure::Status(404));
        assert_eq!(absent.failure(), Some(&FetchFailure::Status(404)));
        assert_eq!(absent.found(), None);
    }

    #[tokio::test]
    async fn unreachable_upstream_degrades_to_absent() {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            delay: Duration::ZERO,
            timeout: Duration::from_secs(2),
            ..ClientConfig::default()
        };
        let client = PddiktiClient::new(config);

        let search = client.search("Joko").await;
        assert!(matches!(search, Fetched::Absent(_)));
        assert_eq!(search.found().unwrap_or_default(), Vec::new());

        let detail = client.get_detail("s1").await;
        assert!(!detail.is_found());
    }

    #[tokio::test]
    async fn status_and_shape_failures_come_back_absent() {
        let (base_url, requests) = canned_upstream(vec![
            (500, ""),
            (200, r#"[{"id":1}]"#),
            (200, r#"{"x":1}"#),
            (500, ""),
            (200, r#"{"x":1}"#),
        ]);
        let delay = Duration::from_millis(50);
        let client = PddiktiClient::new(ClientConfig {
            base_url,
            delay,
            timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        });
        let next = || requests.recv_timeout(Duration::from_secs(5)).unwrap();

        let started = Instant::now();
        assert_eq!(
            client.search("Joko UGM").await,
            Fetched::Absent(FetchFailure::Status(500))
        );
        let received = next();
        assert!(received.at.duration_since(started) >= delay);
        assert!(
            received.request_line.starts_with("GET /pencarian/mhs/Joko%20UGM "),
            "{}",
            received.request_line
        );
        assert_eq!(received.headers["origin"], ORIGIN);
        assert_eq!(received.headers["referer"], REFERER);
        assert_eq!(received.headers["user-agent"], USER_AGENT);

        let search = client.search("Joko UGM").await;
        assert!(
            matches!(search, Fetched::Absent(FetchFailure::Invalid(_))),
            "{search:?}"
        );
        next();

        let search = client.search("Joko UGM").await;
        assert!(
            matches!(search, Fetched::Absent(FetchFailure::Invalid(_))),
            "{search:?}"
        );
        next();

        let started = Instant::now();
        assert_eq!(
            client.get_detail("abc").await,
            Fetched::Absent(FetchFailure::Status(500))
        );
        let received = next();
        assert!(received.at.duration_since(started) >= delay);
        assert!(received.request_line.starts_with("GET /detail/mhs/abc "));
        assert_eq!(received.headers["user-agent"], USER_AGENT);

        let detail = client.get_detail("abc").await;
        assert!(
            matches!(detail, Fetched::Absent(FetchFailure::Invalid(_))),
            "{detail:?}"
        );
        next();
    }
}
