//! Bounded-concurrency HTTP fetching for vendor listing endpoints and text sources.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
pub use reqwest::StatusCode;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{info_span, warn, Instrument};
use url::Url;

pub const CRATE_NAME: &str = "jobsekr-fetch";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid url `{0}`")]
    InvalidUrl(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("admission closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// One GET against the network. Production uses reqwest; tests script responses.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<RawResponse, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub per_host_concurrency: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: None,
            global_concurrency: 20,
            per_host_concurrency: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, FetchError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.map_error(err))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|err| self.map_error(err))?.to_vec();
        Ok(RawResponse { status, body })
    }
}

impl ReqwestTransport {
    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutcomeKind {
    Success,
    Empty,
    RateLimited,
    TransportError,
    DecodeError,
    UnexpectedError,
    NotConfigured,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 7] = [
        OutcomeKind::Success,
        OutcomeKind::Empty,
        OutcomeKind::RateLimited,
        OutcomeKind::TransportError,
        OutcomeKind::DecodeError,
        OutcomeKind::UnexpectedError,
        OutcomeKind::NotConfigured,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Empty => "empty",
            OutcomeKind::RateLimited => "rate_limited",
            OutcomeKind::TransportError => "transport_error",
            OutcomeKind::DecodeError => "decode_error",
            OutcomeKind::UnexpectedError => "unexpected_error",
            OutcomeKind::NotConfigured => "not_configured",
        }
    }

    /// Kinds that count toward a run's `errors`. 404s and skipped targets do not.
    pub fn is_error(self) -> bool {
        matches!(
            self,
            OutcomeKind::RateLimited
                | OutcomeKind::TransportError
                | OutcomeKind::DecodeError
                | OutcomeKind::UnexpectedError
        )
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of fetching one target. Every submitted target yields exactly one.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome<T> {
    Success(T),
    Empty,
    RateLimited,
    TransportError(String),
    DecodeError(String),
    UnexpectedError(String),
    NotConfigured(String),
}

impl<T> TargetOutcome<T> {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            TargetOutcome::Success(_) => OutcomeKind::Success,
            TargetOutcome::Empty => OutcomeKind::Empty,
            TargetOutcome::RateLimited => OutcomeKind::RateLimited,
            TargetOutcome::TransportError(_) => OutcomeKind::TransportError,
            TargetOutcome::DecodeError(_) => OutcomeKind::DecodeError,
            TargetOutcome::UnexpectedError(_) => OutcomeKind::UnexpectedError,
            TargetOutcome::NotConfigured(_) => OutcomeKind::NotConfigured,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TargetOutcome<U> {
        match self {
            TargetOutcome::Success(value) => TargetOutcome::Success(f(value)),
            TargetOutcome::Empty => TargetOutcome::Empty,
            TargetOutcome::RateLimited => TargetOutcome::RateLimited,
            TargetOutcome::TransportError(detail) => TargetOutcome::TransportError(detail),
            TargetOutcome::DecodeError(detail) => TargetOutcome::DecodeError(detail),
            TargetOutcome::UnexpectedError(detail) => TargetOutcome::UnexpectedError(detail),
            TargetOutcome::NotConfigured(detail) => TargetOutcome::NotConfigured(detail),
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            TargetOutcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Per-kind tally for run summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    counts: HashMap<OutcomeKind, usize>,
}

impl OutcomeCounts {
    pub fn record(&mut self, kind: OutcomeKind) {
        *self.counts.entry(kind).or_default() += 1;
    }

    pub fn get(&self, kind: OutcomeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn errors(&self) -> usize {
        OutcomeKind::ALL
            .iter()
            .filter(|k| k.is_error())
            .map(|k| self.get(*k))
            .sum()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = OutcomeKind::ALL
            .iter()
            .map(|k| format!("{}={}", k.as_str(), self.get(*k)))
            .collect::<Vec<_>>();
        f.write_str(&parts.join(" "))
    }
}

pub struct HttpFetcher {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
    global_limit: Arc<Semaphore>,
    per_host_limit: usize,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("timeout", &self.timeout)
            .field("global_available", &self.global_limit.available_permits())
            .field("per_host_limit", &self.per_host_limit)
            .finish()
    }
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: HttpClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            timeout: config.timeout,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            per_host_limit: config.per_host_concurrency.max(1),
            per_host: Mutex::new(HashMap::new()),
        }
    }

    async fn per_host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut map = self.per_host.lock().await;
        map.entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone()
    }

    /// GET under both admission ceilings and the request timeout.
    async fn admitted_get(&self, url: &Url) -> Result<RawResponse, FetchError> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        // Host first: a task queued on a busy host must not hold a global slot.
        let per_host = self.per_host_semaphore(&host).await;
        let _host = per_host.acquire().await.map_err(|_| FetchError::Closed)?;
        let _global = self
            .global_limit
            .acquire()
            .await
            .map_err(|_| FetchError::Closed)?;

        match tokio::time::timeout(self.timeout, self.transport.get(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    /// Fetch one listing endpoint and classify the response.
    pub async fn fetch_json(&self, url: &str) -> TargetOutcome<JsonValue> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => return TargetOutcome::UnexpectedError(format!("invalid url `{url}`: {err}")),
        };
        let span = info_span!("http_fetch", host = parsed.host_str().unwrap_or_default(), url);

        async {
            let resp = match self.admitted_get(&parsed).await {
                Ok(resp) => resp,
                Err(err) => {
                    warn!(error = %err, "fetch failed");
                    return TargetOutcome::TransportError(err.to_string());
                }
            };
            classify_response(resp)
        }
        .instrument(span)
        .await
    }

    /// Fetch a text source (README, list page) under the same admission control.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let span = info_span!("http_fetch", host = parsed.host_str().unwrap_or_default(), url);
        let resp = self.admitted_get(&parsed).instrument(span).await?;
        if !resp.status.is_success() {
            return Err(FetchError::HttpStatus {
                status: resp.status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&resp.body).into_owned())
    }

    /// Fetch every target concurrently and run `parse` on each decoded body.
    ///
    /// Results arrive in completion order, one per target. A panic inside `parse`
    /// is reported as `UnexpectedError` for that target only.
    pub async fn fetch_batch<K, T, F>(
        self: &Arc<Self>,
        targets: Vec<(K, String)>,
        parse: F,
    ) -> Vec<(K, TargetOutcome<T>)>
    where
        K: Clone + Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(&K, &JsonValue) -> T + Send + Sync + 'static,
    {
        let parse = Arc::new(parse);
        let mut set = JoinSet::new();
        let mut keys = HashMap::with_capacity(targets.len());

        for (key, url) in targets {
            let fetcher = Arc::clone(self);
            let parse = Arc::clone(&parse);
            let task_key = key.clone();
            let handle = set.spawn(async move {
                fetcher
                    .fetch_json(&url)
                    .await
                    .map(|raw| (*parse)(&task_key, &raw))
            });
            keys.insert(handle.id(), key);
        }

        let mut results = Vec::with_capacity(keys.len());
        while let Some(joined) = set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(err) => {
                    warn!(error = %err, "fetch task aborted");
                    (err.id(), TargetOutcome::UnexpectedError(format!("task failed: {err}")))
                }
            };
            if let Some(key) = keys.remove(&id) {
                results.push((key, outcome));
            }
        }
        results
    }
}

fn classify_response(resp: RawResponse) -> TargetOutcome<JsonValue> {
    match resp.status {
        StatusCode::NOT_FOUND => TargetOutcome::Empty,
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("rate limited");
            TargetOutcome::RateLimited
        }
        status if status.is_success() => match serde_json::from_slice::<JsonValue>(&resp.body) {
            Ok(raw) => TargetOutcome::Success(raw),
            Err(err) => {
                warn!(error = %err, "response body is not json");
                TargetOutcome::DecodeError(err.to_string())
            }
        },
        status => {
            warn!(status = status.as_u16(), "unexpected status");
            TargetOutcome::UnexpectedError(format!("http status {}", status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        routes: HashMap<String, (u16, &'static str)>,
        slow: Vec<String>,
        delay: Duration,
        global: Gauge,
        hosts: StdMutex<HashMap<String, Arc<Gauge>>>,
    }

    impl ScriptedTransport {
        fn host_gauge(&self, host: &str) -> Arc<Gauge> {
            let mut hosts = self.hosts.lock().unwrap();
            hosts.entry(host.to_string()).or_default().clone()
        }

        fn host_peak(&self, host: &str) -> usize {
            self.host_gauge(host).peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(&self, url: &Url) -> Result<RawResponse, FetchError> {
            let host = self.host_gauge(url.host_str().unwrap_or_default());
            self.global.enter();
            host.enter();
            let delay = if self.slow.iter().any(|s| s == url.as_str()) {
                Duration::from_secs(5)
            } else {
                self.delay
            };
            tokio::time::sleep(delay).await;
            host.leave();
            self.global.leave();

            if url.path().contains("refused") {
                return Err(FetchError::Transport("connection refused".to_string()));
            }
            let (status, body) = self
                .routes
                .get(url.as_str())
                .copied()
                .unwrap_or((200, "[]"));
            Ok(RawResponse::new(
                StatusCode::from_u16(status).unwrap(),
                body.as_bytes().to_vec(),
            ))
        }
    }

    fn config(global: usize, per_host: usize, timeout: Duration) -> HttpClientConfig {
        HttpClientConfig {
            timeout,
            user_agent: None,
            global_concurrency: global,
            per_host_concurrency: per_host,
        }
    }

    #[tokio::test]
    async fn admission_respects_global_and_per_host_ceilings() {
        let transport = Arc::new(ScriptedTransport {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let fetcher = Arc::new(HttpFetcher::with_transport(
            config(4, 3, Duration::from_secs(2)),
            transport.clone(),
        ));

        let targets = (0..24)
            .map(|i| {
                let host = if i % 2 == 0 { "a.example" } else { "b.example" };
                (i, format!("https://{host}/jobs/{i}"))
            })
            .collect::<Vec<_>>();
        let results = fetcher.fetch_batch(targets, |_, raw| raw.clone()).await;

        assert_eq!(results.len(), 24);
        assert!(results.iter().all(|(_, o)| o.kind() == OutcomeKind::Success));
        assert!(transport.global.peak.load(Ordering::SeqCst) <= 4);
        assert!(transport.host_peak("a.example") <= 3);
        assert!(transport.host_peak("b.example") <= 3);
    }

    #[tokio::test]
    async fn busy_host_does_not_starve_other_hosts() {
        let transport = Arc::new(ScriptedTransport {
            delay: Duration::from_millis(50),
            ..Default::default()
        });
        let fetcher = Arc::new(HttpFetcher::with_transport(
            config(4, 2, Duration::from_secs(2)),
            transport.clone(),
        ));

        let targets = ["a.example", "b.example"]
            .iter()
            .flat_map(|host| (0..8).map(move |i| (format!("{host}/{i}"), format!("https://{host}/jobs/{i}"))))
            .collect::<Vec<_>>();
        let results = fetcher.fetch_batch(targets, |_, _| ()).await;

        assert_eq!(results.len(), 16);
        assert_eq!(transport.global.peak.load(Ordering::SeqCst), 4);
        assert_eq!(transport.host_peak("a.example"), 2);
        assert_eq!(transport.host_peak("b.example"), 2);
    }

    #[tokio::test]
    async fn single_host_is_capped_below_global_limit() {
        let transport = Arc::new(ScriptedTransport {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let fetcher = Arc::new(HttpFetcher::with_transport(
            config(20, 2, Duration::from_secs(2)),
            transport.clone(),
        ));
        let targets = (0..10)
            .map(|i| (i, format!("https://api.lever.co/v0/postings/s{i}")))
            .collect::<Vec<_>>();
        let results = fetcher.fetch_batch(targets, |_, _| ()).await;

        assert_eq!(results.len(), 10);
        assert!(transport.host_peak("api.lever.co") <= 2);
    }

    #[tokio::test]
    async fn timeout_only_fails_the_slow_target() {
        let transport = Arc::new(ScriptedTransport {
            slow: vec!["https://slow.example/jobs".to_string()],
            ..Default::default()
        });
        let fetcher = Arc::new(HttpFetcher::with_transport(
            config(4, 3, Duration::from_millis(100)),
            transport,
        ));
        let targets = vec![
            ("slow", "https://slow.example/jobs".to_string()),
            ("fast", "https://fast.example/jobs".to_string()),
            ("refused", "https://down.example/refused".to_string()),
        ];
        let results = fetcher
            .fetch_batch(targets, |_, raw| raw.as_array().map(Vec::len).unwrap_or(0))
            .await
            .into_iter()
            .collect::<HashMap<_, _>>();

        assert_eq!(results.len(), 3);
        assert_eq!(results["fast"], TargetOutcome::Success(0));
        assert_eq!(results["slow"].kind(), OutcomeKind::TransportError);
        assert_eq!(results["refused"].kind(), OutcomeKind::TransportError);
    }

    #[tokio::test]
    async fn statuses_map_to_outcome_kinds() {
        let mut routes = HashMap::new();
        routes.insert("https://h.example/404".to_string(), (404, "not found"));
        routes.insert("https://h.example/429".to_string(), (429, ""));
        routes.insert("https://h.example/html".to_string(), (200, "<html>oops</html>"));
        routes.insert("https://h.example/500".to_string(), (500, "{}"));
        routes.insert("https://h.example/ok".to_string(), (200, r#"{"jobs":[{},{}]}"#));
        let transport = Arc::new(ScriptedTransport {
            routes,
            ..Default::default()
        });
        let fetcher = HttpFetcher::with_transport(config(4, 3, Duration::from_secs(1)), transport);

        assert_eq!(fetcher.fetch_json("https://h.example/404").await, TargetOutcome::Empty);
        assert_eq!(fetcher.fetch_json("https://h.example/429").await, TargetOutcome::RateLimited);
        assert_eq!(
            fetcher.fetch_json("https://h.example/html").await.kind(),
            OutcomeKind::DecodeError
        );
        assert_eq!(
            fetcher.fetch_json("https://h.example/500").await,
            TargetOutcome::UnexpectedError("http status 500".to_string())
        );
        assert_eq!(
            fetcher.fetch_json("not a url").await.kind(),
            OutcomeKind::UnexpectedError
        );
        let ok = fetcher.fetch_json("https://h.example/ok").await;
        assert_eq!(ok.success().unwrap()["jobs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn panicking_parse_is_isolated() {
        let mut routes = HashMap::new();
        routes.insert("https://a.example/boom".to_string(), (200, r#"{"boom":true}"#));
        let fetcher = Arc::new(HttpFetcher::with_transport(
            config(4, 3, Duration::from_secs(1)),
            Arc::new(ScriptedTransport {
                routes,
                ..Default::default()
            }),
        ));
        let targets = vec![
            (1, "https://a.example/boom".to_string()),
            (2, "https://a.example/fine".to_string()),
        ];
        let results = fetcher
            .fetch_batch(targets, |_, raw| {
                if raw.get("boom").is_some() {
                    panic!("parser exploded");
                }
                1usize
            })
            .await
            .into_iter()
            .collect::<HashMap<_, _>>();

        assert_eq!(results.len(), 2);
        assert_eq!(results[&1].kind(), OutcomeKind::UnexpectedError);
        assert_eq!(results[&2], TargetOutcome::Success(1));
    }

    #[tokio::test]
    async fn text_fetch_reports_non_success_status() {
        let mut routes = HashMap::new();
        routes.insert(
            "https://raw.example/main/README.md".to_string(),
            (404, "404: Not Found"),
        );
        routes.insert(
            "https://raw.example/master/README.md".to_string(),
            (200, "- [Acme](https://jobs.lever.co/acme)"),
        );
        let fetcher = HttpFetcher::with_transport(
            config(2, 2, Duration::from_secs(1)),
            Arc::new(ScriptedTransport {
                routes,
                ..Default::default()
            }),
        );

        assert!(matches!(
            fetcher.fetch_text("https://raw.example/main/README.md").await,
            Err(FetchError::HttpStatus { status: 404, .. })
        ));
        let text = fetcher
            .fetch_text("https://raw.example/master/README.md")
            .await
            .unwrap();
        assert!(text.contains("jobs.lever.co/acme"));
    }

    #[test]
    fn counts_sum_error_kinds_only() {
        let mut counts = OutcomeCounts::default();
        for kind in [
            OutcomeKind::Success,
            OutcomeKind::Empty,
            OutcomeKind::RateLimited,
            OutcomeKind::TransportError,
            OutcomeKind::DecodeError,
            OutcomeKind::UnexpectedError,
            OutcomeKind::NotConfigured,
            OutcomeKind::Success,
        ] {
            counts.record(kind);
        }
        assert_eq!(counts.total(), 8);
        assert_eq!(counts.get(OutcomeKind::Success), 2);
        assert_eq!(counts.errors(), 4);
        assert!(counts.to_string().contains("not_configured=1"));
    }
}
