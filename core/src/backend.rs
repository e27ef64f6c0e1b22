//! Backend locator and resilient request client.
//!
//! # Design
//! `BackendClient` owns an ordered candidate list and a single cached
//! "resolved" base URL. Resolution probes candidates in order and caches the
//! first one that answers 2xx; if none does, the primary candidate is cached
//! anyway and the first real request reports the failure.
//!
//! Requests try the cached URL first, then every other candidate in declared
//! order, each once. Within a candidate an attempt either yields a response
//! (any status) or a `TransportError`; timeouts and network errors are retried
//! after a fixed backoff up to `max_attempts`, anything else moves straight to
//! the next candidate. A response always ends the walk: an HTTP 401 from the
//! first backend is returned, not retried elsewhere.
//!
//! Candidates and attempts run strictly one after another. The cache is an
//! `ArcSwapOption`, so concurrent callers may race on which URL ends up
//! stored but never observe a torn value.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// Result of one attempt against one candidate.
#[derive(Debug)]
enum AttemptOutcome {
    Responded(HttpResponse),
    Failed(TransportError),
}

/// Result of all attempts against one candidate.
#[derive(Debug)]
enum CandidateOutcome {
    Responded(HttpResponse),
    Exhausted(TransportError),
}

pub struct BackendClient<T: Transport = ReqwestTransport> {
    transport: T,
    config: ClientConfig,
    resolved: ArcSwapOption<String>,
}

impl BackendClient {
    /// Client over the default reqwest transport.
    pub fn from_config(config: ClientConfig) -> Self {
        Self::new(ReqwestTransport::new(), config)
    }
}

impl<T: Transport> BackendClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            resolved: ArcSwapOption::empty(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The currently cached base URL, if any request or probe has set one.
    pub fn cached_endpoint(&self) -> Option<String> {
        self.resolved.load_full().map(|url| url.as_ref().clone())
    }

    /// Return the cached base URL, probing candidates if none is cached yet.
    ///
    /// Never fails: when every probe fails the primary candidate is cached
    /// and returned.
    pub async fn resolve_endpoint(&self) -> String {
        if let Some(url) = self.cached_endpoint() {
            return url;
        }

        for url in self.config.candidates() {
            match self.probe(url, "/", self.config.probe_timeout).await {
                Ok(resp) if resp.is_success() => {
                    info!(url = %url, "connected to backend");
                    self.remember(url);
                    return url.clone();
                }
                Ok(resp) => warn!(url = %url, status = resp.status, "backend probe returned non-success status"),
                Err(TransportError::Timeout) => warn!(url = %url, "backend probe timed out"),
                Err(e) => warn!(url = %url, error = %e, "backend probe failed"),
            }
        }

        let primary = self.config.primary().to_string();
        warn!(url = %primary, "no backend answered the probe, defaulting to primary");
        self.remember(&primary);
        primary
    }

    /// A single bounded GET against `base_url` + `path`. No retries.
    pub async fn probe(&self, base_url: &str, path: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let request = HttpRequest::new(HttpMethod::Get, path);
        self.send_with_deadline(base_url, &request, timeout).await
    }

    /// Execute `request` against the candidates with retry and fallback.
    ///
    /// Returns the first response received, whatever its status. A 2xx
    /// response caches the base URL it came from.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut last_failure: Option<(String, TransportError)> = None;

        for base in self.candidate_order() {
            match self.try_candidate(&base, request).await {
                CandidateOutcome::Responded(resp) => {
                    if resp.is_success() {
                        self.remember(&base);
                    }
                    return Ok(resp);
                }
                CandidateOutcome::Exhausted(err) => {
                    warn!(
                        url = %base,
                        method = request.method.as_str(),
                        path = %request.path,
                        error = %err,
                        "backend failed, trying next candidate"
                    );
                    last_failure = Some((base, err));
                }
            }
        }

        Err(match last_failure {
            Some((base, err)) => exhausted_error(&base, &request.path, err),
            None => ApiError::NoBackendAvailable,
        })
    }

    /// Cached URL first, then the remaining candidates in declared order.
    fn candidate_order(&self) -> Vec<String> {
        let cached = self.cached_endpoint();
        let mut order = Vec::with_capacity(self.config.candidates().len());
        if let Some(url) = &cached {
            order.push(url.clone());
        }
        order.extend(
            self.config
                .candidates()
                .iter()
                .filter(|url| cached.as_ref() != Some(*url))
                .cloned(),
        );
        order
    }

    async fn try_candidate(&self, base: &str, request: &HttpRequest) -> CandidateOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.attempt(base, request).await {
                AttemptOutcome::Responded(resp) => return CandidateOutcome::Responded(resp),
                AttemptOutcome::Failed(err) => err,
            };

            let backoff = match &err {
                TransportError::Timeout => self.config.timeout_backoff,
                TransportError::Network(_) => self.config.network_backoff,
                TransportError::Invalid(_) => return CandidateOutcome::Exhausted(err),
            };
            if attempt >= self.config.max_attempts {
                return CandidateOutcome::Exhausted(err);
            }

            warn!(
                url = %base,
                attempt,
                max_attempts = self.config.max_attempts,
                error = %err,
                backoff = ?backoff,
                "request attempt failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    async fn attempt(&self, base: &str, request: &HttpRequest) -> AttemptOutcome {
        match self
            .send_with_deadline(base, request, self.config.request_timeout)
            .await
        {
            Ok(resp) => AttemptOutcome::Responded(resp),
            Err(err) => AttemptOutcome::Failed(err),
        }
    }

    /// Dropping the timed-out send future also drops its timer.
    async fn send_with_deadline(
        &self,
        base: &str,
        request: &HttpRequest,
        deadline: Duration,
    ) -> Result<HttpResponse, TransportError> {
        match tokio::time::timeout(deadline, self.transport.send(base, request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    fn remember(&self, url: &str) {
        if self.cached_endpoint().as_deref() == Some(url) {
            return;
        }
        debug!(url = %url, "caching resolved backend");
        self.resolved.store(Some(Arc::new(url.to_string())));
    }
}

fn exhausted_error(base: &str, path: &str, err: TransportError) -> ApiError {
    let endpoint = format!("{base}{path}");
    match err {
        TransportError::Timeout => ApiError::Timeout { endpoint },
        TransportError::Network(cause) => ApiError::Unreachable { endpoint, cause },
        TransportError::Invalid(cause) => ApiError::Unexpected(format!("request to {endpoint} failed: {cause}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{refused, ScriptedTransport, Step};

    const A: &str = "http://a:8000";
    const B: &str = "http://b:8000";
    const C: &str = "http://c:8000";

    fn client(transport: &Arc<ScriptedTransport>) -> BackendClient<Arc<ScriptedTransport>> {
        let config = ClientConfig::with_candidates([A, B, C]).unwrap();
        BackendClient::new(Arc::clone(transport), config)
    }

    fn assert_elapsed(actual: Duration, secs: u64) {
        let expected = Duration::from_secs(secs);
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(50),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    fn login_request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, "/api/auth/login").with_json_body("{}".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_stops_at_first_reachable_candidate() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(A, 200, "{}");
        let backend = client(&transport);

        assert_eq!(backend.resolve_endpoint().await, A);
        assert_eq!(backend.cached_endpoint().as_deref(), Some(A));
        assert_eq!(transport.bases_called(), vec![A]);
        assert_eq!(transport.calls()[0].path, "/");
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_walks_candidates_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(B, [Step::Hang]);
        transport.respond(C, 200, "{}");
        let backend = client(&transport);

        assert_eq!(backend.resolve_endpoint().await, C);
        assert_eq!(transport.bases_called(), vec![A, B, C]);
        assert_eq!(backend.cached_endpoint().as_deref(), Some(C));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_skips_non_success_probe() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(A, 503, "starting");
        transport.respond(B, 200, "{}");
        let backend = client(&transport);

        assert_eq!(backend.resolve_endpoint().await, B);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_defaults_to_primary_when_all_fail() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(A, [Step::Hang]);
        let backend = client(&transport);

        assert_eq!(backend.resolve_endpoint().await, A);
        assert_eq!(backend.cached_endpoint().as_deref(), Some(A));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_uses_cache_without_probing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(B, 200, "{}");
        let backend = client(&transport);

        backend.resolve_endpoint().await;
        let probes = transport.calls().len();
        assert_eq!(backend.resolve_endpoint().await, B);
        assert_eq!(transport.calls().len(), probes);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_is_bounded() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(A, [Step::Hang]);
        transport.respond(B, 200, "{}");
        let backend = client(&transport);

        let started = tokio::time::Instant::now();
        backend.resolve_endpoint().await;
        let calls = transport.calls();
        assert_elapsed(calls[1].at - started, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_then_success_stay_on_same_candidate() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(
            A,
            [Step::Hang, Step::Hang, Step::Respond(200, r#"{"ok":true}"#.to_string())],
        );
        let backend = client(&transport);

        let started = tokio::time::Instant::now();
        let resp = backend.execute(&login_request()).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(transport.bases_called(), vec![A, A, A]);

        // 30s deadline + 2s backoff, twice
        let calls = transport.calls();
        assert_elapsed(calls[1].at - started, 32);
        assert_elapsed(calls[2].at - started, 64);
        assert_eq!(backend.cached_endpoint().as_deref(), Some(A));
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_back_off_one_second() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(A, [refused(), Step::Respond(204, String::new())]);
        let backend = client(&transport);

        let started = tokio::time::Instant::now();
        backend.execute(&login_request()).await.unwrap();
        assert_elapsed(transport.calls()[1].at - started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_is_returned_without_fallback() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(A, 401, r#"{"detail":"nope"}"#);
        transport.respond(B, 200, "{}");
        let backend = client(&transport);

        let resp = backend.execute(&login_request()).await.unwrap();
        assert_eq!(resp.status, 401);
        assert_eq!(transport.bases_called(), vec![A]);
        assert_eq!(backend.cached_endpoint(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_after_attempts_exhausted() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(B, 201, "{}");
        let backend = client(&transport);

        let resp = backend.execute(&login_request()).await.unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(transport.bases_called(), vec![A, A, A, B]);
        assert_eq!(backend.cached_endpoint().as_deref(), Some(B));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_request_skips_remaining_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(A, [Step::Fail(TransportError::Invalid("bad url".to_string()))]);
        transport.respond(B, 200, "{}");
        let backend = client(&transport);

        backend.execute(&login_request()).await.unwrap();
        assert_eq!(transport.bases_called(), vec![A, B]);
    }

    #[tokio::test(start_paused = true)]
    async fn all_unreachable_names_last_candidate() {
        let transport = Arc::new(ScriptedTransport::new());
        let backend = client(&transport);

        let err = backend.execute(&login_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unreachable);
        assert!(err.to_string().contains("http://c:8000/api/auth/login"), "{err}");
        assert_eq!(transport.calls().len(), 9);
        assert_eq!(backend.cached_endpoint(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn last_timeout_surfaces_as_timeout() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script(C, [Step::Hang, Step::Hang, Step::Hang]);
        let backend = client(&transport);

        let err = backend.execute(&login_request()).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout { ref endpoint } if endpoint == "http://c:8000/api/auth/login"));
    }

    #[tokio::test(start_paused = true)]
    async fn cached_candidate_goes_first_then_declared_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(B, 200, "{}");
        let backend = client(&transport);
        backend.resolve_endpoint().await;
        assert_eq!(backend.cached_endpoint().as_deref(), Some(B));

        // B now dead; C answers
        transport.respond(C, 200, "{}");
        let before = transport.calls().len();
        backend.execute(&login_request()).await.unwrap();
        let walked: Vec<String> = transport.bases_called().split_off(before);
        assert_eq!(walked, vec![B, B, B, A, A, A, C]);
        assert_eq!(backend.cached_endpoint().as_deref(), Some(C));
    }

    #[tokio::test(start_paused = true)]
    async fn request_is_replayed_verbatim() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(A, 200, "{}");
        let backend = client(&transport);

        let req = login_request();
        backend.execute(&req).await.unwrap();
        let call = &transport.calls()[0];
        assert_eq!(call.method, HttpMethod::Post);
        assert_eq!(call.path, "/api/auth/login");
        assert_eq!(call.body.as_deref(), Some("{}"));
        assert_eq!(call.headers, req.headers);
    }
}
