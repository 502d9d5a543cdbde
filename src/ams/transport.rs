//! Authenticated, optionally cached transport for AMS calls.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use http::{StatusCode, header};
use url::Url;

use super::ReviewError;
use crate::{
    auth::TokenSource,
    cache::{Cache, CacheKeys},
    observability::metrics,
};

/// Status and body of an upstream response, fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Cached form: two bytes of big-endian status followed by the body.
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.body.len());
        out.extend_from_slice(&self.status.as_u16().to_be_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        let (status, body) = bytes.split_first_chunk::<2>()?;
        let status = StatusCode::from_u16(u16::from_be_bytes(*status)).ok()?;
        Some(Self {
            status,
            body: Bytes::copy_from_slice(body),
        })
    }
}

/// Executes access review POSTs against AMS.
///
/// Every request carries a bearer token from the token source. When a cache
/// is attached, the token is resolved first and bound into the cache key,
/// so entries are never shared between principals.
pub struct AmsTransport {
    http_client: reqwest::Client,
    url: Url,
    tokens: Arc<dyn TokenSource>,
    cache: Option<Arc<dyn Cache>>,
    cache_ttl: Duration,
    timeout: Option<Duration>,
}

impl AmsTransport {
    pub fn new(http_client: reqwest::Client, url: Url, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http_client,
            url,
            tokens,
            cache: None,
            cache_ttl: Duration::ZERO,
            timeout: None,
        }
    }

    /// Serve successful responses from `cache` for `ttl`.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Bound each call. The deadline covers obtaining the token and, separately,
    /// the POST including reading the response body.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// POST a JSON body to the access review endpoint.
    pub async fn post_json(&self, body: Vec<u8>) -> Result<UpstreamResponse, ReviewError> {
        let bearer = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.tokens.bearer_header())
                .await
                .map_err(|_| ReviewError::Timeout(timeout))??,
            None => self.tokens.bearer_header().await?,
        };

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| CacheKeys::access_review(&bearer, "POST", self.url.as_str(), &body));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            match cache.get_bytes(key).await {
                Ok(Some(bytes)) => {
                    if let Some(response) = UpstreamResponse::decode(&bytes) {
                        metrics::record_cache_lookup("hit");
                        tracing::debug!("Access review served from cache");
                        return Ok(response);
                    }
                    metrics::record_cache_lookup("error");
                    tracing::warn!(key = %key, "Discarding undecodable cache entry");
                }
                Ok(None) => metrics::record_cache_lookup("miss"),
                Err(e) => {
                    metrics::record_cache_lookup("error");
                    tracing::warn!(error = %e, "Cache read failed, calling upstream");
                }
            }
        }

        let response = self.send(&bearer, body).await?;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key)
            && response.status.is_success()
            && let Err(e) = cache
                .set_bytes(key, &response.encode(), self.cache_ttl)
                .await
        {
            metrics::record_cache_lookup("error");
            tracing::warn!(error = %e, "Cache write failed");
        }

        Ok(response)
    }

    async fn send(&self, bearer: &str, body: Vec<u8>) -> Result<UpstreamResponse, ReviewError> {
        let mut request = self
            .http_client
            .post(self.url.clone())
            .header(header::AUTHORIZATION, bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let start = Instant::now();
        let result = match request.send().await {
            Ok(response) => {
                let status = response.status();
                response
                    .bytes()
                    .await
                    .map(|body| UpstreamResponse { status, body })
            }
            Err(e) => Err(e),
        };
        metrics::record_client_request(
            metrics::CLIENT_AMS,
            "POST",
            result.as_ref().ok().map(|r| r.status.as_u16()),
            start.elapsed(),
        );

        result.map_err(|e| match self.timeout {
            Some(timeout) if e.is_timeout() => ReviewError::Timeout(timeout),
            _ => ReviewError::Transport(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    use super::*;
    use crate::{
        auth::AuthError,
        cache::{CacheError, CacheResult, MemoryCache},
    };

    /// Token source handing out a fixed token.
    struct StaticToken(&'static str);

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn bearer_header(&self) -> Result<Arc<str>, AuthError> {
            Ok(format!("Bearer {}", self.0).into())
        }
    }

    /// Token source that never answers in time.
    struct StalledToken;

    #[async_trait]
    impl TokenSource for StalledToken {
        async fn bearer_header(&self) -> Result<Arc<str>, AuthError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok("Bearer late".into())
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl Cache for BrokenCache {
        async fn get_bytes(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            Err(CacheError::NoServers)
        }
        async fn set_bytes(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::NoServers)
        }
        async fn ping(&self) -> CacheResult<()> {
            Err(CacheError::NoServers)
        }
        fn backend(&self) -> &'static str {
            "broken"
        }
    }

    /// Misses every read and fails every write.
    #[cfg(feature = "prometheus")]
    struct ReadOnlyCache;

    #[cfg(feature = "prometheus")]
    #[async_trait]
    impl Cache for ReadOnlyCache {
        async fn get_bytes(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn set_bytes(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Internal("read-only".into()))
        }
        async fn ping(&self) -> CacheResult<()> {
            Ok(())
        }
        fn backend(&self) -> &'static str {
            "read-only"
        }
    }

    fn transport(server: &MockServer, token: &'static str) -> AmsTransport {
        let url = Url::parse(&format!("{}/access_review", server.uri())).unwrap();
        AmsTransport::new(reqwest::Client::new(), url, Arc::new(StaticToken(token)))
    }

    #[test]
    fn test_cached_form() {
        let response = UpstreamResponse {
            status: StatusCode::OK,
            body: Bytes::from_static(br#"{"allowed":true}"#),
        };
        assert_eq!(UpstreamResponse::decode(&response.encode()), Some(response));
        assert_eq!(UpstreamResponse::decode(&[0]), None);
    }

    #[tokio::test]
    async fn test_stamps_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access_review"))
            .and(header("authorization", "Bearer tok-1"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"allowed":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(&server, "tok-1")
            .post_json(b"{}".to_vec())
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], br#"{"allowed":true}"#);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"allowed":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let transport =
            transport(&server, "tok-1").with_cache(cache.clone(), Duration::from_secs(60));

        let first = transport.post_json(b"{}".to_vec()).await.unwrap();
        let second = transport.post_json(b"{}".to_vec()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cache_is_scoped_to_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"allowed":true}"#))
            .expect(2)
            .mount(&server)
            .await;

        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
        let ttl = Duration::from_secs(60);

        transport(&server, "tok-1")
            .with_cache(cache.clone(), ttl)
            .post_json(b"{}".to_vec())
            .await
            .unwrap();
        transport(&server, "tok-2")
            .with_cache(cache, ttl)
            .post_json(b"{}".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_responses_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let transport = transport(&server, "tok-1")
            .with_cache(Arc::new(MemoryCache::new()), Duration::from_secs(60));

        for _ in 0..2 {
            let response = transport.post_json(b"{}".to_vec()).await.unwrap();
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn test_cache_failure_falls_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"allowed":false}"#))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(&server, "tok-1")
            .with_cache(Arc::new(BrokenCache), Duration::from_secs(60))
            .post_json(b"{}".to_vec())
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"allowed":true}"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = transport(&server, "tok-1")
            .with_timeout(Some(Duration::from_millis(50)))
            .post_json(b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Timeout(_)), "{err}");
    }

    #[tokio::test]
    async fn test_token_acquisition_shares_the_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"allowed":true}"#))
            .expect(0)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/access_review", server.uri())).unwrap();
        let transport = AmsTransport::new(reqwest::Client::new(), url, Arc::new(StalledToken))
            .with_timeout(Some(Duration::from_millis(100)));

        let start = Instant::now();
        let err = transport.post_json(b"{}".to_vec()).await.unwrap_err();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(matches!(err, ReviewError::Timeout(_)), "{err}");
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_cache_write_failure_is_counted() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let response = ::metrics::with_local_recorder(&recorder, || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(async {
                    let server = MockServer::start().await;
                    Mock::given(method("POST"))
                        .respond_with(
                            ResponseTemplate::new(200).set_body_string(r#"{"allowed":true}"#),
                        )
                        .mount(&server)
                        .await;

                    transport(&server, "tok-1")
                        .with_cache(Arc::new(ReadOnlyCache), Duration::from_secs(60))
                        .post_json(b"{}".to_vec())
                        .await
                        .unwrap()
                })
        });
        assert_eq!(response.status, StatusCode::OK);

        let rendered = handle.render();
        assert!(rendered.contains(r#"cache_requests_total{result="miss"} 1"#), "{rendered}");
        assert!(rendered.contains(r#"cache_requests_total{result="error"} 1"#), "{rendered}");
    }
}
