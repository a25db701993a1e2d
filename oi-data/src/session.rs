use crate::{
    chain::OptionChainResponse,
    config::{OPTION_CHAIN_PATH, PollerConfig},
    error::FetchError,
    poller::ChainSource,
};
use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};
use tracing::{debug, warn};
use url::Url;

/// Cookie-primed HTTP session against the NSE option chain endpoint.
///
/// Every [`fetch_chain`](ChainSource::fetch_chain) builds a fresh [`Client`] with its own
/// cookie jar, requests the provider's root page so the anti-bot cookies are set, then
/// requests the chain with the same client. The jar therefore never outlives one fetch and is
/// never shared between concurrent fetches.
#[derive(Debug, Clone)]
pub struct NseSession {
    config: PollerConfig,
    home_url: Url,
    chain_url: Url,
}

impl NseSession {
    pub fn new(config: PollerConfig) -> Result<Self, FetchError> {
        let home_url = Url::parse(&config.base_url)?;
        let chain_url = home_url.join(OPTION_CHAIN_PATH)?;

        Ok(Self {
            config,
            home_url,
            chain_url,
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Option chain url for `symbol`.
    pub fn chain_url(&self, symbol: &str) -> Url {
        let mut url = self.chain_url.clone();
        url.query_pairs_mut().append_pair("symbol", symbol);
        url
    }

    fn build_client(&self) -> Result<Client, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        Client::builder()
            .cookie_store(true)
            .user_agent(self.config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|error| FetchError::Network(format!("failed to build HTTP client: {error}")))
    }

    /// Request the root page so the upstream sets its session cookies.
    ///
    /// A non-2xx status here is not fatal: the cookies may still have been set, and the data
    /// request reports the definitive status.
    async fn prime(&self, client: &Client) -> Result<(), FetchError> {
        let response = client
            .get(self.home_url.clone())
            .timeout(self.config.prime_timeout)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, url = %self.home_url, "primed session cookies");
        } else {
            warn!(%status, url = %self.home_url, "cookie priming returned non-success status");
        }

        Ok(())
    }
}

#[async_trait]
impl ChainSource for NseSession {
    async fn fetch_chain(&self, symbol: &str) -> Result<OptionChainResponse, FetchError> {
        let client = self.build_client()?;
        self.prime(&client).await?;

        let url = self.chain_url(symbol);
        debug!(%url, "requesting option chain");

        let response = client
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamRejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response.bytes().await?;
        OptionChainResponse::from_slice(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    const SESSION_COOKIE: &str = "nsit=primed-session";

    const CHAIN_BODY: &str = r#"{"records":{"expiryDates":["26-Dec-2024"],"underlyingValue":18050.25,"data":[
        {"strikePrice":18000,"CE":{"openInterest":120000},"PE":{"openInterest":90000}},
        {"strikePrice":18100,"CE":{"openInterest":80000},"PE":{"openInterest":110000}}
    ]}}"#;

    /// Minimal HTTP/1.1 stub standing in for the NSE site.
    ///
    /// - `GET /` sets the session cookie.
    /// - `GET /api/option-chain-indices?symbol=NIFTY` answers 401 without the cookie.
    /// - `symbol=BLOCKED` answers 403, `symbol=BROKEN` answers a body missing `data`,
    ///   `symbol=SLOW` never answers.
    struct StubServer {
        base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        async fn start() -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));

            let log = Arc::clone(&requests);
            tokio::spawn(async move {
                loop {
                    let Ok((mut socket, _)) = listener.accept().await else {
                        break;
                    };
                    let log = Arc::clone(&log);
                    tokio::spawn(async move {
                        let mut buffer = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buffer.windows(4).any(|window| window == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                            }
                        }

                        let request = String::from_utf8_lossy(&buffer).to_string();
                        log.lock().unwrap().push(request.clone());

                        let Some(response) = Self::respond(&request) else {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            return;
                        };
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            Self { base_url, requests }
        }

        fn respond(request: &str) -> Option<String> {
            let path = request.split_whitespace().nth(1).unwrap_or("/");
            let has_cookie = request
                .lines()
                .any(|line| line.to_lowercase().starts_with("cookie:") && line.contains(SESSION_COOKIE));

            let (status, extra_headers, body) = match path {
                "/" => (
                    "200 OK",
                    format!("Set-Cookie: {SESSION_COOKIE}; Path=/\r\n"),
                    "<html>home</html>".to_string(),
                ),
                path if path.ends_with("symbol=SLOW") => return None,
                path if path.ends_with("symbol=BLOCKED") => {
                    ("403 Forbidden", String::new(), "denied".to_string())
                }
                _ if !has_cookie => ("401 Unauthorized", String::new(), "{}".to_string()),
                path if path.ends_with("symbol=BROKEN") => (
                    "200 OK",
                    String::new(),
                    r#"{"records":{"timestamp":"x"}}"#.to_string(),
                ),
                _ => ("200 OK", String::new(), CHAIN_BODY.to_string()),
            };

            Some(format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            ))
        }

        fn session(&self) -> NseSession {
            NseSession::new(
                PollerConfig::new(self.base_url.clone())
                    .with_prime_timeout(Duration::from_secs(2))
                    .with_request_timeout(Duration::from_millis(500)),
            )
            .unwrap()
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_chain_url() {
        let session = NseSession::new(PollerConfig::default()).unwrap();

        assert_eq!(
            session.chain_url("BANKNIFTY").as_str(),
            "https://www.nseindia.com/api/option-chain-indices?symbol=BANKNIFTY"
        );
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let actual = NseSession::new(PollerConfig::new("nseindia"));

        assert!(matches!(actual, Err(FetchError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_fetch_chain_primes_cookies_before_data_request() {
        let server = StubServer::start().await;

        let chain = server.session().fetch_chain("NIFTY").await.unwrap();

        assert_eq!(chain.records.data.len(), 2);
        assert_eq!(chain.records.underlying_value, Some(18050.25));

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET / HTTP/1.1"));
        assert!(requests[1].starts_with("GET /api/option-chain-indices?symbol=NIFTY HTTP/1.1"));
        assert!(requests[1].contains(SESSION_COOKIE));

        for request in &requests {
            let lower = request.to_lowercase();
            assert!(lower.contains("user-agent: mozilla/5.0"));
            assert!(lower.contains("accept: */*"));
        }
    }

    #[tokio::test]
    async fn test_fetch_chain_does_not_leak_cookies_between_fetches() {
        let server = StubServer::start().await;
        let session = server.session();

        session.fetch_chain("NIFTY").await.unwrap();
        session.fetch_chain("NIFTY").await.unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 4);
        // Each fetch starts from an empty jar, so the priming request carries no cookie.
        assert!(!requests[2].contains(SESSION_COOKIE));
        assert!(requests[3].contains(SESSION_COOKIE));
    }

    #[tokio::test]
    async fn test_fetch_chain_maps_failures() {
        let server = StubServer::start().await;
        let session = server.session();

        let blocked = session.fetch_chain("BLOCKED").await.unwrap_err();
        assert_eq!(
            blocked,
            FetchError::UpstreamRejected {
                status: 403,
                reason: "Forbidden".to_string()
            }
        );
        assert!(blocked.is_rate_limited());

        let broken = session.fetch_chain("BROKEN").await.unwrap_err();
        assert!(matches!(broken, FetchError::MalformedResponse(_)));

        let slow = session.fetch_chain("SLOW").await.unwrap_err();
        assert!(matches!(slow, FetchError::Network(_)), "{slow:?}");
    }

    #[tokio::test]
    async fn test_fetch_chain_times_out_stalled_priming_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        // Accepts connections but never answers
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let session = NseSession::new(
            PollerConfig::new(base_url).with_http_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        let started = std::time::Instant::now();
        let actual = session.fetch_chain("NIFTY").await.unwrap_err();

        assert!(matches!(actual, FetchError::Network(_)), "{actual:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fetch_chain_unreachable_host_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let session = NseSession::new(PollerConfig::new(base_url)).unwrap();
        let actual = session.fetch_chain("NIFTY").await.unwrap_err();

        assert!(matches!(actual, FetchError::Network(_)), "{actual:?}");
    }
}
