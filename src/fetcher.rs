//! Fetch strategies and the chain that tries them in order.
//!
//! Each strategy only knows how to get HTML for a URL. The chain runs the
//! extractor and quality gate on whatever a strategy returns and moves on to
//! the next, more expensive, strategy when the result is not usable.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::cleaner;
use crate::error::FetchError;
use crate::extractor;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const RENDER_WAIT: Duration = Duration::from_secs(20);

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";
const REFERER_VALUE: &str = "https://www.google.com";

const CHALLENGE_MARKERS: [&str; 5] = [
    "cf-chl",
    "just a moment...",
    "checking your browser",
    "cf_chl_opt",
    "ddos-guard",
];

/// Browser-like request headers with a User-Agent picked from a fixed pool.
pub fn random_headers() -> HeaderMap {
    let agent = USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
    headers.insert(REFERER, HeaderValue::from_static(REFERER_VALUE));
    headers
}

/// One way of retrieving a page's HTML.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError>;
}

async fn read_html(response: Response, url: &str) -> Result<String, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(e, url))
}

// =============================================================================
// Plain HTTP
// =============================================================================

pub struct PlainFetcher {
    client: Client,
}

impl PlainFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FetchStrategy for PlainFetcher {
    fn name(&self) -> &'static str {
        "plain"
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(random_headers())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;
        read_html(response, url).await
    }
}

// =============================================================================
// Anti-bot aware
// =============================================================================

pub fn looks_like_challenge(status: StatusCode, body: &str) -> bool {
    let lower = body.to_lowercase();
    let marked = CHALLENGE_MARKERS.iter().any(|m| lower.contains(m));
    marked
        || (matches!(status.as_u16(), 403 | 429 | 503) && lower.contains("challenge"))
}

#[derive(Debug, Deserialize)]
struct SolverResponse {
    status: String,
    #[serde(default)]
    message: String,
    solution: Option<SolverSolution>,
}

#[derive(Debug, Deserialize)]
struct SolverSolution {
    status: u16,
    response: String,
}

/// Clears JS challenges before handing the page to the extractor.
///
/// With a solver endpoint (FlareSolverr API) every request goes through the
/// solver. Without one, the client keeps challenge cookies and retries a
/// challenged request once.
pub struct AntiBotFetcher {
    client: Client,
    solver_url: Option<String>,
    timeout: Duration,
}

impl AntiBotFetcher {
    pub fn new(timeout: Duration, solver_url: Option<String>) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self {
            client,
            solver_url,
            timeout,
        })
    }

    async fn fetch_direct(&self, url: &str) -> Result<String, FetchError> {
        for attempt in 0..2 {
            let response = self
                .client
                .get(url)
                .headers(random_headers())
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(e, url))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(e, url))?;

            if !looks_like_challenge(status, &body) {
                if !status.is_success() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                return Ok(body);
            }
            log::debug!("challenge page for {url} (attempt {})", attempt + 1);
        }
        Err(FetchError::Challenge(url.to_string()))
    }

    async fn fetch_via_solver(&self, solver_url: &str, url: &str) -> Result<String, FetchError> {
        let payload = json!({
            "cmd": "request.get",
            "url": url,
            "maxTimeout": self.timeout.as_millis() as u64,
        });
        // The solver runs a browser, so it gets extra headroom over the page timeout.
        let response = self
            .client
            .post(solver_url)
            .timeout(self.timeout * 2)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, url))?;

        let parsed: SolverResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Solver(e.to_string()))?;
        if parsed.status != "ok" {
            return Err(FetchError::Solver(parsed.message));
        }
        let solution = parsed
            .solution
            .ok_or_else(|| FetchError::Solver("missing solution".to_string()))?;
        if !(200..300).contains(&solution.status) {
            return Err(FetchError::Status {
                status: solution.status,
                url: url.to_string(),
            });
        }
        Ok(solution.response)
    }
}

#[async_trait]
impl FetchStrategy for AntiBotFetcher {
    fn name(&self) -> &'static str {
        "anti-bot"
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        match &self.solver_url {
            Some(solver_url) => self.fetch_via_solver(solver_url, url).await,
            None => self.fetch_direct(url).await,
        }
    }
}

// =============================================================================
// Rendered page
// =============================================================================

/// Loads the page in an external headless browser service and returns the
/// rendered DOM.
pub struct RenderedFetcher {
    client: Client,
    endpoint: String,
    wait: Duration,
}

impl RenderedFetcher {
    pub fn new(endpoint: &str, wait: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(FETCH_TIMEOUT + wait).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            wait,
        })
    }
}

#[async_trait]
impl FetchStrategy for RenderedFetcher {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let headers = random_headers();
        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(USER_AGENTS[0]);
        let payload = json!({
            "url": url,
            "userAgent": user_agent,
            "gotoOptions": {
                "waitUntil": "networkidle2",
                "timeout": self.wait.as_millis() as u64,
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FetchError::Render(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Render(format!("HTTP {status} rendering {url}")));
        }
        response
            .text()
            .await
            .map_err(|e| FetchError::Render(e.to_string()))
    }
}

// =============================================================================
// Chain
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub text: Option<String>,
    /// Name of the strategy that produced `text`.
    pub strategy: Option<&'static str>,
}

impl FetchOutcome {
    pub fn ok(&self) -> bool {
        self.text.is_some()
    }

    fn failed() -> Self {
        Self {
            text: None,
            strategy: None,
        }
    }
}

/// Ordered strategies, tried until one yields valid content.
pub struct FetchChain {
    strategies: Vec<Box<dyn FetchStrategy>>,
    retry_delay: Duration,
    min_words: usize,
}

impl FetchChain {
    pub fn new(retry_delay: Duration, min_words: usize) -> Self {
        Self {
            strategies: Vec::new(),
            retry_delay,
            min_words,
        }
    }

    /// Plain, then anti-bot, then rendered when a render service is available.
    pub fn standard(
        retry_delay: Duration,
        min_words: usize,
        solver_url: Option<String>,
        render_service_url: Option<&str>,
    ) -> reqwest::Result<Self> {
        let mut chain = Self::new(retry_delay, min_words)
            .with_strategy(PlainFetcher::new(FETCH_TIMEOUT)?)
            .with_strategy(AntiBotFetcher::new(FETCH_TIMEOUT, solver_url)?);
        if let Some(endpoint) = render_service_url {
            chain = chain.with_strategy(RenderedFetcher::new(endpoint, RENDER_WAIT)?);
        }
        Ok(chain)
    }

    pub fn with_strategy(mut self, strategy: impl FetchStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    async fn attempt(&self, strategy: &dyn FetchStrategy, url: &str) -> Result<String, FetchError> {
        let html = strategy.fetch_html(url).await?;
        let text = tokio::task::spawn_blocking(move || extractor::extract(&html))
            .await
            .map_err(|e| FetchError::Extract(e.to_string()))?;
        if !cleaner::is_valid(&text, self.min_words) {
            return Err(FetchError::LowQuality {
                words: cleaner::word_count(&text),
            });
        }
        Ok(text)
    }

    /// Runs strategies in order and stops at the first valid extraction.
    ///
    /// Exhausting the chain is an expected outcome, reported as a failed
    /// [`FetchOutcome`] rather than an error.
    pub async fn fetch_and_extract(&self, url: &str) -> FetchOutcome {
        for strategy in &self.strategies {
            log::debug!("Trying {} for {url}", strategy.name());
            match self.attempt(strategy.as_ref(), url).await {
                Ok(text) => {
                    return FetchOutcome {
                        text: Some(text),
                        strategy: Some(strategy.name()),
                    };
                }
                Err(e) => log::debug!("{} failed for {url}: {e}", strategy.name()),
            }
            tokio::time::sleep(self.retry_delay).await;
        }
        log::warn!("no strategy produced valid content for {url}");
        FetchOutcome::failed()
    }
}
