use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use reqwest::cookie::Jar;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, ORIGIN, REFERER, USER_AGENT,
};
use reqwest::{redirect, Client, Error as ReqwestError, Proxy, StatusCode};
use url::Url;

use crate::config::Config;
use crate::utils;

static BASE_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers
});

const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug)]
pub enum NetworkError {
    Reqwest(ReqwestError),
    InvalidHeader(String),
}

impl From<ReqwestError> for NetworkError {
    fn from(err: ReqwestError) -> NetworkError {
        NetworkError::Reqwest(err)
    }
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::Reqwest(e) if e.is_timeout() => write!(f, "HTTP request timed out: {}", e),
            NetworkError::Reqwest(e) => write!(f, "HTTP request error: {}", e),
            NetworkError::InvalidHeader(value) => write!(f, "Invalid header value: {}", value),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::Reqwest(e) => Some(e),
            _ => None,
        }
    }
}

/// Cookie-sharing pair of clients for one run.
///
/// `browser` follows redirects like a normal page visit, `no_redirect` hands back the raw
/// response so the renewal redirect can be inspected. Both write into the same cookie jar.
pub struct Session {
    browser: Client,
    no_redirect: Client,
}

/// Raw answer of the renewal endpoint.
#[derive(Debug, Clone)]
pub struct RenewResponse {
    pub status: StatusCode,
    pub location: Option<String>,
}

/// A fetched page together with the URL it finally resolved to.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub html: String,
}

impl Session {
    pub fn new(config: &Config) -> Result<Session, NetworkError> {
        let jar = Arc::new(Jar::default());

        let build = |policy: redirect::Policy| -> Result<Client, NetworkError> {
            let mut builder = Client::builder()
                .default_headers(BASE_HEADERS.clone())
                .cookie_provider(Arc::clone(&jar))
                .redirect(policy)
                .timeout(config.timeout);
            if let Some(proxy) = &config.proxy {
                builder = builder.proxy(Proxy::all(proxy.as_str())?);
            }
            Ok(builder.build()?)
        };

        if let Some(proxy) = &config.proxy {
            info!("Using SOCKS5 proxy: {}", utils::redact_proxy_url(proxy));
        }

        Ok(Session {
            browser: build(redirect::Policy::default())?,
            no_redirect: build(redirect::Policy::none())?,
        })
    }

    /// Logs in with the configured credentials. Returns the URL the login landed on,
    /// which still points at the login page when the credentials were rejected.
    pub async fn login(&self, config: &Config) -> Result<Url, NetworkError> {
        let login_url = config.endpoint(LOGIN_PATH);

        let start_time = Instant::now();
        // Primes the session cookies, the page itself is not needed.
        self.browser.get(&login_url).send().await?;

        let params = [
            ("email", config.email.as_str()),
            ("password", config.password.as_str()),
            ("remember", "true"),
        ];
        let response = self.browser
            .post(&login_url)
            .headers(form_headers(&config.dashboard_origin(), &login_url)?)
            .form(&params)
            .send()
            .await?;
        info!("[TIMING] login took {:.2?}", start_time.elapsed());

        Ok(response.url().clone())
    }

    /// Fetches the server edit page. An error status only gets a warning, the page is still
    /// returned so scraping falls back to unknown values.
    pub async fn fetch_server_page(&self, config: &Config) -> Result<Page, NetworkError> {
        let page_url = config.server_page_url();

        let start_time = Instant::now();
        let response = self.browser.get(&page_url).send().await?;
        info!("[TIMING] fetch_server_page for {} took {:.2?}", page_url, start_time.elapsed());

        let status = response.status();
        if !status.is_success() {
            warn!("Server page {} answered with {}", page_url, status);
        }

        let url = response.url().clone();
        let html = response.text().await?;
        debug!("[API] server page is {} bytes, resolved to {}", html.len(), url);
        Ok(Page { url, html })
    }

    /// Posts the renewal form without following the redirect.
    pub async fn submit_renewal(
        &self,
        config: &Config,
        csrf: Option<&str>,
    ) -> Result<RenewResponse, NetworkError> {
        let renew_url = config.renew_url();
        let params: Vec<(&str, &str)> = csrf.map(|token| ("csrf", token)).into_iter().collect();
        debug!("[API] Sending POST to {} (csrf present: {})", renew_url, csrf.is_some());

        let start_time = Instant::now();
        let response = self.no_redirect
            .post(&renew_url)
            .headers(form_headers(&config.dashboard_origin(), &config.server_page_url())?)
            .form(&params)
            .send()
            .await?;
        info!("[TIMING] submit_renewal took {:.2?}", start_time.elapsed());

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(RenewResponse { status: response.status(), location })
    }
}

/// True when the post-login URL still points at the login form.
pub fn is_login_rejected(final_url: &Url) -> bool {
    final_url.as_str().contains(LOGIN_PATH)
}

fn form_headers(origin: &str, referer: &str) -> Result<HeaderMap, NetworkError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
    headers.insert(
        ORIGIN,
        HeaderValue::from_str(origin).map_err(|_| NetworkError::InvalidHeader(origin.to_string()))?,
    );
    headers.insert(
        REFERER,
        HeaderValue::from_str(referer).map_err(|_| NetworkError::InvalidHeader(referer.to_string()))?,
    );
    Ok(headers)
}
