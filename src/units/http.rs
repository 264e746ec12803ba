//! HTTP plumbing shared by the built-in probe units.

use crate::models::{category, Record, Severity};
use crate::modes::{option, PlanOptions};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::{Duration, Instant};

const SHORT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Responses slower than this also produce a Performance record.
pub const SLOW_RESPONSE: Duration = Duration::from_secs(3);

/// A fetched page.
#[derive(Debug)]
pub struct PageResponse {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

impl PageResponse {
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false)
    }

    /// Case-insensitive body search.
    pub fn body_contains(&self, needle: &str) -> bool {
        self.body.to_lowercase().contains(&needle.to_lowercase())
    }

    pub fn count(&self, needle: &str) -> usize {
        self.body.to_lowercase().matches(&needle.to_lowercase()).count()
    }
}

/// HTTP client bound to one target.
pub struct Probe {
    client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl Probe {
    /// Build a probe honoring the plan's `shortTimeout` option.
    pub fn new(target: &str, options: &PlanOptions) -> Result<Self> {
        let timeout = if options.flag(option::SHORT_TIMEOUT) {
            SHORT_TIMEOUT
        } else {
            DEFAULT_TIMEOUT
        };

        let mut base =
            Url::parse(target).with_context(|| format!("Invalid target URL: {}", target))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("qassurify/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `path` resolved below the target, never above it.
    fn url(&self, path: &str) -> Url {
        self.base
            .join(path.trim_start_matches('/'))
            .unwrap_or_else(|_| self.base.clone())
    }

    pub async fn get(&self, path: &str) -> Result<PageResponse, reqwest::Error> {
        let url = self.url(path);
        let started = Instant::now();
        let response = self.client.get(url).send().await?;
        read(response, started).await
    }

    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
    ) -> Result<PageResponse, reqwest::Error> {
        let url = self.url(path);
        let started = Instant::now();
        let response = self.client.post(url).form(form).send().await?;
        read(response, started).await
    }

    /// Describe a transport error, naming timeouts explicitly.
    pub fn describe_error(&self, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("Request timeout after {}s: {}", self.timeout.as_secs(), err)
        } else if err.is_connect() {
            format!("Connection failed: {}", err)
        } else {
            format!("Request failed: {}", err)
        }
    }

    /// Classify a page fetch into a record.
    pub fn page_record(
        &self,
        title: &str,
        cat: &str,
        result: &Result<PageResponse, reqwest::Error>,
    ) -> Record {
        match result {
            Ok(page) => classify_status(title, cat, page),
            Err(err) => {
                let severity = if err.is_timeout() {
                    Severity::Medium
                } else {
                    Severity::High
                };
                Record::fail(title, self.describe_error(err), cat, severity)
            }
        }
    }
}

async fn read(
    response: reqwest::Response,
    started: Instant,
) -> Result<PageResponse, reqwest::Error> {
    let url = response.url().clone();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await?;
    Ok(PageResponse {
        url,
        status,
        headers,
        body,
        elapsed: started.elapsed(),
    })
}

fn classify_status(title: &str, cat: &str, page: &PageResponse) -> Record {
    let status = page.status;
    let detail = format!(
        "HTTP {} from {} in {} ms",
        status,
        page.url,
        page.elapsed.as_millis()
    );

    if status.is_success() || status.is_redirection() {
        Record::pass(title, detail, cat)
    } else if status == StatusCode::NOT_FOUND {
        Record::fail(title, format!("Not found: {}", detail), cat, Severity::Medium)
    } else if status.is_server_error() {
        Record::bug(title, format!("Server error: {}", detail), cat, Severity::High)
    } else {
        Record::fail(title, detail, cat, Severity::Low)
    }
}

/// Performance record for a slow response, if it was slow.
pub fn slow_response_record(title: &str, page: &PageResponse) -> Option<Record> {
    (page.elapsed > SLOW_RESPONSE).then(|| {
        Record::fail(
            format!("{} response time", title),
            format!(
                "{} took {} ms (threshold {} ms)",
                page.url,
                page.elapsed.as_millis(),
                SLOW_RESPONSE.as_millis()
            ),
            category::PERFORMANCE,
            Severity::Medium,
        )
    })
}
