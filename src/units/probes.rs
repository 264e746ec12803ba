//! Built-in probe units.
//!
//! Lightweight HTTP checks against the target. Each unit appends its own
//! records and only returns `Err` when it cannot start at all.

use super::http::{slow_response_record, PageResponse, Probe};
use super::{Unit, UnitContext};
use crate::data::FormKind;
use crate::models::{category, Record, Severity};
use crate::modes::{option, unit, PlanOptions};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

const NAVIGATION_PATHS: &[&str] = &["/", "/about", "/contact", "/products", "/help"];
const API_PATHS: &[&str] = &["/api", "/api/health", "/health", "/api/status", "/api/v1"];

/// Security headers and the severity of their absence.
const SECURITY_HEADERS: &[(&str, Severity)] = &[
    ("content-security-policy", Severity::High),
    ("x-frame-options", Severity::Medium),
    ("x-content-type-options", Severity::Low),
    ("referrer-policy", Severity::Low),
];

fn result_limit(options: &PlanOptions) -> usize {
    options
        .int(option::MAX_RESULTS)
        .map(|max| max.max(1) as usize)
        .unwrap_or(usize::MAX)
}

/// Fetch `path`, record availability (and slowness), return the page if
/// it loaded.
async fn check_page(
    probe: &Probe,
    ctx: &UnitContext,
    title: &str,
    cat: &str,
    path: &str,
) -> Option<PageResponse> {
    let result = probe.get(path).await;
    record_page(probe, ctx, title, cat, result)
}

/// [`check_page`] for a response already fetched.
fn record_page(
    probe: &Probe,
    ctx: &UnitContext,
    title: &str,
    cat: &str,
    result: Result<PageResponse, reqwest::Error>,
) -> Option<PageResponse> {
    ctx.record(probe.page_record(title, cat, &result));

    let page = result.ok()?;
    if let Some(slow) = slow_response_record(title, &page) {
        ctx.record(slow);
    }
    page.status.is_success().then_some(page)
}

/// Record how the target handled deliberately invalid input.
fn invalid_input_record(
    probe: &Probe,
    title: &str,
    cat: &str,
    result: Result<PageResponse, reqwest::Error>,
    server_error_severity: Severity,
) -> Record {
    match result {
        Ok(page) if page.status.is_server_error() => Record::bug(
            title,
            format!("Server error {} on invalid input", page.status),
            cat,
            server_error_severity,
        ),
        Ok(page) => Record::pass(
            title,
            format!("Invalid input handled with HTTP {}", page.status),
            cat,
        ),
        Err(err) => Record::fail(title, probe.describe_error(&err), cat, Severity::Medium),
    }
}

fn form_presence_record(title: &str, page: &PageResponse, needle: &str) -> Record {
    if page.body_contains(needle) {
        Record::pass(title, format!("Found {} on {}", needle, page.url), category::UI)
    } else {
        Record::bug(
            title,
            format!("Expected {} on {}", needle, page.url),
            category::UI,
            Severity::Medium,
        )
    }
}

pub struct NavigationUnit;

#[async_trait]
impl Unit for NavigationUnit {
    fn name(&self) -> &str {
        unit::NAVIGATION
    }

    fn description(&self) -> &str {
        "Page availability, titles and response times"
    }

    async fn run(&self, ctx: UnitContext) -> anyhow::Result<()> {
        let probe = Probe::new(&ctx.target, &ctx.options)?;
        let validate = !ctx.options.flag(option::SKIP_VALIDATION);

        for path in NAVIGATION_PATHS.iter().take(result_limit(&ctx.options)) {
            let title = format!("Navigate to {}", path);
            let Some(page) = check_page(&probe, &ctx, &title, category::UI, path).await else {
                continue;
            };
            if validate && !page.body_contains("<title") {
                ctx.record(Record::bug(
                    format!("{} has a title", path),
                    format!("No <title> element on {}", page.url),
                    category::UI,
                    Severity::Low,
                ));
            }
        }
        Ok(())
    }
}

pub struct FormsUnit;

#[async_trait]
impl Unit for FormsUnit {
    fn name(&self) -> &str {
        unit::FORMS
    }

    fn description(&self) -> &str {
        "Form presence and invalid submission handling"
    }

    async fn run(&self, ctx: UnitContext) -> anyhow::Result<()> {
        let probe = Probe::new(&ctx.target, &ctx.options)?;

        let Some(page) = check_page(&probe, &ctx, "Contact page loads", category::UI, "/contact").await
        else {
            return Ok(());
        };

        let forms = page.count("<form");
        if forms == 0 {
            ctx.record(Record::fail(
                "Contact form present",
                format!("No <form> elements on {}", page.url),
                category::UI,
                Severity::Low,
            ));
            return Ok(());
        }
        ctx.record(Record::pass(
            "Contact form present",
            format!("{} form(s) on {}", forms, page.url),
            category::UI,
        ));

        if ctx.options.flag(option::SKIP_VALIDATION) {
            debug!("Skipping form validation checks");
            return Ok(());
        }

        let invalid = ctx.data.form_data(FormKind::Contact, false);
        let result = probe.post_form("/contact", &invalid).await;
        ctx.record(invalid_input_record(
            &probe,
            "Contact form rejects invalid input",
            category::UI,
            result,
            Severity::High,
        ));

        let edge = ctx.data.edge_cases();
        let result = probe.post_form("/contact", &edge).await;
        ctx.record(invalid_input_record(
            &probe,
            "Contact form survives edge-case input",
            category::UI,
            result,
            Severity::High,
        ));
        Ok(())
    }
}

pub struct LoginUnit;

#[async_trait]
impl Unit for LoginUnit {
    fn name(&self) -> &str {
        unit::LOGIN
    }

    fn description(&self) -> &str {
        "Login form presence, invalid credentials and injection handling"
    }

    async fn run(&self, ctx: UnitContext) -> anyhow::Result<()> {
        let probe = Probe::new(&ctx.target, &ctx.options)?;

        let Some(page) = check_page(&probe, &ctx, "Login page loads", category::UI, "/login").await
        else {
            return Ok(());
        };
        ctx.record(form_presence_record(
            "Login form has password field",
            &page,
            "type=\"password\"",
        ));

        if ctx.options.flag(option::SKIP_VALIDATION) {
            return Ok(());
        }

        let creds = ctx.data.login_data(false);
        let result = probe.post_form("/login", &creds).await;
        ctx.record(invalid_input_record(
            &probe,
            "Invalid credentials handled",
            category::UI,
            result,
            Severity::High,
        ));

        let limit = result_limit(&ctx.options);
        for payload in ctx.data.sql_injection_payloads().into_iter().take(limit) {
            let form = [("username", payload), ("password", "x")];
            let result = probe.post_form("/login", &form).await;
            ctx.record(invalid_input_record(
                &probe,
                &format!("Login rejects SQL injection {}", payload),
                category::SECURITY,
                result,
                Severity::Critical,
            ));
        }
        Ok(())
    }
}

pub struct SignupUnit;

#[async_trait]
impl Unit for SignupUnit {
    fn name(&self) -> &str {
        unit::SIGNUP
    }

    fn description(&self) -> &str {
        "Registration form presence and invalid user data handling"
    }

    async fn run(&self, ctx: UnitContext) -> anyhow::Result<()> {
        let probe = Probe::new(&ctx.target, &ctx.options)?;

        let (path, result) = match probe.get("/signup").await {
            Ok(page) if page.status == StatusCode::NOT_FOUND => {
                ("/register", probe.get("/register").await)
            }
            other => ("/signup", other),
        };
        let Some(page) = record_page(&probe, &ctx, "Signup page loads", category::UI, result)
        else {
            return Ok(());
        };
        ctx.record(form_presence_record("Signup form present", &page, "<form"));

        if ctx.options.flag(option::SKIP_VALIDATION) {
            return Ok(());
        }

        let invalid = ctx.data.user_data(false);
        let result = probe.post_form(path, &invalid).await;
        ctx.record(invalid_input_record(
            &probe,
            "Signup rejects invalid user data",
            category::UI,
            result,
            Severity::High,
        ));

        let limit = result_limit(&ctx.options);
        for payload in ctx.data.xss_payloads().into_iter().take(limit) {
            let mut user = ctx.data.user_data(true);
            user.first_name = payload.to_string();
            match probe.post_form(path, &user).await {
                Ok(page) if page.body.contains(payload) => ctx.record(Record::bug(
                    "Signup escapes script input",
                    format!("Payload reflected unescaped: {}", payload),
                    category::SECURITY,
                    Severity::Critical,
                )),
                result => ctx.record(invalid_input_record(
                    &probe,
                    "Signup escapes script input",
                    category::SECURITY,
                    result,
                    Severity::High,
                )),
            }
        }
        Ok(())
    }
}

pub struct ApiUnit;

#[async_trait]
impl Unit for ApiUnit {
    fn name(&self) -> &str {
        unit::API
    }

    fn description(&self) -> &str {
        "API endpoint reachability and JSON responses"
    }

    async fn run(&self, ctx: UnitContext) -> anyhow::Result<()> {
        let probe = Probe::new(&ctx.target, &ctx.options)?;

        for path in API_PATHS.iter().take(result_limit(&ctx.options)) {
            let title = format!("API {} responds", path);
            let Some(page) = check_page(&probe, &ctx, &title, category::API, path).await else {
                continue;
            };
            if !page.is_json() {
                ctx.record(Record::fail(
                    format!("API {} returns JSON", path),
                    format!("Content-Type is not JSON at {}", page.url),
                    category::API,
                    Severity::Low,
                ));
            }
        }
        Ok(())
    }
}

pub struct SecurityUnit;

#[async_trait]
impl Unit for SecurityUnit {
    fn name(&self) -> &str {
        unit::SECURITY
    }

    fn description(&self) -> &str {
        "Transport security and response headers"
    }

    async fn run(&self, ctx: UnitContext) -> anyhow::Result<()> {
        let probe = Probe::new(&ctx.target, &ctx.options)?;

        if probe.base().scheme() == "https" {
            ctx.record(Record::pass(
                "Served over HTTPS",
                probe.base().to_string(),
                category::SECURITY,
            ));
        } else {
            ctx.record(Record::fail(
                "Served over HTTPS",
                format!("{} is plain HTTP", probe.base()),
                category::SECURITY,
                Severity::Medium,
            ));
        }

        let result = probe.get("/").await;
        let page = match result {
            Ok(page) => page,
            Err(err) => {
                ctx.record(Record::fail(
                    "Security headers",
                    probe.describe_error(&err),
                    category::SECURITY,
                    Severity::High,
                ));
                return Ok(());
            }
        };

        for (header, severity) in SECURITY_HEADERS {
            let title = format!("Header {} set", header);
            match page.headers.get(*header) {
                Some(value) => ctx.record(Record::pass(
                    title,
                    value.to_str().unwrap_or("<binary>").to_string(),
                    category::SECURITY,
                )),
                None => ctx.record(Record::bug(
                    title,
                    format!("{} missing from {}", header, page.url),
                    category::SECURITY,
                    *severity,
                )),
            }
        }

        if page.url.scheme() == "https" && page.headers.get("strict-transport-security").is_none() {
            ctx.record(Record::bug(
                "Header strict-transport-security set",
                format!("HSTS missing from {}", page.url),
                category::SECURITY,
                Severity::High,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ResultAggregator;
    use crate::data::DataGenerator;
    use crate::models::Outcome;
    use crate::modes::OptionValue;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Local HTTP server answering every request with `status_for(path)`
    /// and a page holding a form. Returns its address and the paths it saw.
    async fn serve(status_for: fn(&str) -> u16) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let path = String::from_utf8_lossy(&request)
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();
                let status = status_for(&path);
                log.lock().unwrap().push(path);

                let body = "<html><form method=\"post\"></form></html>";
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), seen)
    }

    fn page_only_context(target: String) -> UnitContext {
        let options = PlanOptions::default().with(option::SKIP_VALIDATION, OptionValue::Bool(true));
        UnitContext {
            target,
            aggregator: Arc::new(ResultAggregator::new()),
            data: Arc::new(DataGenerator::new()),
            options: Arc::new(options),
        }
    }

    #[tokio::test]
    async fn test_signup_fetches_page_once() {
        let (target, seen) = serve(|_| 200).await;
        let ctx = page_only_context(target);

        SignupUnit.run(ctx.clone()).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["/signup".to_string()]);
        let records = ctx.aggregator.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.outcome == Outcome::Pass));
        assert_eq!(records[1].title, "Signup form present");
    }

    #[tokio::test]
    async fn test_signup_falls_back_to_register() {
        let (target, seen) = serve(|path| if path == "/signup" { 404 } else { 200 }).await;
        let ctx = page_only_context(target);

        SignupUnit.run(ctx.clone()).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["/signup".to_string(), "/register".to_string()]
        );
        let records = ctx.aggregator.records();
        assert_eq!(records[0].title, "Signup page loads");
        assert_eq!(records[0].outcome, Outcome::Pass);
        assert!(records[0].detail.contains("/register"));
    }

    #[test]
    fn test_result_limit() {
        assert_eq!(result_limit(&PlanOptions::default()), usize::MAX);
        let options = PlanOptions::default().with(option::MAX_RESULTS, OptionValue::Int(3));
        assert_eq!(result_limit(&options), 3);
        let options = PlanOptions::default().with(option::MAX_RESULTS, OptionValue::Int(0));
        assert_eq!(result_limit(&options), 1);
    }

    #[tokio::test]
    async fn test_unreachable_target_records_failures() {
        // Port 9 (discard) on localhost is closed in test environments.
        let options = PlanOptions::default().with(option::SHORT_TIMEOUT, OptionValue::Bool(true));
        let ctx = UnitContext {
            target: "http://127.0.0.1:9".to_string(),
            aggregator: Arc::new(ResultAggregator::new()),
            data: Arc::new(DataGenerator::new()),
            options: Arc::new(options),
        };

        ApiUnit.run(ctx.clone()).await.unwrap();

        let records = ctx.aggregator.records();
        assert_eq!(records.len(), API_PATHS.len());
        assert!(records.iter().all(|r| r.outcome == Outcome::Fail));
    }

    #[tokio::test]
    async fn test_invalid_target_is_unit_error() {
        let ctx = UnitContext {
            target: "::not-a-url::".to_string(),
            aggregator: Arc::new(ResultAggregator::new()),
            data: Arc::new(DataGenerator::new()),
            options: Arc::new(PlanOptions::default()),
        };
        assert!(NavigationUnit.run(ctx).await.is_err());
    }
}
