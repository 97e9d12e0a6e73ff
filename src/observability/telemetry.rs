//! Telemetry & Observability
//!
//! Structured logging for client operations:
//! - Request spans with timing and outcome
//! - Test-session state transition logging
//! - Configurable log levels via RUST_LOG
//! - Token redaction before anything reaches the log

use regex::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sanitize a string for safe log output by escaping control characters.
/// Prevents log injection where server-supplied text embeds newlines.
pub fn sanitize_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x1b' => out.push_str("\\e"),
            '\x00' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        vec![
            // X-Auth-Token header values and token query/JSON fields
            Regex::new(r#"(?i)(x-auth-token|"token")\s*[:=]\s*"?[A-Za-z0-9_\-\.]{8,}"?"#)
                .expect("invalid token regex"),
            // JWT-shaped strings (three base64url segments)
            Regex::new(r"eyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+")
                .expect("invalid jwt regex"),
            // Passwords in JSON bodies or key=value pairs
            Regex::new(r#"(?i)"?password"?\s*[:=]\s*"?[^"\s,}]+"?"#)
                .expect("invalid password regex"),
        ]
    })
}

/// Redact auth tokens and passwords, replacing them with `[REDACTED]`.
pub fn redact_secrets(input: &str) -> String {
    let mut result = input.to_string();
    for pattern in secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }
    result
}

/// Initialize global tracing subscriber.
/// Stays silent unless RUST_LOG is set, so CLI output is not polluted.
pub fn init_tracing() {
    if let Ok(filter) = std::env::var("RUST_LOG") {
        init_tracing_with_filter(&filter);
    }
}

/// Initialize tracing for `--verbose`
pub fn init_tracing_verbose() {
    init_tracing_with_filter("lectern=debug,info")
}

/// Initialize with custom filter string
pub fn init_tracing_with_filter(filter: &str) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter_layer = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));

        // LECTERN_LOG_FORMAT=json for machine-readable logs
        if std::env::var("LECTERN_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(json_layer)
                .try_init();
            return;
        }

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_level(true)
            .compact()
            .with_writer(std::io::stderr);

        let _ = tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .try_init();
    });
}

/// Run one API request inside a span, logging duration and outcome.
pub async fn track_request<F, Fut, T, E>(method: &str, url: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let safe_url = redact_secrets(&sanitize_for_log(url));
    let span = info_span!(
        "api.request",
        method = method,
        url = safe_url.as_str(),
        duration_ms = tracing::field::Empty,
        success = tracing::field::Empty,
    );
    let result = async {
        debug!("Sending request");
        f().await
    }
    .instrument(span.clone())
    .await;
    let duration = start.elapsed().as_millis() as u64;
    span.record("duration_ms", duration);

    match &result {
        Ok(_) => {
            span.record("success", true);
            debug!(duration_ms = duration, "Request completed");
        }
        Err(e) => {
            span.record("success", false);
            let safe_err = redact_secrets(&sanitize_for_log(&e.to_string()));
            warn!(
                duration_ms = duration,
                error = safe_err.as_str(),
                "Request failed"
            );
        }
    }
    result
}

/// Record a test-session state transition
pub fn record_state_transition(test_id: &str, from: &str, to: &str) {
    info!(
        test_id = sanitize_for_log(test_id).as_str(),
        from = from,
        to = to,
        "Test session transition"
    );
}

/// Tracing shuts down with the process; kept as the single exit hook.
pub fn shutdown_tracing() {
    debug!("Shutting down tracing");
}

/// Initialize tracing for tests with a simple subscriber
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
