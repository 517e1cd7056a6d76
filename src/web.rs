//! Health and stats HTTP server.
//!
//! `/` and `/health` are public so hosting platforms can probe the process.
//! `/stats` and `/suspended` require HTTP Basic Auth with the configured
//! dashboard credentials. Every page refreshes itself every 30 seconds.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::catalog::Rarity;
use crate::database::{RollEvent, RollLedger, UsageLog, UserRecord, UserRepository};
use crate::error::{RollTrackerError, Result};
use crate::stats::BotStats;
use crate::utils::format::{format_remaining, format_uptime};

const AUTH_REALM: &str = "Basic realm=\"Stats Page\"";

/// Dashboard login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct WebState {
    pub users: UserRepository,
    pub ledger: RollLedger,
    pub usage: UsageLog,
    pub stats: Arc<BotStats>,
    pub credentials: Arc<Credentials>,
}

impl WebState {
    pub fn new(db_path: &str, stats: Arc<BotStats>, credentials: Credentials) -> Self {
        Self {
            users: UserRepository::new(db_path.to_string()),
            ledger: RollLedger::new(db_path.to_string()),
            usage: UsageLog::new(db_path.to_string()),
            stats,
            credentials: Arc::new(credentials),
        }
    }
}

/// Storage failure while rendering a page.
struct PageError(RollTrackerError);

impl From<RollTrackerError> for PageError {
    fn from(err: RollTrackerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Failed to render stats page");
        (StatusCode::INTERNAL_SERVER_ERROR, "Stats are temporarily unavailable").into_response()
    }
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/stats", get(stats_page))
        .route("/suspended", get(suspended_page))
        .with_state(state)
}

/// Bind `0.0.0.0:port` and serve until the process exits.
pub async fn serve(state: WebState, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "HTTP server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Whether the request carries the dashboard credentials.
fn check_basic_auth(headers: &HeaderMap, credentials: &Credentials) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    match decoded.split_once(':') {
        Some((user, pass)) => user == credentials.user && pass == credentials.pass,
        None => false,
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, AUTH_REALM)],
        "Unauthorized",
    )
        .into_response()
}

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta http-equiv=\"refresh\" content=\"30\">\n\
         <title>{}</title>\n\
         <style>body{{font-family:sans-serif;background:#0a1929;color:#fff;margin:2em}}\
         table{{border-collapse:collapse}}td,th{{padding:4px 12px;border-bottom:1px solid #1a2f42;text-align:left}}</style>\n\
         </head>\n<body>\n{}\n</body>\n</html>\n",
        html_escape(title),
        body
    ))
}

async fn health(State(state): State<WebState>) -> Html<String> {
    let now = Utc::now();
    let body = format!(
        "<h1>Fruit Roll Tracker</h1>\n\
         <p>Status: Online</p>\n\
         <p>Uptime: {}</p>\n\
         <p>Total rolls: {}</p>\n\
         <p>Guilds: {}</p>",
        format_uptime(state.stats.uptime(now)),
        state.stats.total_rolls(),
        state.stats.guild_count(),
    );
    page("Fruit Roll Tracker - Health", &body)
}

fn next_roll_label(record: &UserRecord, now: DateTime<Utc>) -> String {
    match record.next_eligible_at {
        Some(next) if next > now => format_remaining(next - now),
        Some(_) => "Ready (reminder pending)".to_string(),
        None if record.last_roll_at.is_some() => "Ready".to_string(),
        None => "-".to_string(),
    }
}

fn render_user_rows(users: &[UserRecord], latest: &HashMap<u64, RollEvent>, now: DateTime<Utc>) -> String {
    let mut rows = String::new();
    for user in users {
        let last_fruit = latest
            .get(&user.user_id)
            .map(|roll| format!("{} {}", roll.rarity_tier.marker(), html_escape(&roll.item_name)))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_escape(&user.display_name),
            last_fruit,
            user.total_roll_count,
            if user.notifications_enabled { "On" } else { "Sleeping" },
            html_escape(&next_roll_label(user, now)),
        );
    }
    rows
}

/// Hourly usage series as JSON for the inline chart script.
fn usage_series_json(buckets: &[u64; 24]) -> String {
    let labels: Vec<String> = (0..24).map(|hour| format!("{:02}:00", hour)).collect();
    serde_json::json!({ "labels": labels, "counts": buckets }).to_string()
}

async fn stats_page(State(state): State<WebState>, headers: HeaderMap) -> std::result::Result<Response, PageError> {
    if !check_basic_auth(&headers, &state.credentials) {
        return Ok(unauthorized());
    }

    let now = Utc::now();
    let users = state.users.get_all_users().await?;
    let latest = state.ledger.latest_per_user().await?;
    let distribution = state.ledger.rarity_distribution().await?;
    let usage = state.usage.hourly_usage(now - TimeDelta::hours(24)).await?;

    let active_users = users.iter().filter(|u| u.total_roll_count > 0).count();

    let mut rarity_rows = String::new();
    for rarity in Rarity::ALL {
        let _ = writeln!(
            rarity_rows,
            "<tr><td>{} {}</td><td>{}</td></tr>",
            rarity.marker(),
            rarity,
            distribution.get(&rarity).copied().unwrap_or(0)
        );
    }

    let body = format!(
        "<h1>Fruit Roll Tracker - Stats</h1>\n\
         <p>Uptime: {uptime} | Total rolls: {total} | Active users: {active} | Guilds: {guilds}</p>\n\
         <h2>Rarity distribution</h2>\n<table>\n{rarity_rows}</table>\n\
         <h2>Users</h2>\n<table>\n\
         <tr><th>User</th><th>Last fruit</th><th>Total</th><th>Reminders</th><th>Next roll</th></tr>\n\
         {user_rows}</table>\n\
         <h2>Command usage (last 24h, UTC)</h2>\n<pre id=\"usage\"></pre>\n\
         <script>const usage = {usage_json};\n\
         document.getElementById('usage').textContent = usage.labels\
         .map((label, i) => label + ' ' + '#'.repeat(usage.counts[i]) + ' ' + usage.counts[i]).join('\\n');</script>\n\
         <p><a href=\"/suspended\">Suspended users</a></p>",
        uptime = format_uptime(state.stats.uptime(now)),
        total = state.stats.total_rolls(),
        active = active_users,
        guilds = state.stats.guild_count(),
        rarity_rows = rarity_rows,
        user_rows = render_user_rows(&users, &latest, now),
        usage_json = usage_series_json(&usage),
    );

    Ok(page("Fruit Roll Tracker - Stats", &body).into_response())
}

async fn suspended_page(
    State(state): State<WebState>,
    headers: HeaderMap,
) -> std::result::Result<Response, PageError> {
    if !check_basic_auth(&headers, &state.credentials) {
        return Ok(unauthorized());
    }

    let users = state.users.get_all_users().await?;
    let suspended: Vec<&UserRecord> = users.iter().filter(|u| u.suspended).collect();

    let body = if suspended.is_empty() {
        "<h1>Suspended users</h1>\n<p>No users are suspended.</p>".to_string()
    } else {
        let mut rows = String::new();
        for user in &suspended {
            let _ = writeln!(
                rows,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&user.display_name),
                user.user_id,
                user.total_roll_count
            );
        }
        format!(
            "<h1>Suspended users ({})</h1>\n<table>\n\
             <tr><th>User</th><th>Id</th><th>Total rolls</th></tr>\n{}</table>",
            suspended.len(),
            rows
        )
    };

    Ok(page("Fruit Roll Tracker - Suspended", &body).into_response())
}
