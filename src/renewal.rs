//! The single pass of a run: log in, read the server status, try to renew and report.

use chrono::{Local, NaiveDate};
use log::{error, info, warn};
use reqwest::StatusCode;

use crate::config::Config;
use crate::error::AppError;
use crate::html_parser;
use crate::network_client::{self, NetworkError, Page, RenewResponse, Session};
use crate::notifier::{self, Notifier};
use crate::utils::{self, RenewError};

/// Reminders and "check status" warnings only go out this close to expiry.
pub const REMINDER_THRESHOLD_DAYS: i64 = 2;

const UNKNOWN_EXPIRY: &str = "unknown";

/// What the server edit page says about the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub expiry: Option<String>,
    pub days_left: Option<i64>,
    pub csrf: Option<String>,
    pub renew_error: Option<RenewError>,
}

impl ServerStatus {
    pub fn from_page(page: &Page, today: NaiveDate) -> ServerStatus {
        let expiry = html_parser::extract_expiry(&page.html);
        let days_left = expiry.as_deref().and_then(|date| utils::days_until(date, today));
        ServerStatus {
            expiry,
            days_left,
            csrf: html_parser::extract_csrf(&page.html),
            renew_error: utils::parse_renew_error(&page.url),
        }
    }

    pub fn expiry_label(&self) -> &str {
        self.expiry.as_deref().unwrap_or(UNKNOWN_EXPIRY)
    }

    fn expires_soon(&self) -> bool {
        self.days_left.is_some_and(|days| days <= REMINDER_THRESHOLD_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The dashboard refused renewal before any attempt was made.
    Blocked(RenewError),
    Succeeded { old_expiry: String, new_expiry: String },
    CaptchaRequired,
    /// The request went out but the expiry did not visibly move.
    Uncertain { expiry: Option<String> },
}

/// How the raw renewal response is interpreted before any follow-up request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewDecision {
    Success,
    Captcha,
    Verify,
}

pub fn classify_renew_response(response: &RenewResponse) -> RenewDecision {
    if response.status != StatusCode::FOUND {
        return RenewDecision::Verify;
    }
    match response.location.as_deref() {
        Some(location) if location.contains("renew=success") => RenewDecision::Success,
        Some(location) if location.contains("error=captcha") => RenewDecision::Captcha,
        _ => RenewDecision::Verify,
    }
}

pub async fn login(session: &Session, config: &Config) -> Result<(), AppError> {
    info!("Logging in...");
    let landed_on = session.login(config).await?;
    info!("URL after login: {}", landed_on);

    if network_client::is_login_rejected(&landed_on) {
        return Err(AppError::Auth("invalid credentials or login rejected".to_string()));
    }
    info!("Login succeeded");
    Ok(())
}

pub async fn read_status(
    session: &Session,
    config: &Config,
    today: NaiveDate,
) -> Result<ServerStatus, NetworkError> {
    let page = session.fetch_server_page(config).await?;
    Ok(ServerStatus::from_page(&page, today))
}

/// Posts the renewal and works out whether it took effect.
/// Only call this when `status` carries no renew error.
pub async fn attempt_renewal(
    session: &Session,
    config: &Config,
    status: &ServerStatus,
    today: NaiveDate,
) -> Result<RenewalOutcome, NetworkError> {
    info!("Attempting renewal...");
    let response = session.submit_renewal(config, status.csrf.as_deref()).await?;
    info!("Renewal status code: {}", response.status);
    if let Some(location) = &response.location {
        info!("Redirected to: {}", location);
    }

    match classify_renew_response(&response) {
        RenewDecision::Success => {
            let updated = read_status(session, config, today).await?;
            Ok(RenewalOutcome::Succeeded {
                old_expiry: status.expiry_label().to_string(),
                new_expiry: updated.expiry_label().to_string(),
            })
        }
        RenewDecision::Captcha => Ok(RenewalOutcome::CaptchaRequired),
        RenewDecision::Verify => {
            let updated = read_status(session, config, today).await?;
            match (&status.expiry, &updated.expiry) {
                (Some(old), Some(new)) if utils::expiry_is_newer(old, new) => Ok(RenewalOutcome::Succeeded {
                    old_expiry: old.clone(),
                    new_expiry: new.clone(),
                }),
                _ => Ok(RenewalOutcome::Uncertain { expiry: updated.expiry }),
            }
        }
    }
}

/// Runs the whole pipeline once. Any failure is reported through `notifier` before it is returned.
pub async fn run(config: &Config, notifier: &Notifier) -> Result<RenewalOutcome, AppError> {
    info!("KataBump auto-renew");
    info!("Server ID: {}", config.server_id);

    match execute(config, notifier, Local::now().date_naive()).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            error!("Error: {}", err);
            notifier.notify(&notifier::error_message(config, &err)).await;
            Err(err)
        }
    }
}

async fn execute(config: &Config, notifier: &Notifier, today: NaiveDate) -> Result<RenewalOutcome, AppError> {
    let session = Session::new(config)?;
    login(&session, config).await?;

    let status = read_status(&session, config, today).await?;
    match status.days_left {
        Some(days) => info!("Expiry: {} ({} days left)", status.expiry_label(), days),
        None => info!("Expiry: {} (days left unknown)", status.expiry_label()),
    }

    if let Some(renew_error) = &status.renew_error {
        info!("Renewal not available: {}", renew_error.message);
        if let Some(date) = &renew_error.available_on {
            info!("Renewal opens on {}", date);
        }
        if let Some(days) = status.days_left.filter(|days| *days <= REMINDER_THRESHOLD_DAYS) {
            let text = notifier::reminder_message(config, status.expiry_label(), days, renew_error);
            notifier.notify(&text).await;
        }
        return Ok(RenewalOutcome::Blocked(renew_error.clone()));
    }

    let outcome = attempt_renewal(&session, config, &status, today).await?;
    match &outcome {
        RenewalOutcome::Succeeded { old_expiry, new_expiry } => {
            info!("Renewal succeeded: {} -> {}", old_expiry, new_expiry);
            notifier.notify(&notifier::success_message(config, old_expiry, new_expiry)).await;
        }
        RenewalOutcome::CaptchaRequired => {
            return Err(AppError::Captcha("manual renewal required".to_string()));
        }
        RenewalOutcome::Uncertain { expiry } => {
            let expiry = expiry.as_deref().unwrap_or(UNKNOWN_EXPIRY);
            warn!("Expiry did not change after renewal ({})", expiry);
            if status.expires_soon() {
                notifier.notify(&notifier::check_status_message(config, expiry)).await;
            }
        }
        RenewalOutcome::Blocked(_) => {}
    }
    Ok(outcome)
}
