use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static AVAILABLE_ON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"as of (\d+) (\w+)").expect("Failed to compile renew-error date regex")
});

pub const RENEW_ERROR_PARAM: &str = "renew-error";

/// A renewal-blocking condition reported by the dashboard through the `renew-error` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewError {
    pub message: String,
    /// "March 14" style date extracted from an "as of 14 March" message.
    pub available_on: Option<String>,
}

/// Whole days from `today` to `date_str` (`YYYY-MM-DD`). Negative once the date has passed.
pub fn days_until(date_str: &str, today: NaiveDate) -> Option<i64> {
    let expiry = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
    Some((expiry - today).num_days())
}

/// Compares two expiry strings. Zero-padded ISO dates order the same way as strings and as dates.
pub fn expiry_is_newer(old: &str, new: &str) -> bool {
    new > old
}

/// Reads the `renew-error` parameter from the final status page URL, if any.
pub fn parse_renew_error(url: &Url) -> Option<RenewError> {
    if !url.as_str().contains(RENEW_ERROR_PARAM) {
        return None;
    }

    // query_pairs decodes '+' as a space and percent escapes.
    let message = url
        .query_pairs()
        .find(|(key, _)| key == RENEW_ERROR_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());

    let Some(message) = message else {
        return Some(RenewError {
            message: "unknown error".to_string(),
            available_on: None,
        });
    };

    let available_on = AVAILABLE_ON_RE
        .captures(&message)
        .map(|captures| format!("{} {}", &captures[2], &captures[1]));

    Some(RenewError { message, available_on })
}

/// Hides the password part of a proxy URL before it is logged.
pub fn redact_proxy_url(proxy: &str) -> String {
    match Url::parse(proxy) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid proxy url>".to_string(),
    }
}
