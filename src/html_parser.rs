use scraper::{Html, Selector};
use regex::Regex;
use once_cell::sync::Lazy;

static INPUT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("input[name]").expect("Failed to parse input selector"));
static EXPIRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Expiry[\s\S]*?(\d{4}-\d{2}-\d{2})")
        .expect("Failed to compile expiry regex")
});

/// Tokens this short are placeholders, not real csrf values.
const MIN_CSRF_LEN: usize = 10;

/// Extracts the expiry date (`YYYY-MM-DD`) from the server edit page.
/// Only the first date following the word "Expiry" counts.
pub fn extract_expiry(html_content: &str) -> Option<String> {
    EXPIRY_RE
        .captures(html_content)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extracts the anti-forgery token from the first `<input name="csrf">` field.
/// Attribute order does not matter. A value of `MIN_CSRF_LEN` characters or fewer means no token,
/// later csrf inputs are not consulted.
pub fn extract_csrf(html_content: &str) -> Option<String> {
    let document = Html::parse_document(html_content);

    let csrf_input = document.select(&INPUT_SELECTOR).find(|input| {
        input
            .value()
            .attr("name")
            .is_some_and(|name| name.eq_ignore_ascii_case("csrf"))
    })?;

    csrf_input
        .value()
        .attr("value")
        .filter(|value| value.chars().count() > MIN_CSRF_LEN)
        .map(str::to_string)
}
