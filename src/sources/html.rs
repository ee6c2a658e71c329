//! Helpers for scraping values out of provider HTML pages.

use scraper::{Html, Selector};

use crate::error::ParseError;

/// Creates a CSS selector from a string.
pub fn html_selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::invalid_selector(selector, e))
}

/// Returns `attribute` of the first element matching `selector`.
pub fn parse_attr_from_html(
    document: &Html,
    selector: &str,
    attribute: &str,
) -> Result<String, ParseError> {
    let parsed = html_selector(selector)?;
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| ParseError::element_not_found(selector))?;
    element
        .value()
        .attr(attribute)
        .map(str::to_string)
        .ok_or_else(|| ParseError::missing_attribute(selector, attribute))
}

/// Whether a body that should have been JSON is an HTML page instead.
///
/// Scraped sites answer data requests with their login page once the
/// session cookie has expired.
pub fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with('<') && {
        let lower = head.chars().take(64).collect::<String>().to_ascii_lowercase();
        lower.starts_with("<!doctype html") || lower.starts_with("<html") || lower.starts_with("<head")
    }
}
