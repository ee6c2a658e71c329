use std::time::Duration;

use reqwest::{Client as HttpClient, RequestBuilder};

use crate::error::{ConnectionError, FetchError};

const USER_AGENT: &str = concat!("netzero/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Builds the HTTP client a session carries.
///
/// Scraped sites need a cookie jar so the login survives across requests;
/// plain API sources do not.
pub fn http_client(cookies: bool) -> Result<HttpClient, ConnectionError> {
    let client = HttpClient::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .cookie_store(cookies)
        .build()?;
    Ok(client)
}

/// Sends a data request and returns the body of a successful response.
pub async fn fetch_text(request: RequestBuilder) -> Result<String, FetchError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(FetchError::server_error(status, body))
    }
}

/// Same as [`fetch_text`] but for requests made while establishing a
/// session, so failures are reported as connection errors.
pub async fn connect_text(request: RequestBuilder) -> Result<String, ConnectionError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(ConnectionError::server_error(status, body))
    }
}

/// Joins a base URL and a path without doubling the slash.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
