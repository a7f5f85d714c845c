//! Password-grant token exchange.

use log::info;

use crate::config::Credentials;
use crate::error::{ReconcileError, Result};
use crate::http::{api_url, Headers, HttpClient, Transport};

const TOKEN_PATH: &str = "/api/oauth/token?grant_type=password";

/// Headers carrying a fixed `Authorization` value (the client seed, or a
/// bearer token once we have one).
pub fn authorization_headers(value: &str) -> Headers {
    let mut headers = Headers::new();
    headers.insert("Authorization".to_string(), value.to_string());
    headers
}

/// Headers for API calls made on behalf of the authenticated user.
pub fn bearer_headers(token: &str) -> Headers {
    authorization_headers(&format!("Bearer {}", token))
}

/// Exchanges username and password for an access token.
///
/// `headers` must carry the client's seed `Authorization` header.
pub fn get_token<T: Transport>(
    client: &HttpClient<T>,
    base_url: &str,
    headers: &Headers,
    username: &str,
    password: &str,
) -> Result<String> {
    let response = client.post_form(
        &api_url(base_url, TOKEN_PATH),
        headers,
        vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ],
    )?;

    response
        .get("access_token")
        .and_then(|token| token.as_str())
        .map(str::to_string)
        .ok_or(ReconcileError::MissingToken)
}

/// Authenticates with the given credentials and returns bearer headers.
pub fn authenticate<T: Transport>(
    client: &HttpClient<T>,
    credentials: &Credentials,
) -> Result<Headers> {
    let seed = authorization_headers(&credentials.auth_header);
    let token = get_token(
        client,
        &credentials.base_url,
        &seed,
        &credentials.username,
        &credentials.password,
    )?;
    info!("Authenticated as {}", credentials.username);
    Ok(bearer_headers(&token))
}
