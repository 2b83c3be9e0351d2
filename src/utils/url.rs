//! Joining the configured server address with the chat endpoint path.

/// Strip trailing slashes so endpoint joins never produce `//`.
///
/// ```
/// use streamchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8787/"), "http://localhost:8787");
/// assert_eq!(normalize_base_url("http://localhost:8787///"), "http://localhost:8787");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash between them.
///
/// ```
/// use streamchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8787/", "/api/chat"),
///     "http://localhost:8787/api/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Only plain HTTP(S) endpoints are supported.
pub fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.len() > scheme.len() && lower.starts_with(scheme))
}
