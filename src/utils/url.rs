//! Endpoint URL helpers for the Gemini REST API.

/// Strip trailing slashes from a configured base URL.
///
/// ```
/// use moodchat::utils::url::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("https://generativelanguage.googleapis.com/v1beta/"),
///     "https://generativelanguage.googleapis.com/v1beta"
/// );
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path without doubling slashes.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Streaming endpoint for `model`, requesting server-sent events.
///
/// A `models/` prefix on the model name is accepted and not repeated.
///
/// ```
/// use moodchat::utils::url::stream_generate_url;
///
/// assert_eq!(
///     stream_generate_url("https://example.test/v1beta/", "gemini-3-pro-preview"),
///     "https://example.test/v1beta/models/gemini-3-pro-preview:streamGenerateContent?alt=sse"
/// );
/// ```
pub fn stream_generate_url(base_url: &str, model: &str) -> String {
    let model = model.trim().trim_start_matches("models/");
    construct_api_url(
        base_url,
        &format!("models/{model}:streamGenerateContent?alt=sse"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://example.test/v1beta"),
            "https://example.test/v1beta"
        );
        assert_eq!(
            normalize_base_url("https://example.test/v1beta///"),
            "https://example.test/v1beta"
        );
        assert_eq!(normalize_base_url("  https://example.test/ "), "https://example.test");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("https://example.test/v1beta/", "/models"),
            "https://example.test/v1beta/models"
        );
        assert_eq!(
            construct_api_url("https://example.test/v1beta", "///models"),
            "https://example.test/v1beta/models"
        );
    }

    #[test]
    fn test_stream_generate_url_accepts_prefixed_model() {
        assert_eq!(
            stream_generate_url("https://example.test/v1beta", "models/gemini-pro"),
            "https://example.test/v1beta/models/gemini-pro:streamGenerateContent?alt=sse"
        );
    }
}
