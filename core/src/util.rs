//! Shared utility functions for the application

use anyhow::{bail, Context, Result};

/// Sanitize a string value for safe use in HTTP headers.
///
/// Rejects control characters, DEL, null bytes and line breaks, which
/// would otherwise corrupt the request or allow header injection.
pub fn sanitize_for_header(value: &str, field_name: &str) -> Result<String> {
    if value.is_empty() {
        bail!("{} cannot be empty", field_name);
    }

    for (index, ch) in value.char_indices() {
        let byte = ch as u8;
        if (byte <= 0x1F) || byte == 0x7F || ch == '\0' || ch == '\r' || ch == '\n' {
            bail!(
                "{} contains invalid character at position {} (byte value: {:#04x})",
                field_name,
                index,
                byte
            );
        }
    }

    Ok(value.to_string())
}

/// Validate an API key can be used in an Authorization header.
///
/// Combines character filtering with an actual HeaderValue parse to catch
/// edge cases the filter misses.
pub fn validate_api_key(api_key: &str) -> Result<String> {
    let trimmed = api_key.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        bail!("API key is empty or set to 'none'");
    }

    sanitize_for_header(trimmed, "API key")?;

    let header_value = format!("Bearer {}", trimmed);
    header_value
        .parse::<reqwest::header::HeaderValue>()
        .with_context(|| {
            format!(
                "API key results in invalid Authorization header (key length: {} characters)",
                trimmed.len()
            )
        })?;

    Ok(trimmed.to_string())
}

/// Sanitize a base URL for API requests.
pub fn sanitize_base_url(url: &str, field_name: &str) -> Result<String> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        bail!("{} cannot be empty", field_name);
    }

    // %2F/%3D/%20 in a base URL almost always means double-encoding or a
    // corrupted config value.
    if trimmed.contains("%2F") || trimmed.contains("%3D") || trimmed.contains("%20") {
        bail!(
            "{} appears to contain URL-encoded characters; verify the URL is not double-encoded",
            field_name
        );
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        bail!(
            "{} must start with 'http://' or 'https://'. Got: {}",
            field_name,
            trimmed
        );
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_for_header() {
        assert!(sanitize_for_header("sk-abc123xyz", "test").is_ok());
        assert!(sanitize_for_header("abc\n123", "test").is_err());
        assert!(sanitize_for_header("abc\x00123", "test").is_err());
        assert!(sanitize_for_header("abc\x7f123", "test").is_err());
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("sk-test123").is_ok());
        assert!(validate_api_key("").is_err());
        assert!(validate_api_key("none").is_err());
        assert!(validate_api_key(" \n ").is_err());
    }

    #[test]
    fn test_sanitize_base_url() {
        assert!(sanitize_base_url("https://api.example.com/v1", "url").is_ok());
        assert!(sanitize_base_url("http://localhost:8000", "url").is_ok());
        assert!(sanitize_base_url("", "url").is_err());
        assert!(sanitize_base_url("localhost:8000", "url").is_err());
        assert!(sanitize_base_url("https://api.example%2Fcom", "url").is_err());
    }
}
