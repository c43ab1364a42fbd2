use crate::error::GatewayError;

/// Largest batch accepted by the bulk endpoint.
pub const MAX_BULK_URLS: usize = 1000;

/// Validates that the URL has a valid format (has a scheme and host).
pub fn validate_url(url: &str) -> Result<(), GatewayError> {
    if url.is_empty() {
        return Err(GatewayError::InvalidUrl(
            "URL cannot be empty".to_string(),
        ));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(GatewayError::InvalidUrl(format!(
            "URL must have a valid scheme and host: {url}"
        )));
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if scheme.is_empty() || host_name(authority).is_empty() {
        return Err(GatewayError::InvalidUrl(format!(
            "URL must have a valid scheme and host: {url}"
        )));
    }

    let scheme = scheme.to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(GatewayError::InvalidUrl(format!(
            "URL scheme must be http or https: {scheme}"
        )));
    }

    if url.chars().any(char::is_whitespace) {
        return Err(GatewayError::InvalidUrl(format!(
            "URL must not contain whitespace: {url}"
        )));
    }

    Ok(())
}

/// Host of an authority, without userinfo and port.
fn host_name(authority: &str) -> &str {
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    if host_port.starts_with('[') {
        // IPv6 literal, the port follows the closing bracket
        return host_port
            .split_once(']')
            .map_or("", |(literal, _)| literal.trim_start_matches('['));
    }

    host_port
        .split_once(':')
        .map_or(host_port, |(host, _)| host)
}

pub fn validate_bulk(urls: &[String]) -> Result<(), GatewayError> {
    if urls.len() > MAX_BULK_URLS {
        return Err(GatewayError::InvalidRequest(format!(
            "at most {MAX_BULK_URLS} urls per request, got {}",
            urls.len()
        )));
    }
    urls.iter().try_for_each(|url| validate_url(url))
}
