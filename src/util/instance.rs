use thiserror::Error;
use url::Url;

/// Errors from turning user input into an instance base URL.
#[derive(Error, Debug)]
pub enum InstanceUrlError {
    #[error("No instance given")]
    Empty,
    /// The input could not be parsed as a URL.
    #[error("Invalid instance URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Anything but https, except for local development servers.
    #[error("Unsupported scheme: {0} (use https)")]
    UnsupportedScheme(String),
    #[error("Instance URL has no host")]
    MissingHost,
}

/// Normalize `lemmy.world`, `https://lemmy.world/` or `lemmy.world/c/rust`
/// to the instance root, e.g. `https://lemmy.world/`.
///
/// Plain http is only accepted for `localhost` and loopback addresses.
pub fn normalize_instance_url(input: &str) -> Result<Url, InstanceUrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InstanceUrlError::Empty);
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let mut url = Url::parse(&with_scheme)?;

    let host = url.host_str().ok_or(InstanceUrlError::MissingHost)?;
    let local = is_local_host(host);
    match url.scheme() {
        "https" => {}
        "http" if local => {}
        scheme => return Err(InstanceUrlError::UnsupportedScheme(scheme.to_string())),
    }

    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn is_local_host(host: &str) -> bool {
    host == "localhost"
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_gets_https() {
        let url = normalize_instance_url("lemmy.world").unwrap();
        assert_eq!(url.as_str(), "https://lemmy.world/");
    }

    #[test]
    fn test_path_and_query_dropped() {
        let url = normalize_instance_url("  https://lemmy.ml/c/rust?page=2#top ").unwrap();
        assert_eq!(url.as_str(), "https://lemmy.ml/");
    }

    #[test]
    fn test_http_only_for_local() {
        assert!(normalize_instance_url("http://localhost:8536").is_ok());
        assert!(normalize_instance_url("http://127.0.0.1:8536").is_ok());
        assert!(matches!(
            normalize_instance_url("http://lemmy.world"),
            Err(InstanceUrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            normalize_instance_url("ftp://lemmy.world"),
            Err(InstanceUrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            normalize_instance_url("   "),
            Err(InstanceUrlError::Empty)
        ));
    }
}
