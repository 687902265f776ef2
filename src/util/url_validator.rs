use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a feed URL is refused before any request is made.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL embeds a username or password.
    #[error("Credentials in feed URLs are not allowed")]
    Credentials,
    /// The host is loopback or a private/link-local address.
    #[error("Private or loopback address not allowed: {0}")]
    PrivateHost(String),
}

/// Which feed URLs the HTTP transport is willing to request.
///
/// The default policy only admits public http(s) hosts. `allow_private_hosts`
/// lifts the loopback/private-range check, for feeds served on a LAN or by a
/// local mock server. Built-in feed URLs are fixed, but registries built with
/// `FeedRegistry::from_sources` carry arbitrary URLs and go through the same check.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlPolicy {
    pub allow_private_hosts: bool,
}

impl UrlPolicy {
    pub fn permissive() -> Self {
        Self {
            allow_private_hosts: true,
        }
    }

    /// Parses `url_str` and checks it against the policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use marketwire::util::UrlPolicy;
    ///
    /// let policy = UrlPolicy::default();
    /// assert!(policy.validate("https://www.nasdaq.com/feed/nasdaq-original/rss.xml").is_ok());
    /// assert!(policy.validate("file:///etc/passwd").is_err());
    /// assert!(policy.validate("http://127.0.0.1/feed").is_err());
    /// assert!(UrlPolicy::permissive().validate("http://127.0.0.1/feed").is_ok());
    /// ```
    pub fn validate(&self, url_str: &str) -> Result<Url, UrlValidationError> {
        let url = Url::parse(url_str)?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(UrlValidationError::Credentials);
        }

        let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

        if !self.allow_private_hosts {
            if host.eq_ignore_ascii_case("localhost") {
                return Err(UrlValidationError::PrivateHost(host.to_owned()));
            }

            // Strip brackets from IPv6 addresses for parsing
            let host_for_parse = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);

            if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
                if is_private_ip(&ip) {
                    return Err(UrlValidationError::PrivateHost(ip.to_string()));
                }
            }
        }

        Ok(url)
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_style_urls_accepted() {
        let policy = UrlPolicy::default();
        assert!(policy
            .validate("https://www.marketwatch.com/rss/topstories")
            .is_ok());
        assert!(policy
            .validate("https://www.reutersagency.com/feed/?taxonomy=best-sectors&post_type=best")
            .is_ok());
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        let policy = UrlPolicy::permissive();
        assert!(matches!(
            policy.validate("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(policy.validate("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_credentials_rejected() {
        let result = UrlPolicy::permissive().validate("https://user:pw@example.com/feed");
        assert!(matches!(result, Err(UrlValidationError::Credentials)));
    }

    #[test]
    fn test_private_hosts_rejected_by_default() {
        let policy = UrlPolicy::default();
        for url in [
            "http://localhost/feed",
            "http://127.0.0.1:8080/feed",
            "http://10.0.0.1/feed",
            "http://192.168.1.1/feed",
            "http://169.254.1.1/feed",
            "http://[::1]/feed",
            "http://[fe80::1]/feed",
            "http://0.0.0.0/feed",
        ] {
            assert!(
                matches!(policy.validate(url), Err(UrlValidationError::PrivateHost(_))),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_permissive_policy_allows_loopback() {
        assert!(UrlPolicy::permissive()
            .validate("http://127.0.0.1:4321/feed")
            .is_ok());
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert!(matches!(
            UrlPolicy::default().validate("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
