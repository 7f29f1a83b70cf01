//! URL safety predicate applied to every URL about to leave the process:
//! resolver output, fallback search/homepage URLs, and any `resolved_url`
//! passed straight through from a precomputed step (open question OQ-c,
//! see SPEC_FULL.md design notes).

use std::net::IpAddr;
use url::Url;

const MAX_URL_LEN: usize = 2048;

pub fn is_safe_url(candidate: Option<&str>) -> bool {
    let Some(raw) = candidate else { return false };
    if raw.is_empty() || raw.len() > MAX_URL_LEN {
        return false;
    }

    let Ok(parsed) = Url::parse(raw) else { return false };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let Some(host) = parsed.host_str() else { return false };
    if host.is_empty() {
        return false;
    }

    if host.eq_ignore_ascii_case("localhost") {
        return false;
    }

    // Bracketed IPv6 host strings come back without brackets from `host_str`.
    if let Ok(ip) = host.parse::<IpAddr>() {
        return is_public_ip(ip);
    }

    true
}

fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_loopback() || v4.is_private() || v4.is_link_local() {
                return false;
            }
            if v4.octets() == [169, 254, 169, 254] {
                return false;
            }
            true
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                return false;
            }
            // Link-local (fe80::/10) and unique-local (fc00::/7) are the
            // IPv6 analogues of RFC1918/link-local space.
            let segments = v6.segments();
            if (segments[0] & 0xffc0) == 0xfe80 {
                return false;
            }
            if (segments[0] & 0xfe00) == 0xfc00 {
                return false;
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(is_safe_url(Some("https://example.com")));
        assert!(is_safe_url(Some("https://www.google.com/search?q=test")));
        assert!(is_safe_url(Some("http://example.com")));
        assert!(is_safe_url(Some("http://example.com/path?query=1")));
    }

    #[test]
    fn rejects_none_and_empty() {
        assert!(!is_safe_url(None));
        assert!(!is_safe_url(Some("")));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(!is_safe_url(Some("file:///etc/passwd")));
        assert!(!is_safe_url(Some("javascript:alert(1)")));
        assert!(!is_safe_url(Some("data:text/html,<script>alert(1)</script>")));
    }

    #[test]
    fn rejects_loopback_hosts() {
        assert!(!is_safe_url(Some("http://localhost/")));
        assert!(!is_safe_url(Some("https://localhost:8080/api")));
        assert!(!is_safe_url(Some("http://127.0.0.1/")));
        assert!(!is_safe_url(Some("https://127.0.0.1:3000/")));
        assert!(!is_safe_url(Some("http://[::1]/")));
    }

    #[test]
    fn rejects_private_ranges() {
        assert!(!is_safe_url(Some("http://192.168.1.1/")));
        assert!(!is_safe_url(Some("http://192.168.0.1/router")));
        assert!(!is_safe_url(Some("http://10.0.0.1/")));
        assert!(!is_safe_url(Some("http://10.255.255.255/")));
        assert!(!is_safe_url(Some("http://172.16.0.1/")));
        assert!(!is_safe_url(Some("http://172.31.255.255/")));
    }

    #[test]
    fn rejects_cloud_metadata_address() {
        assert!(!is_safe_url(Some("http://169.254.169.254/")));
        assert!(!is_safe_url(Some("http://169.254.169.254/latest/meta-data")));
    }

    #[test]
    fn rejects_overlong_urls_but_accepts_right_at_the_limit() {
        let long_url = format!("https://example.com/{}", "a".repeat(3000));
        assert!(!is_safe_url(Some(&long_url)));

        let max_url = format!("https://example.com/{}", "a".repeat(2020));
        assert!(is_safe_url(Some(&max_url)));
    }

    #[test]
    fn rejects_urls_without_a_hostname() {
        assert!(!is_safe_url(Some("http:///path")));
    }

    #[test]
    fn accepts_public_ips() {
        assert!(is_safe_url(Some("http://8.8.8.8/")));
        assert!(is_safe_url(Some("https://1.1.1.1/")));
    }
}
