// Helpers for turning user supplied destinations into host/port pairs.

/// Split `host[:port]` into its parts, falling back to `default_port`.
///
/// IPv6 literals must be bracketed to carry a port (`[::1]:443`); a bare
/// IPv6 literal is returned whole with the default port.
pub fn parse_host_port(s: &str, default_port: Option<u16>) -> (String, Option<u16>) {
    if let Some(rest) = s.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let host = &rest[..end];
            let port = rest[end + 1..]
                .strip_prefix(':')
                .and_then(|p| p.parse::<u16>().ok());
            return (host.to_string(), port.or(default_port));
        }
    }

    // more than one colon without brackets is a bare IPv6 address
    if s.matches(':').count() == 1 {
        if let Some(idx) = s.rfind(':') {
            if let Ok(port) = s[idx + 1..].parse::<u16>() {
                return (s[..idx].to_string(), Some(port));
            }
        }
    }
    (s.to_string(), default_port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_hostname_and_port() {
        assert_eq!(
            parse_host_port("example.com:8080", None),
            ("example.com".to_string(), Some(8080))
        );
        assert_eq!(
            parse_host_port("example.com", Some(80)),
            ("example.com".to_string(), Some(80))
        );
    }

    #[test]
    fn embedded_port_wins_over_default() {
        assert_eq!(
            parse_host_port("10.1.2.3:22", Some(80)),
            ("10.1.2.3".to_string(), Some(22))
        );
    }

    #[test]
    fn handles_ipv6_literals() {
        assert_eq!(
            parse_host_port("[::1]:443", None),
            ("::1".to_string(), Some(443))
        );
        assert_eq!(
            parse_host_port("[fe80::1]", Some(80)),
            ("fe80::1".to_string(), Some(80))
        );
        assert_eq!(
            parse_host_port("fe80::1", None),
            ("fe80::1".to_string(), None)
        );
    }

    #[test]
    fn unparsable_port_is_kept_in_host() {
        assert_eq!(
            parse_host_port("example.com:http", None),
            ("example.com:http".to_string(), None)
        );
    }
}
