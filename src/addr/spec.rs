//! Classification of heterogeneous address inputs.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::ServeError;

/// URL scheme accepted for string addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Default port implied by the scheme.
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized description of where a server should listen.
///
/// Exactly one variant describes one endpoint; the spec is built once
/// per server start and discarded once the socket exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    /// Plain TCP host and optional port, given programmatically.
    /// A missing port defaults to 443 when TLS material is present,
    /// 80 otherwise.
    Tcp { host: String, port: Option<u16> },

    /// Filesystem path of a unix stream socket.
    Unix { path: PathBuf },

    /// Already-open, already-listening descriptor inherited from the
    /// process launcher.
    Fd { fd: i32 },

    /// URL-style address with the scheme and port fully resolved.
    Url { scheme: Scheme, host: String, port: u16 },
}

impl AddressSpec {
    /// Build a spec from the three mutually exclusive CLI-style
    /// sources. Exactly one of `socket`, `address`, `fd` must be
    /// given, otherwise the input is rejected as an invalid address.
    ///
    /// `tls_present` selects the default scheme for addresses that do
    /// not spell one out.
    pub fn from_options(
        socket: Option<&Path>,
        address: Option<&str>,
        fd: Option<&str>,
        tls_present: bool,
    ) -> Result<Self, ServeError> {
        let given = [socket.is_some(), address.is_some(), fd.is_some()]
            .into_iter()
            .filter(|given| *given)
            .count();
        if given != 1 {
            return Err(ServeError::InvalidAddress(
                "exactly one of a socket path, an address, or a file descriptor must be given"
                    .into(),
            ));
        }

        if let Some(path) = socket {
            return Ok(AddressSpec::Unix { path: path.to_path_buf() });
        }
        if let Some(fd) = fd {
            return parse_fd(fd);
        }
        parse_address(address.expect("one source is set"), tls_present)
    }

    /// Parse a string address: `host[:port]`, optionally prefixed with
    /// `http://` or `https://`, or the `fd://N` pseudo-URL.
    pub fn parse(address: &str, tls_present: bool) -> Result<Self, ServeError> {
        parse_address(address, tls_present)
    }
}

fn parse_address(address: &str, tls_present: bool) -> Result<AddressSpec, ServeError> {
    if let Some(fd) = address.strip_prefix("fd://") {
        return parse_fd(fd);
    }

    if address.contains("://") {
        return parse_url(address);
    }

    let (host, port) = split_host_port(address)?;
    let scheme = if tls_present { Scheme::Https } else { Scheme::Http };
    Ok(AddressSpec::Url {
        scheme,
        host,
        port: port.unwrap_or_else(|| scheme.default_port()),
    })
}

fn parse_url(address: &str) -> Result<AddressSpec, ServeError> {
    let url = Url::parse(address)
        .map_err(|err| ServeError::InvalidAddress(format!("{address}: {err}")))?;

    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => {
            return Err(ServeError::InvalidAddress(format!(
                "unsupported scheme {other:?} in {address}"
            )))
        }
    };

    // Only scheme://host[:port] is accepted; anything else means the
    // caller handed us a URL, not a listening address.
    if !matches!(url.path(), "" | "/") || url.query().is_some() || url.fragment().is_some() {
        return Err(ServeError::InvalidAddress(format!(
            "address must not carry a path, query, or fragment: {address}"
        )));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ServeError::InvalidAddress(format!(
            "address must not carry credentials: {address}"
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ServeError::InvalidAddress(format!("missing host in {address}")))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();

    Ok(AddressSpec::Url {
        scheme,
        host,
        port: url.port().unwrap_or_else(|| scheme.default_port()),
    })
}

fn parse_fd(fd: &str) -> Result<AddressSpec, ServeError> {
    let parsed: u32 = fd.parse().map_err(|_| {
        ServeError::InvalidAddress(format!("file descriptor must be a non-negative integer: {fd:?}"))
    })?;
    let fd = i32::try_from(parsed).map_err(|_| {
        ServeError::InvalidAddress(format!("file descriptor out of range: {parsed}"))
    })?;
    Ok(AddressSpec::Fd { fd })
}

/// Split `host[:port]`, tolerating bracketed and bare IPv6 literals.
fn split_host_port(address: &str) -> Result<(String, Option<u16>), ServeError> {
    if address.is_empty() {
        return Err(ServeError::InvalidAddress("empty address".into()));
    }

    if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            ServeError::InvalidAddress(format!("unterminated IPv6 literal: {address}"))
        })?;
        return match tail {
            "" => Ok((host.to_string(), None)),
            _ => Ok((host.to_string(), Some(parse_port(&tail[1..], address)?))),
        };
    }

    match address.matches(':').count() {
        0 => Ok((address.to_string(), None)),
        1 => {
            let (host, port) = address.split_once(':').expect("one colon");
            if host.is_empty() {
                return Err(ServeError::InvalidAddress(format!("missing host in {address}")));
            }
            Ok((host.to_string(), Some(parse_port(port, address)?)))
        }
        // More than one colon without brackets: a bare IPv6 address.
        _ => Ok((address.to_string(), None)),
    }
}

fn parse_port(port: &str, address: &str) -> Result<u16, ServeError> {
    port.parse()
        .map_err(|_| ServeError::InvalidAddress(format!("invalid port in {address}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_host_defaults_scheme_and_port() {
        let spec = AddressSpec::parse("example.com", false).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Http, host: "example.com".into(), port: 80 }
        );

        let spec = AddressSpec::parse("example.com", true).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Https, host: "example.com".into(), port: 443 }
        );
    }

    #[test]
    fn explicit_scheme_wins_over_tls_presence() {
        let spec = AddressSpec::parse("http://example.com", true).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Http, host: "example.com".into(), port: 80 }
        );
    }

    #[test]
    fn explicit_port_is_kept() {
        let spec = AddressSpec::parse("https://example.com:8443", false).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Https, host: "example.com".into(), port: 8443 }
        );

        let spec = AddressSpec::parse("localhost:5000", false).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Http, host: "localhost".into(), port: 5000 }
        );
    }

    #[test]
    fn ipv6_literals() {
        let spec = AddressSpec::parse("[::1]:8080", false).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Http, host: "::1".into(), port: 8080 }
        );

        let spec = AddressSpec::parse("::1", false).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Http, host: "::1".into(), port: 80 }
        );

        let spec = AddressSpec::parse("http://[::1]:8080", false).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: Scheme::Http, host: "::1".into(), port: 8080 }
        );
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(
            AddressSpec::parse("ftp://example.com", false),
            Err(ServeError::InvalidAddress(_))
        ));
    }

    #[test]
    fn url_components_beyond_authority_are_rejected() {
        for address in [
            "http://example.com/app",
            "http://example.com/?q=1",
            "http://example.com/#frag",
            "http://user:pw@example.com",
        ] {
            assert!(
                matches!(AddressSpec::parse(address, false), Err(ServeError::InvalidAddress(_))),
                "expected rejection of {address}"
            );
        }
    }

    #[test]
    fn fd_parses_strictly() {
        assert_eq!(AddressSpec::parse("fd://3", false).unwrap(), AddressSpec::Fd { fd: 3 });
        for fd in ["abc", "-1", "3.5", ""] {
            assert!(matches!(
                parse_fd(fd),
                Err(ServeError::InvalidAddress(_))
            ));
        }
    }

    #[test]
    fn exactly_one_source_required() {
        let err = AddressSpec::from_options(None, None, None, false).unwrap_err();
        assert!(matches!(err, ServeError::InvalidAddress(_)));

        let err = AddressSpec::from_options(
            Some(Path::new("/tmp/app.sock")),
            Some("localhost:80"),
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ServeError::InvalidAddress(_)));

        let spec =
            AddressSpec::from_options(Some(Path::new("/tmp/app.sock")), None, None, false).unwrap();
        assert_eq!(spec, AddressSpec::Unix { path: "/tmp/app.sock".into() });

        let spec = AddressSpec::from_options(None, None, Some("5"), false).unwrap();
        assert_eq!(spec, AddressSpec::Fd { fd: 5 });
    }
}
