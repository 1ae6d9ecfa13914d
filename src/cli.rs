//! Command-line adapter over the core factories.
//!
//! A thin layer: flags map one-to-one onto [`AddressSpec::from_options`]
//! and the TLS loader; binaries embed [`ServeArgs`] with
//! `#[command(flatten)]` or parse it directly.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::addr::AddressSpec;
use crate::config::ServeConfig;
use crate::error::ServeError;
use crate::net::tls::{context_from_options, TlsContext};

/// Serving options.
#[derive(Debug, Parser)]
#[command(name = "server-bootstrap", about = "Stand up an HTTP(S) server", version)]
pub struct ServeArgs {
    #[command(flatten)]
    pub addr: AddressArgs,

    /// Path of a PEM certificate to serve TLS with
    #[arg(long)]
    pub certificate: Option<PathBuf>,

    /// Path of the PEM private key
    #[arg(long, requires = "certificate")]
    pub private_key: Option<PathBuf>,

    /// Dispatch each connection to its own task
    #[arg(long)]
    pub threaded: bool,

    /// Load defaults from a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Where to listen. At most one; when none is given the config file
/// must supply an address.
#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct AddressArgs {
    /// Path of a unix socket to listen on. If the socket does not
    /// exist it will be created
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Hostname or address to listen on. Can include an optional port
    #[arg(long)]
    pub address: Option<String>,

    /// File descriptor to listen on
    #[arg(long)]
    pub fd: Option<String>,
}

impl ServeArgs {
    /// Resolve flags (and config-file fallbacks) into an address spec,
    /// TLS material, and the serving mode. CLI flags win over config
    /// values.
    pub fn resolve(
        &self,
        config: Option<&ServeConfig>,
    ) -> Result<(AddressSpec, Option<TlsContext>, bool), ServeError> {
        let file_tls = config.and_then(|config| config.tls.as_ref());
        let certificate = self
            .certificate
            .clone()
            .or_else(|| file_tls.map(|tls| PathBuf::from(&tls.cert_path)));
        let private_key = self
            .private_key
            .clone()
            .or_else(|| file_tls.and_then(|tls| tls.key_path.as_ref().map(PathBuf::from)));

        // TLS is resolved first: scheme defaulting depends on it.
        let tls = context_from_options(certificate.as_deref(), private_key.as_deref())?;

        let none_given =
            self.addr.socket.is_none() && self.addr.address.is_none() && self.addr.fd.is_none();
        let file_address = config.map(|config| config.listener.address.as_str());
        let address = if none_given { file_address } else { self.addr.address.as_deref() };

        let spec = AddressSpec::from_options(
            self.addr.socket.as_deref(),
            address,
            self.addr.fd.as_deref(),
            tls.is_some(),
        )?;

        let threaded = self.threaded || config.is_some_and(|config| config.listener.threaded);
        Ok((spec, tls, threaded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ServeArgs, clap::Error> {
        ServeArgs::try_parse_from(std::iter::once("server-bootstrap").chain(args.iter().copied()))
    }

    #[test]
    fn socket_flag_parses() {
        let args = parse(&["--socket", "/path/to/socket"]).unwrap();
        assert_eq!(args.addr.socket.as_deref(), Some(std::path::Path::new("/path/to/socket")));
        assert!(args.addr.address.is_none());
        assert!(args.addr.fd.is_none());
        assert!(args.certificate.is_none());
        assert!(args.private_key.is_none());
    }

    #[test]
    fn address_sources_are_mutually_exclusive() {
        assert!(parse(&["--socket", "sock", "--address", "localhost"]).is_err());
        assert!(parse(&["--address", "localhost", "--fd", "3"]).is_err());
    }

    #[test]
    fn private_key_requires_certificate() {
        assert!(parse(&["--address", "localhost", "--private-key", "dev.key"]).is_err());
        assert!(
            parse(&["--address", "localhost", "--certificate", "dev.crt", "--private-key", "dev.key"])
                .is_ok()
        );
    }

    #[test]
    fn fd_resolves_to_spec() {
        let args = parse(&["--fd", "4"]).unwrap();
        let (spec, tls, threaded) = args.resolve(None).unwrap();
        assert_eq!(spec, AddressSpec::Fd { fd: 4 });
        assert!(tls.is_none());
        assert!(!threaded);
    }

    #[test]
    fn config_supplies_address_when_flags_do_not() {
        let args = parse(&[]).unwrap();
        let config = ServeConfig::default();
        let (spec, _, _) = args.resolve(Some(&config)).unwrap();
        assert_eq!(
            spec,
            AddressSpec::Url { scheme: crate::addr::Scheme::Http, host: "localhost".into(), port: 8080 }
        );
    }

    #[test]
    fn no_address_at_all_is_invalid() {
        let args = parse(&[]).unwrap();
        assert!(matches!(args.resolve(None), Err(ServeError::InvalidAddress(_))));
    }
}
