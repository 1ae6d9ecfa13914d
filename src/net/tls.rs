//! TLS material: loading cert/key pairs and generating development
//! certificates.
//!
//! # Responsibilities
//! - Build a server-side rustls config from PEM files on disk
//! - Synthesize ad-hoc self-signed pairs for development use
//! - Own the temporary files backing ad-hoc material
//!
//! # Design Decisions
//! - Ad-hoc temp files live inside a disposer guard carried by the
//!   context; they are deleted when the last context clone drops
//! - Key material is ECDSA P-256 with SHA-256 signatures
//! - When no key path is given, the key is read from the cert file

use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SanType};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tempfile::{NamedTempFile, TempPath};
use tokio_rustls::TlsAcceptor;

use crate::error::ServeError;

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the process-wide rustls crypto provider exactly once.
fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Server-side TLS context, optionally backed by ad-hoc temporary
/// files.
///
/// Cloning is cheap; clones share the config and, for ad-hoc material,
/// the file guard. The backing files are removed when the last clone
/// drops, never while a listener still holds the context.
#[derive(Debug, Clone)]
pub struct TlsContext {
    config: Arc<ServerConfig>,
    adhoc: Option<Arc<AdhocCert>>,
}

impl TlsContext {
    /// Build an acceptor for wrapping accepted connections.
    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(Arc::clone(&self.config))
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.config)
    }

    /// Whether this context was generated ad-hoc rather than loaded
    /// from caller-supplied files.
    pub fn is_adhoc(&self) -> bool {
        self.adhoc.is_some()
    }

    /// The temporary files backing an ad-hoc context.
    pub fn adhoc(&self) -> Option<&AdhocCert> {
        self.adhoc.as_deref()
    }
}

/// Disposer guard for the two temporary PEM files behind an ad-hoc
/// context. Dropping the guard deletes both files.
#[derive(Debug)]
pub struct AdhocCert {
    cert: TempPath,
    key: TempPath,
}

impl AdhocCert {
    pub fn cert_path(&self) -> &Path {
        &self.cert
    }

    pub fn key_path(&self) -> &Path {
        &self.key
    }
}

/// Load a server TLS context from a certificate file and, optionally,
/// a separate private key file. Without a key path the key is expected
/// to live alongside the certificate in the same PEM file.
pub fn load_tls_config(cert_path: &Path, key_path: Option<&Path>) -> Result<TlsContext, ServeError> {
    let certs = read_certs(cert_path)?;
    let key = read_key(key_path.unwrap_or(cert_path))?;
    Ok(TlsContext { config: build_server_config(certs, key)?, adhoc: None })
}

/// Resolve the CLI-style `--certificate` / `--private-key` pair into an
/// optional context. A key without a certificate is rejected.
pub fn context_from_options(
    certificate: Option<&Path>,
    private_key: Option<&Path>,
) -> Result<Option<TlsContext>, ServeError> {
    match (certificate, private_key) {
        (Some(cert), key) => load_tls_config(cert, key).map(Some),
        (None, Some(_)) => Err(ServeError::Certificate(
            "a private key was given without a certificate".into(),
        )),
        (None, None) => Ok(None),
    }
}

/// Generate a self-signed certificate/key pair in PEM form, valid for
/// one year, for the given common name (`*` when absent).
///
/// Development convenience only: nothing will ever trust this
/// certificate, and it must not be used outside local testing.
pub fn generate_adhoc_pair(common_name: Option<&str>) -> Result<(String, String), ServeError> {
    let params = adhoc_params(common_name.unwrap_or("*"), Vec::new())?;
    self_sign(params)
}

/// Generate an ad-hoc context: synthesize a pair, persist it to two
/// uniquely-named temporary files, and load the context back from
/// them. The returned context owns both files via its disposer guard.
///
/// Development convenience only, like [`generate_adhoc_pair`].
pub fn generate_adhoc_context() -> Result<TlsContext, ServeError> {
    let (cert_pem, key_pem) = generate_adhoc_pair(None)?;
    let cert = write_temp(cert_pem.as_bytes())?;
    let key = write_temp(key_pem.as_bytes())?;

    let loaded = load_tls_config(&cert, Some(&key))?;
    Ok(TlsContext {
        config: loaded.config,
        adhoc: Some(Arc::new(AdhocCert { cert, key })),
    })
}

/// Write a persistent development certificate/key pair to
/// `<base_path>.crt` and `<base_path>.key` and return both paths.
///
/// With a `host`, the certificate covers `host` and `*.host`. Unlike
/// [`generate_adhoc_context`] the files survive the process, so
/// repeated server starts can reuse them instead of paying for a fresh
/// pair every run.
pub fn make_ssl_devcert(
    base_path: &Path,
    host: Option<&str>,
    common_name: Option<&str>,
) -> Result<(PathBuf, PathBuf), ServeError> {
    let (cn, sans) = match host {
        Some(host) => (host.to_string(), vec![host.to_string(), format!("*.{host}")]),
        None => (common_name.unwrap_or("*").to_string(), Vec::new()),
    };
    let (cert_pem, key_pem) = self_sign(adhoc_params(&cn, sans)?)?;

    let cert_file = path_with_suffix(base_path, ".crt");
    let key_file = path_with_suffix(base_path, ".key");
    std::fs::write(&cert_file, cert_pem)?;
    std::fs::write(&key_file, key_pem)?;

    tracing::info!(
        cert = %cert_file.display(),
        key = %key_file.display(),
        "development certificate written"
    );
    Ok((cert_file, key_file))
}

fn adhoc_params(common_name: &str, sans: Vec<String>) -> Result<CertificateParams, ServeError> {
    let mut params = CertificateParams::default();
    params.not_before = time::OffsetDateTime::now_utc();
    params.not_after = params.not_before + time::Duration::days(365);

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, "Dummy Certificate");
    params.distinguished_name = dn;

    for san in sans {
        let name = san.as_str().try_into().map_err(|err| {
            ServeError::Certificate(format!("invalid subject alt name {san:?}: {err}"))
        })?;
        params.subject_alt_names.push(SanType::DnsName(name));
    }
    Ok(params)
}

fn self_sign(params: CertificateParams) -> Result<(String, String), ServeError> {
    let key = KeyPair::generate()
        .map_err(|err| ServeError::Certificate(format!("key generation failed: {err}")))?;
    let cert = params
        .self_signed(&key)
        .map_err(|err| ServeError::Certificate(format!("self-signing failed: {err}")))?;
    Ok((cert.pem(), key.serialize_pem()))
}

fn write_temp(contents: &[u8]) -> Result<TempPath, ServeError> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

fn path_with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServeError> {
    let file = std::fs::File::open(path).map_err(|err| {
        ServeError::Certificate(format!("cannot read certificate {}: {err}", path.display()))
    })?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .map_err(|err| {
            ServeError::Certificate(format!("bad certificate in {}: {err}", path.display()))
        })?;
    if certs.is_empty() {
        return Err(ServeError::Certificate(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServeError> {
    let file = std::fs::File::open(path).map_err(|err| {
        ServeError::Certificate(format!("cannot read private key {}: {err}", path.display()))
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|err| {
            ServeError::Certificate(format!("bad private key in {}: {err}", path.display()))
        })?
        .ok_or_else(|| {
            ServeError::Certificate(format!("no private key found in {}", path.display()))
        })
}

fn build_server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<Arc<ServerConfig>, ServeError> {
    ensure_crypto_provider();
    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| ServeError::Certificate(format!("cannot build TLS config: {err}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}
