//! TLS termination
//!
//! Loads a PEM certificate chain and private key into a rustls acceptor.
//! The key may live in the same file as the chain.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::ConfigError;

/// Build an acceptor from PEM files
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, ConfigError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(ConfigError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ConfigError::NoPrivateKey(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file() {
        let err = load_acceptor(Path::new("/nonexistent.pem"), Path::new("/nonexistent.pem"))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_file_without_certificates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a certificate").unwrap();
        let err = load_acceptor(file.path(), file.path()).err().unwrap();
        assert!(matches!(err, ConfigError::NoCertificates(_)));
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_valid_chain_and_key() {
        assert!(load_acceptor(&fixture("server.pem"), &fixture("server.key")).is_ok());
    }

    #[test]
    fn test_key_in_certificate_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&std::fs::read(fixture("server.pem")).unwrap())
            .unwrap();
        file.write_all(&std::fs::read(fixture("server.key")).unwrap())
            .unwrap();
        assert!(load_acceptor(file.path(), file.path()).is_ok());
    }

    #[test]
    fn test_certificate_without_key() {
        let err = load_acceptor(&fixture("server.pem"), &fixture("server.pem"))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::NoPrivateKey(_)));
    }
}
