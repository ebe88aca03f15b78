//! Trusted certificate authorities.
//!
//! A [`TrustStore`] is loaded once before any session starts and then
//! shared read-only (behind an `Arc`) by every session of the process.
//!
//! # Sources
//!
//! | Constructor | Roots |
//! |-------------|-------|
//! | [`TrustStore::load`] | Bundled Mozilla web PKI roots |
//! | [`TrustStore::from_pem_file`] | PEM bundle on disk |
//! | [`TrustStore::from_pem`] | PEM bundle in memory |
//! | [`TrustStore::from_der`] | DER certificates |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// TrustStore
// ============================================================================

/// Immutable set of trusted certificate authorities.
///
/// Holds the rustls client configuration derived from the roots, so every
/// session shares one configuration instead of rebuilding it.
#[derive(Clone)]
pub struct TrustStore {
    /// Number of root certificates.
    root_count: usize,
    /// Client configuration verifying against the roots.
    config: Arc<ClientConfig>,
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustStore")
            .field("root_count", &self.root_count)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TrustStore - Constructors
// ============================================================================

impl TrustStore {
    /// Loads the bundled web PKI roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrustStore`] if the TLS engine rejects the
    /// configuration.
    pub fn load() -> Result<Self> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        Self::from_roots(roots)
    }

    /// Loads roots from a PEM bundle on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrustStore`] if the file cannot be read, contains
    /// a malformed certificate, or contains no certificate at all.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::trust_store(format!("cannot open {}: {e}", path.display()))
        })?;

        Self::from_pem_reader(&mut BufReader::new(file))
    }

    /// Loads roots from an in-memory PEM bundle.
    ///
    /// # Errors
    ///
    /// Same as [`TrustStore::from_pem_file`].
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::from_pem_reader(&mut Cursor::new(pem))
    }

    /// Builds a store from DER encoded certificates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TrustStore`] if a certificate is not a valid trust
    /// anchor or the list is empty.
    pub fn from_der(certs: impl IntoIterator<Item = CertificateDer<'static>>) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots
                .add(cert)
                .map_err(|e| Error::trust_store(format!("invalid root certificate: {e}")))?;
        }

        Self::from_roots(roots)
    }

    fn from_pem_reader(reader: &mut dyn BufRead) -> Result<Self> {
        let certs = rustls_pemfile::certs(reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::trust_store(format!("malformed PEM: {e}")))?;

        Self::from_der(certs)
    }

    fn from_roots(roots: RootCertStore) -> Result<Self> {
        if roots.is_empty() {
            return Err(Error::trust_store("no root certificates"));
        }

        let root_count = roots.len();
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::trust_store(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        debug!(root_count, "Trust store loaded");

        Ok(Self {
            root_count,
            config: Arc::new(config),
        })
    }
}

// ============================================================================
// TrustStore - Accessors
// ============================================================================

impl TrustStore {
    /// Returns the number of trusted roots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.root_count
    }

    /// Returns `true` if the store holds no roots.
    ///
    /// Never true for a successfully constructed store.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root_count == 0
    }

    /// Returns the shared TLS client configuration.
    #[inline]
    #[must_use]
    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }
}

// ============================================================================
// Tests
// ============================================================================
