use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::sync::Arc;
use tonic::transport::{Certificate, ClientTlsConfig, Identity};
use tracing::debug;

/// Problems with the TLS material handed to the client.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("{0} must not be empty")]
    Missing(&'static str),

    #[error("only PEM format is accepted for server CA")]
    InvalidCaPem,

    #[error("invalid client certificate/key pair: {0}")]
    InvalidIdentity(String),
}

/// Client certificate, private key and CA bundle, all PEM-encoded.
///
/// Construction validates the material up front so a bad file is reported
/// before any connection is attempted.
#[derive(Clone)]
pub struct ClientCredentials {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_pem: Vec<u8>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("cert_pem", &format_args!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .field("ca_pem", &format_args!("{} bytes", self.ca_pem.len()))
            .finish()
    }
}

impl ClientCredentials {
    pub fn new(
        cert_pem: impl Into<Vec<u8>>,
        key_pem: impl Into<Vec<u8>>,
        ca_pem: impl Into<Vec<u8>>,
    ) -> Result<Self, CredentialError> {
        let creds = Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
            ca_pem: ca_pem.into(),
        };

        if creds.cert_pem.is_empty() {
            return Err(CredentialError::Missing("client certificate"));
        }
        if creds.key_pem.is_empty() {
            return Err(CredentialError::Missing("client key"));
        }
        if creds.ca_pem.is_empty() {
            return Err(CredentialError::Missing("CA certificate"));
        }

        let roots = creds.root_store()?;
        creds.check_identity(roots)?;
        Ok(creds)
    }

    /// Parse the CA bundle into a trust store. At least one certificate is
    /// required and every PEM block must decode.
    fn root_store(&self) -> Result<RootCertStore, CredentialError> {
        let certs = rustls_pemfile::certs(&mut self.ca_pem.as_slice())
            .collect::<Result<Vec<CertificateDer<'static>>, _>>()
            .map_err(|_| CredentialError::InvalidCaPem)?;
        if certs.is_empty() {
            return Err(CredentialError::InvalidCaPem);
        }

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(certs);
        if added == 0 {
            return Err(CredentialError::InvalidCaPem);
        }
        debug!("loaded {} CA certificate(s), ignored {}", added, ignored);
        Ok(roots)
    }

    /// Build a throwaway rustls config to prove the certificate chain and
    /// private key belong together.
    fn check_identity(&self, roots: RootCertStore) -> Result<(), CredentialError> {
        let chain = rustls_pemfile::certs(&mut self.cert_pem.as_slice())
            .collect::<Result<Vec<CertificateDer<'static>>, _>>()
            .map_err(|e| CredentialError::InvalidIdentity(e.to_string()))?;
        if chain.is_empty() {
            return Err(CredentialError::InvalidIdentity(
                "no certificate found in client certificate PEM".to_string(),
            ));
        }

        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut self.key_pem.as_slice())
            .map_err(|e| CredentialError::InvalidIdentity(e.to_string()))?
            .ok_or_else(|| {
                CredentialError::InvalidIdentity("no private key found in key PEM".to_string())
            })?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| CredentialError::InvalidIdentity(e.to_string()))?
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, key)
            .map_err(|e| CredentialError::InvalidIdentity(e.to_string()))?;
        Ok(())
    }

    /// TLS settings for a tonic channel: client identity plus the custom CA
    /// as the only trust root.
    pub fn tls_config(&self) -> ClientTlsConfig {
        ClientTlsConfig::new()
            .identity(Identity::from_pem(&self.cert_pem, &self.key_pem))
            .ca_certificate(Certificate::from_pem(&self.ca_pem))
    }
}
