//! TLS transport over a plain connector.

use std::io;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::pool::connector::{BoxedIo, Connect, Connecting, Destination, TcpConnector};

/// Opens TLS connections on top of another connector.
///
/// Destinations with `verify_certificates == false` use a configuration
/// that accepts any server certificate.
pub struct TlsConnector<C = TcpConnector> {
    inner: C,
    configs: Result<TlsConfigs, rustls::Error>,
}

#[derive(Clone)]
struct TlsConfigs {
    verifying: tokio_rustls::TlsConnector,
    insecure: tokio_rustls::TlsConnector,
}

impl TlsConnector<TcpConnector> {
    /// TLS over TCP, trusting the webpki root set.
    pub fn new() -> Self {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(TcpConnector, roots)
    }
}

impl Default for TlsConnector<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connect> TlsConnector<C> {
    pub fn with_roots(inner: C, roots: RootCertStore) -> Self {
        Self {
            inner,
            configs: build_configs(roots),
        }
    }
}

fn build_configs(roots: RootCertStore) -> Result<TlsConfigs, rustls::Error> {
    let provider = Arc::new(crypto::ring::default_provider());

    let mut verifying = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    verifying.alpn_protocols = vec![b"http/1.1".to_vec()];

    let mut insecure = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier(provider)))
        .with_no_client_auth();
    insecure.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsConfigs {
        verifying: tokio_rustls::TlsConnector::from(Arc::new(verifying)),
        insecure: tokio_rustls::TlsConnector::from(Arc::new(insecure)),
    })
}

impl<C: Connect> Connect for TlsConnector<C> {
    fn connect(&self, dest: &Destination) -> Connecting {
        let configs = match &self.configs {
            Ok(configs) => configs.clone(),
            Err(e) => {
                let err = io::Error::new(io::ErrorKind::Other, e.clone());
                return Box::pin(async move { Err(err) });
            }
        };
        let connector = if dest.verify_certificates {
            configs.verifying
        } else {
            configs.insecure
        };
        let server_name = ServerName::try_from(dest.host.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e));
        let tcp = self.inner.connect(dest);

        Box::pin(async move {
            let server_name = server_name?;
            let io = tcp.await?;
            let tls = connector.connect(server_name, io).await?;
            Ok(Box::new(tls) as BoxedIo)
        })
    }
}

/// Accepts every server certificate; signatures are still checked.
#[derive(Debug)]
struct NoVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connector::TransportKind;

    #[test]
    fn builds_both_configurations() {
        let connector = TlsConnector::new();
        assert!(connector.configs.is_ok());
    }

    #[tokio::test]
    async fn rejects_invalid_server_name() {
        let connector = TlsConnector::new();
        let dest = Destination {
            kind: TransportKind::Secure,
            host: "bad host name".into(),
            port: 443,
            verify_certificates: true,
        };
        let err = connector.connect(&dest).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
