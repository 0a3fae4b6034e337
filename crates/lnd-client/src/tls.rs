//! Certificate pinning for the daemon's TLS endpoint.
//!
//! LND generates a self-signed certificate that is also marked as a CA.
//! WebPKI path building refuses such a certificate when it is presented as
//! the server's own, so the daemon's certificate cannot simply be installed
//! as a trust root. Instead the handshake accepts exactly the certificate the
//! caller supplied, within its validity period. Handshake signatures are
//! still verified against that certificate's key.

use std::io;
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use futures::future::BoxFuture;
use http::Uri;
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, CertificateError, ClientConfig, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::credentials::TlsCertificate;
use crate::error::{ClientError, Result};

/// ALPN protocol id for HTTP/2, required by gRPC servers.
const ALPN_H2: &[u8] = b"h2";

/// Accepts one server certificate and nothing else.
#[derive(Debug, Clone)]
pub struct PinnedCertVerifier {
    der: Vec<u8>,
    not_before: i64,
    not_after: i64,
}

impl PinnedCertVerifier {
    /// Pins the first certificate in `certificate`.
    pub fn new(certificate: &TlsCertificate) -> Result<Self> {
        let der = certificate.to_der()?;
        let (not_before, not_after) = {
            let (_, parsed) = X509Certificate::from_der(&der).map_err(|e| {
                ClientError::InvalidCertificate(format!("malformed certificate: {e}"))
            })?;
            let validity = parsed.validity();
            (validity.not_before.timestamp(), validity.not_after.timestamp())
        };

        Ok(Self {
            der,
            not_before,
            not_after,
        })
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if end_entity.0 != self.der {
            tracing::warn!("daemon presented a certificate other than the pinned one");
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ));
        }

        let now = now
            .duration_since(UNIX_EPOCH)
            .map_err(|_| rustls::Error::FailedToGetCurrentTime)?
            .as_secs();
        let now = i64::try_from(now).unwrap_or(i64::MAX);
        if now < self.not_before {
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidYet,
            ));
        }
        if now > self.not_after {
            return Err(rustls::Error::InvalidCertificate(CertificateError::Expired));
        }

        Ok(ServerCertVerified::assertion())
    }
}

/// Client TLS configuration trusting only `certificate`, with h2 ALPN.
pub fn client_config(certificate: &TlsCertificate) -> Result<Arc<ClientConfig>> {
    let verifier = PinnedCertVerifier::new(certificate)?;
    let mut config = ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    config.alpn_protocols = vec![ALPN_H2.to_vec()];
    Ok(Arc::new(config))
}

/// `host:port`, with IPv6 literals bracketed.
pub(crate) fn authority(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Dials the daemon and completes the pinned TLS handshake.
///
/// Used as the transport connector of a tonic endpoint.
#[derive(Clone)]
pub(crate) struct PinnedConnector {
    tls: TlsConnector,
    server_name: ServerName,
    host: String,
    port: u16,
}

impl PinnedConnector {
    pub(crate) fn new(host: &str, port: u16, certificate: &TlsCertificate) -> Result<Self> {
        let server_name = ServerName::try_from(host).map_err(|e| {
            ClientError::InvalidConfig(format!("'{host}' is not a valid TLS server name: {e}"))
        })?;

        Ok(Self {
            tls: TlsConnector::from(client_config(certificate)?),
            server_name,
            host: host.to_string(),
            port,
        })
    }
}

impl tower::Service<Uri> for PinnedConnector {
    type Response = TlsStream<TcpStream>;
    type Error = io::Error;
    type Future = BoxFuture<'static, io::Result<Self::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    // The dial target is fixed at construction; the URI only names it.
    fn call(&mut self, _uri: Uri) -> Self::Future {
        let tls = self.tls.clone();
        let server_name = self.server_name.clone();
        let host = self.host.clone();
        let port = self.port;

        Box::pin(async move {
            let tcp = TcpStream::connect((host.as_str(), port)).await?;
            tcp.set_nodelay(true)?;
            tls.connect(server_name, tcp).await
        })
    }
}
