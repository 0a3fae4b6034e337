//! Channel credentials: TLS certificate plus per-call macaroon.
//!
//! LND requires both on every connection. The TLS certificate authenticates
//! the daemon and encrypts the transport; the macaroon authorizes each call
//! and travels as the `macaroon` metadata entry. [`Credentials`] can only be
//! built from both halves, so a channel without either is not expressible.

use std::fmt;
use std::path::Path;

use tonic::metadata::{Ascii, MetadataValue};
use tonic::{Request, Status};

use crate::error::{ClientError, Result};

/// Metadata key LND reads the macaroon from.
pub const MACAROON_METADATA_KEY: &str = "macaroon";

/// PEM-encoded TLS certificate of the daemon.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsCertificate(Vec<u8>);

impl TlsCertificate {
    /// Wraps PEM bytes as supplied by the daemon (`tls.cert`).
    #[must_use]
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
        Self(pem.into())
    }

    /// Reads a PEM certificate file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self(pem))
    }

    /// Raw PEM bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// DER encoding of the first certificate in the PEM data.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let mut reader = self.0.as_slice();
        let mut certs = rustls_pemfile::certs(&mut reader)
            .map_err(|e| ClientError::InvalidCertificate(format!("unreadable PEM: {e}")))?;
        if certs.is_empty() {
            return Err(ClientError::InvalidCertificate(
                "no CERTIFICATE block found".to_string(),
            ));
        }
        Ok(certs.swap_remove(0))
    }
}

impl fmt::Debug for TlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCertificate")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Opaque bearer token attached verbatim to every call.
#[derive(Clone, PartialEq, Eq)]
pub struct Macaroon(Vec<u8>);

impl Macaroon {
    /// Uses `token` as the metadata value exactly as given.
    ///
    /// LND expects the hex encoding of the binary macaroon here.
    #[must_use]
    pub fn new(token: impl Into<Vec<u8>>) -> Self {
        Self(token.into())
    }

    /// Accepts an already hex-encoded macaroon, e.g. from `lncli bakemacaroon`.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let hex_str = hex_str.trim();
        hex::decode(hex_str)
            .map_err(|e| ClientError::InvalidMacaroon(format!("not valid hex: {e}")))?;
        Ok(Self(hex_str.as_bytes().to_vec()))
    }

    /// Reads a binary `.macaroon` file and hex-encodes it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self(hex::encode(raw).into_bytes()))
    }

    /// The token bytes as they will appear in metadata.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Macaroon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Macaroon(<redacted>)")
    }
}

/// Attaches the macaroon to every outgoing request.
#[derive(Clone)]
pub struct MacaroonInterceptor {
    value: MetadataValue<Ascii>,
}

impl MacaroonInterceptor {
    /// Fails if the token is not a legal ASCII metadata value.
    pub fn new(macaroon: &Macaroon) -> Result<Self> {
        let token = std::str::from_utf8(macaroon.as_bytes())
            .map_err(|e| ClientError::InvalidMacaroon(e.to_string()))?;
        let value = token
            .parse::<MetadataValue<Ascii>>()
            .map_err(|e| ClientError::InvalidMacaroon(e.to_string()))?;
        Ok(Self { value })
    }

    /// The metadata value inserted on each call.
    #[must_use]
    pub fn macaroon(&self) -> &[u8] {
        self.value.as_bytes()
    }
}

impl fmt::Debug for MacaroonInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MacaroonInterceptor(<redacted>)")
    }
}

impl tonic::service::Interceptor for MacaroonInterceptor {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(MACAROON_METADATA_KEY, self.value.clone());
        Ok(request)
    }
}

/// Transport credential and call credential, composed.
///
/// Consumed by [`channel_from`](crate::connection::channel_from); the
/// resulting channel keeps the capability, not this value.
#[derive(Debug, Clone)]
pub struct Credentials {
    certificate: TlsCertificate,
    interceptor: MacaroonInterceptor,
}

impl Credentials {
    /// Combines a TLS certificate with a macaroon.
    pub fn compose(certificate: TlsCertificate, macaroon: &Macaroon) -> Result<Self> {
        let interceptor = MacaroonInterceptor::new(macaroon)?;
        Ok(Self {
            certificate,
            interceptor,
        })
    }

    /// The transport half.
    #[must_use]
    pub fn certificate(&self) -> &TlsCertificate {
        &self.certificate
    }

    /// The per-call half.
    #[must_use]
    pub fn interceptor(&self) -> &MacaroonInterceptor {
        &self.interceptor
    }

    pub(crate) fn into_parts(self) -> (TlsCertificate, MacaroonInterceptor) {
        (self.certificate, self.interceptor)
    }
}
