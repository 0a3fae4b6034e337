//! Channel construction.
//!
//! This module turns a host, a port and composed [`Credentials`] into an
//! [`LndChannel`]:
//! - [`ConnectionParams`]: immutable inputs supplied by the caller
//! - [`ChannelOptions`]: optional message size limits
//! - [`channel_from`]: lazy channel bound to `https://host:port`
//! - [`connect`]: eager variant that completes the handshake first
//!
//! Every channel is TLS-only, pinned to the supplied certificate (see
//! [`crate::tls`]), and carries the macaroon interceptor. Nothing here
//! retries; construction failures are returned as they occur.

use std::net::Ipv6Addr;

use tonic::transport::{Channel, Endpoint};

use crate::credentials::{Credentials, Macaroon, MacaroonInterceptor, TlsCertificate};
use crate::error::{ClientError, Result};
use crate::tls::{authority, PinnedConnector};

/// Default LND gRPC port.
pub const DEFAULT_GRPC_PORT: u16 = 10009;

/// Default LND host.
pub const DEFAULT_HOST: &str = "localhost";

/// Everything needed to reach and authenticate against one daemon.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    host: String,
    port: u16,
    certificate: TlsCertificate,
    macaroon: Macaroon,
}

impl ConnectionParams {
    /// Bundles connection inputs. `host` must be non-empty.
    ///
    /// A bracketed IPv6 literal such as `[::1]` is stored without brackets.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        certificate: TlsCertificate,
        macaroon: Macaroon,
    ) -> Result<Self> {
        let mut host = host.into();
        if host.trim().is_empty() {
            return Err(ClientError::InvalidConfig("host cannot be empty".to_string()));
        }
        if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            if inner.parse::<Ipv6Addr>().is_ok() {
                host = inner.to_string();
            }
        }
        Ok(Self {
            host,
            port,
            certificate,
            macaroon,
        })
    }

    /// Daemon host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Daemon gRPC port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Daemon TLS certificate.
    #[must_use]
    pub fn certificate(&self) -> &TlsCertificate {
        &self.certificate
    }

    /// Macaroon sent with every call.
    #[must_use]
    pub fn macaroon(&self) -> &Macaroon {
        &self.macaroon
    }

    /// Composes the credential pair for these parameters.
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::compose(self.certificate.clone(), &self.macaroon)
    }
}

/// Per-channel message size limits.
///
/// `None` leaves the transport default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Largest message the client will encode.
    pub max_send_message_length: Option<usize>,
    /// Largest message the client will decode.
    pub max_receive_message_length: Option<usize>,
}

impl ChannelOptions {
    /// Sets the same limit in both directions.
    #[must_use]
    pub fn with_max_message_length(mut self, len: usize) -> Self {
        self.max_send_message_length = Some(len);
        self.max_receive_message_length = Some(len);
        self
    }
}

/// Authenticated, encrypted channel to one daemon.
///
/// Cloning is cheap; clones share the underlying connection.
#[derive(Debug, Clone)]
pub struct LndChannel {
    channel: Channel,
    interceptor: MacaroonInterceptor,
    target: String,
    options: ChannelOptions,
}

impl LndChannel {
    /// `host:port` this channel is bound to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The call credential attached to every request.
    #[must_use]
    pub fn interceptor(&self) -> &MacaroonInterceptor {
        &self.interceptor
    }

    /// Message size limits in effect.
    #[must_use]
    pub fn options(&self) -> ChannelOptions {
        self.options
    }

    /// The transport channel.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub(crate) fn into_parts(self) -> (Channel, MacaroonInterceptor, ChannelOptions) {
        (self.channel, self.interceptor, self.options)
    }
}

// The connector performs the TLS handshake itself, so the endpoint URI keeps
// the plain scheme and tonic's own TLS layer stays out of the way.
fn secure_endpoint(
    host: &str,
    port: u16,
    certificate: &TlsCertificate,
) -> Result<(Endpoint, PinnedConnector)> {
    let endpoint = Channel::from_shared(format!("http://{}", authority(host, port)))?;
    let connector = PinnedConnector::new(host, port, certificate)?;
    Ok((endpoint, connector))
}

/// Builds a channel bound to `host:port` using `credentials`.
///
/// The connection is opened lazily on the first call, so an unreachable
/// daemon surfaces as `Unavailable` from that call rather than here.
pub fn channel_from(
    host: &str,
    port: u16,
    credentials: Credentials,
    options: &ChannelOptions,
) -> Result<LndChannel> {
    let (certificate, interceptor) = credentials.into_parts();
    let (endpoint, connector) = secure_endpoint(host, port, &certificate)?;
    tracing::debug!(host, port, "creating lazy channel");

    Ok(LndChannel {
        channel: endpoint.connect_with_connector_lazy(connector),
        interceptor,
        target: authority(host, port),
        options: *options,
    })
}

/// Connects eagerly, returning once the TLS handshake has completed.
pub async fn connect(params: &ConnectionParams, options: &ChannelOptions) -> Result<LndChannel> {
    let (certificate, interceptor) = params.credentials()?.into_parts();
    let (endpoint, connector) = secure_endpoint(params.host(), params.port(), &certificate)?;

    tracing::debug!(host = params.host(), port = params.port(), "connecting");
    let channel = endpoint
        .connect_with_connector(connector)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, host = params.host(), port = params.port(), "connection failed");
            e
        })?;

    Ok(LndChannel {
        channel,
        interceptor,
        target: authority(params.host(), params.port()),
        options: *options,
    })
}
