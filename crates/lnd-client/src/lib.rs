//! gRPC client library for a remote LND node.
//!
//! This crate connects to an LND daemon over TLS pinned to the daemon's own
//! certificate, authenticates every call with a macaroon, and exposes invoice
//! subscription and a `GetInfo` probe.
//! Failures are sorted by [`classify`] into re-raised and suppressed classes.
//!
//! ```no_run
//! use futures::StreamExt;
//! use lnd_client::{ChannelOptions, LightningService, LndConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = LndConfig::load_from("lnd.toml")?;
//! let service = LightningService::connect_lazy(
//!     &config.connection_params()?,
//!     &config.channel_options(),
//! )?;
//!
//! let mut invoices = service.subscribe_invoices(None, None);
//! while let Some(invoice) = invoices.next().await {
//!     let invoice = invoice?;
//!     println!("{} {}", invoice.add_index, invoice.memo);
//! }
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod provider;
pub mod service;
pub mod stream;
pub mod tls;

pub use classify::{handle_rpc_errors, ClassifiedError, ErrorHandling, Policy, WALLET_LOCKED_MESSAGE};
pub use config::LndConfig;
pub use connection::{
    channel_from, connect, ChannelOptions, ConnectionParams, LndChannel, DEFAULT_GRPC_PORT,
    DEFAULT_HOST,
};
pub use credentials::{Credentials, Macaroon, MacaroonInterceptor, TlsCertificate};
pub use error::{ClientError, Result};
pub use provider::{LightningProvider, LightningRpc, RpcStream};
pub use service::{InvoiceStream, LightningService};
pub use stream::ClassifiedStream;
pub use tls::PinnedCertVerifier;

pub use lnd_proto as proto;
