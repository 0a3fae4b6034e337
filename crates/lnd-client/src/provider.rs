//! Typed handle over the generated `lnrpc.Lightning` stub.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use lnd_proto::{GetInfoRequest, GetInfoResponse, Invoice, InvoiceSubscription, LightningClient};
use tonic::codegen::InterceptedService;
use tonic::transport::Channel;
use tonic::Status;

use crate::connection::LndChannel;
use crate::credentials::MacaroonInterceptor;

/// Server stream of raw RPC results.
pub type RpcStream<T> = BoxStream<'static, Result<T, Status>>;

/// The daemon methods this crate uses.
///
/// [`LightningProvider`] implements it over a real channel; tests substitute
/// their own implementations.
#[async_trait]
pub trait LightningRpc: Clone + Send + Sync + 'static {
    /// Opens the `SubscribeInvoices` server stream.
    async fn subscribe_invoices(
        &self,
        request: InvoiceSubscription,
    ) -> Result<RpcStream<Invoice>, Status>;

    /// Calls `GetInfo`.
    async fn get_info(&self, request: GetInfoRequest) -> Result<GetInfoResponse, Status>;
}

type Stub = LightningClient<InterceptedService<Channel, MacaroonInterceptor>>;

/// Generated client bound to exactly one [`LndChannel`].
#[derive(Clone)]
pub struct LightningProvider {
    stub: Stub,
    target: String,
}

impl LightningProvider {
    /// Wraps `channel`, applying its macaroon and message size limits.
    #[must_use]
    pub fn from_channel(channel: LndChannel) -> Self {
        let target = channel.target().to_string();
        let (channel, interceptor, options) = channel.into_parts();

        let mut stub = LightningClient::with_interceptor(channel, interceptor);
        if let Some(limit) = options.max_send_message_length {
            stub = stub.max_encoding_message_size(limit);
        }
        if let Some(limit) = options.max_receive_message_length {
            stub = stub.max_decoding_message_size(limit);
        }

        Self { stub, target }
    }

    /// `host:port` of the daemon behind this handle.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl std::fmt::Debug for LightningProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightningProvider")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LightningRpc for LightningProvider {
    async fn subscribe_invoices(
        &self,
        request: InvoiceSubscription,
    ) -> Result<RpcStream<Invoice>, Status> {
        // Generated methods take &mut self; clones share the channel.
        let mut stub = self.stub.clone();
        let response = stub.subscribe_invoices(request).await?;
        Ok(response.into_inner().boxed())
    }

    async fn get_info(&self, request: GetInfoRequest) -> Result<GetInfoResponse, Status> {
        let mut stub = self.stub.clone();
        let response = stub.get_info(request).await?;
        Ok(response.into_inner())
    }
}
