//! Service facade: the calls applications make.

use lnd_proto::{GetInfoRequest, GetInfoResponse, Invoice, InvoiceSubscription};

use crate::classify::{handle_rpc_errors, ClassifiedError, ErrorHandling};
use crate::connection::{channel_from, ChannelOptions, ConnectionParams};
use crate::error::Result;
use crate::provider::{LightningProvider, LightningRpc};
use crate::stream::ClassifiedStream;

/// Stream returned by [`LightningService::subscribe_invoices`].
pub type InvoiceStream = ClassifiedStream<Invoice>;

/// Lightning RPC calls wrapped in the error classifier.
///
/// Holds one provider for the life of the session. Cheap to clone and safe
/// to share across tasks; nothing in it changes after construction.
#[derive(Debug, Clone)]
pub struct LightningService<R = LightningProvider> {
    provider: R,
    errors: ErrorHandling,
}

impl LightningService<LightningProvider> {
    /// Builds the full stack for `params`: credentials, lazy channel, stub.
    pub fn connect_lazy(params: &ConnectionParams, options: &ChannelOptions) -> Result<Self> {
        let channel = channel_from(params.host(), params.port(), params.credentials()?, options)?;
        Ok(Self::new(LightningProvider::from_channel(channel)))
    }

    /// Like [`connect_lazy`](Self::connect_lazy), but completes the TLS
    /// handshake before returning.
    pub async fn connect(params: &ConnectionParams, options: &ChannelOptions) -> Result<Self> {
        let channel = crate::connection::connect(params, options).await?;
        Ok(Self::new(LightningProvider::from_channel(channel)))
    }
}

impl<R: LightningRpc> LightningService<R> {
    /// Wraps `provider` with the default [`ErrorHandling::Suppress`] policy.
    #[must_use]
    pub fn new(provider: R) -> Self {
        Self {
            provider,
            errors: ErrorHandling::default(),
        }
    }

    /// Returns a copy of this service using `errors` for failures.
    #[must_use]
    pub fn with_error_handling(mut self, errors: ErrorHandling) -> Self {
        self.errors = errors;
        self
    }

    /// The error handling mode in effect.
    #[must_use]
    pub fn error_handling(&self) -> ErrorHandling {
        self.errors
    }

    /// The wrapped provider.
    #[must_use]
    pub fn provider(&self) -> &R {
        &self.provider
    }

    /// Opens a stream of invoice updates.
    ///
    /// `add_index` and `settle_index` resume from those positions; `None`
    /// starts from the daemon's current state. The stream is not restarted
    /// after a failure. Reissue the call with the last indices seen to
    /// resume.
    ///
    /// Must be called within a tokio runtime.
    pub fn subscribe_invoices(
        &self,
        add_index: Option<u64>,
        settle_index: Option<u64>,
    ) -> InvoiceStream {
        let request = InvoiceSubscription {
            add_index: add_index.unwrap_or_default(),
            settle_index: settle_index.unwrap_or_default(),
        };
        tracing::debug!(
            add_index = request.add_index,
            settle_index = request.settle_index,
            "subscribing to invoices"
        );

        let provider = self.provider.clone();
        ClassifiedStream::relay(
            async move { provider.subscribe_invoices(request).await },
            self.errors,
        )
    }

    /// Fetches node information.
    ///
    /// `Ok(None)` means the call failed and the failure was suppressed.
    pub async fn get_info(&self) -> std::result::Result<Option<GetInfoResponse>, ClassifiedError> {
        let result = self
            .provider
            .get_info(GetInfoRequest {})
            .await
            .map_err(ClassifiedError::from_status);
        handle_rpc_errors(result, self.errors)
    }
}
