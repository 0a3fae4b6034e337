//! Protocol buffer bindings for the LND Lightning service.
//!
//! This crate contains the generated types and client stub from
//! `proto/lightning.proto`, a wire-compatible subset of LND's `lnrpc` package
//! covering `GetInfo` and `SubscribeInvoices`.

#![allow(missing_docs)] // Generated code doesn't have docs

/// Generated `lnrpc` protocol buffer types.
pub mod lnrpc {
    tonic::include_proto!("lnrpc");
}

// Re-export commonly used types at crate root
pub use lnrpc::{
    invoice::InvoiceState, lightning_client::LightningClient, GetInfoRequest, GetInfoResponse,
    Invoice, InvoiceSubscription,
};
