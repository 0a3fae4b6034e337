//! Channels against a local TLS daemon serving an LND-style certificate.
//!
//! The fixture certificate is self-signed with `CA:TRUE`, like the one LND
//! generates, and the daemon negotiates h2 over ALPN.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::{Body, Request, Response};
use lnd_client::{
    connect, ChannelOptions, ClassifiedError, ClientError, ConnectionParams, ErrorHandling,
    LightningService, Macaroon, TlsCertificate,
};
use rustls::{Certificate, PrivateKey, ServerConfig};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const CERT: &[u8] = include_bytes!("fixtures/tls.cert");
const KEY: &[u8] = include_bytes!("fixtures/tls.key");
const OTHER_CERT: &[u8] = include_bytes!("fixtures/other.cert");
const MACAROON: &str = "0201036c6e64";

/// One request as the daemon received it.
#[derive(Debug, Clone)]
struct SeenRequest {
    path: String,
    macaroon: Option<String>,
}

struct TlsDaemon {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl TlsDaemon {
    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn params(&self, cert: &[u8]) -> ConnectionParams {
        ConnectionParams::new(
            "127.0.0.1",
            self.addr.port(),
            TlsCertificate::from_pem(cert),
            Macaroon::new(MACAROON),
        )
        .unwrap()
    }
}

fn server_config() -> ServerConfig {
    let certs = rustls_pemfile::certs(&mut &CERT[..])
        .unwrap()
        .into_iter()
        .map(Certificate)
        .collect();
    let key = rustls_pemfile::pkcs8_private_keys(&mut &KEY[..])
        .unwrap()
        .remove(0);

    let mut config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, PrivateKey(key))
        .unwrap();
    config.alpn_protocols = vec![b"h2".to_vec()];
    config
}

/// Records the call and answers with a trailers-only UNIMPLEMENTED status.
async fn answer(
    request: Request<Body>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
) -> Result<Response<Body>, Infallible> {
    seen.lock().unwrap().push(SeenRequest {
        path: request.uri().path().to_string(),
        macaroon: request
            .headers()
            .get("macaroon")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    Ok(Response::builder()
        .header("content-type", "application/grpc")
        .header("grpc-status", "12")
        .header("grpc-message", "unimplemented")
        .body(Body::empty())
        .unwrap())
}

async fn spawn_daemon() -> TlsDaemon {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(server_config()));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            let log = log.clone();
            tokio::spawn(async move {
                // Rejected handshakes end here.
                let Ok(tls) = acceptor.accept(tcp).await else {
                    return;
                };
                let service =
                    service_fn(move |request: Request<Body>| answer(request, log.clone()));
                let _ = Http::new()
                    .http2_only(true)
                    .serve_connection(tls, service)
                    .await;
            });
        }
    });

    TlsDaemon { addr, seen }
}

#[tokio::test]
async fn test_connect_completes_handshake_with_lnd_certificate() {
    let daemon = spawn_daemon().await;

    let channel = connect(&daemon.params(CERT), &ChannelOptions::default())
        .await
        .expect("handshake with the pinned certificate should succeed");
    assert_eq!(channel.target(), format!("127.0.0.1:{}", daemon.addr.port()));
}

#[tokio::test]
async fn test_unary_call_carries_macaroon() {
    let daemon = spawn_daemon().await;
    let service = LightningService::connect(&daemon.params(CERT), &ChannelOptions::default())
        .await
        .unwrap();

    let err = service.get_info().await.unwrap_err();
    assert!(
        matches!(err, ClassifiedError::Unimplemented(_)),
        "unexpected classification: {err:?}"
    );

    let seen = daemon.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/lnrpc.Lightning/GetInfo");
    assert_eq!(seen[0].macaroon.as_deref(), Some(MACAROON));
}

#[tokio::test]
async fn test_lazy_stream_carries_macaroon() {
    let daemon = spawn_daemon().await;
    let service =
        LightningService::connect_lazy(&daemon.params(CERT), &ChannelOptions::default()).unwrap();

    let items: Vec<_> = service.subscribe_invoices(Some(5), None).collect().await;
    assert!(matches!(
        items.as_slice(),
        [Err(ClassifiedError::Unimplemented(_))]
    ));

    let seen = daemon.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/lnrpc.Lightning/SubscribeInvoices");
    assert_eq!(seen[0].macaroon.as_deref(), Some(MACAROON));
}

#[tokio::test]
async fn test_other_certificate_is_refused() {
    let daemon = spawn_daemon().await;

    let err = connect(&daemon.params(OTHER_CERT), &ChannelOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");

    let params = daemon.params(OTHER_CERT);
    let service = LightningService::connect_lazy(&params, &ChannelOptions::default())
        .unwrap()
        .with_error_handling(ErrorHandling::Surface);
    let err = service.get_info().await.unwrap_err();
    assert!(
        matches!(
            err,
            ClassifiedError::Unavailable(_) | ClassifiedError::Unknown(_)
        ),
        "unexpected classification: {err:?}"
    );

    assert!(daemon.seen().is_empty(), "no request may cross a refused handshake");
}
