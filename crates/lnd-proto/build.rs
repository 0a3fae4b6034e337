//! Build script for lnd-proto
//!
//! Generates the client side of `lnrpc.Lightning` during `cargo build`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .type_attribute(".", "#[allow(missing_docs)]")
        .compile(&["proto/lightning.proto"], &["proto"])?;

    Ok(())
}
