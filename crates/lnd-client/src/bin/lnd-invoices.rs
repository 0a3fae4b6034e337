//! Prints invoice updates from an LND node as they arrive.
//!
//! ```text
//! lnd-invoices --config lnd.toml --add-index 120
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use lnd_client::logging::{self, OutputFormat, TracingConfig};
use lnd_client::{ErrorHandling, LightningService, LndConfig};

#[derive(Parser, Debug)]
#[command(name = "lnd-invoices", about = "Stream invoice updates from an LND node")]
struct Args {
    /// Configuration file (LND_* environment variables override it)
    #[arg(short, long, default_value = "lnd.toml")]
    config: PathBuf,

    /// Resume after this add index
    #[arg(long)]
    add_index: Option<u64>,

    /// Resume after this settle index
    #[arg(long)]
    settle_index: Option<u64>,

    /// Report every RPC failure instead of suppressing the transient ones
    #[arg(long)]
    surface_errors: bool,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "pretty")]
    log_format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = LndConfig::load_from(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate()?;

    logging::init(TracingConfig::from_lnd_config(&config)?.with_format(args.log_format))?;

    let params = config
        .connection_params()
        .context("reading TLS certificate and macaroon")?;
    let errors = if args.surface_errors {
        ErrorHandling::Surface
    } else {
        ErrorHandling::Suppress
    };
    let service = LightningService::connect_lazy(&params, &config.channel_options())?
        .with_error_handling(errors);

    tracing::info!(daemon = service.provider().target(), "subscribing to invoices");

    let mut invoices = service.subscribe_invoices(args.add_index, args.settle_index);
    let mut last_add = args.add_index.unwrap_or_default();
    let mut last_settle = args.settle_index.unwrap_or_default();
    while let Some(invoice) = invoices.next().await {
        let invoice = invoice.with_context(|| {
            format!(
                "invoice stream failed; resume with --add-index {last_add} --settle-index {last_settle}"
            )
        })?;
        last_add = last_add.max(invoice.add_index);
        last_settle = last_settle.max(invoice.settle_index);

        println!(
            "add_index={} settle_index={} state={:?} value={} memo={:?}",
            invoice.add_index,
            invoice.settle_index,
            invoice.state(),
            invoice.value,
            invoice.memo
        );
    }

    tracing::info!("invoice stream closed");
    Ok(())
}
