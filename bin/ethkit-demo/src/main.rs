//! Thin CLI wiring the Chain Monitor, Receipt Listener, and Finalizer against
//! a live RPC endpoint. Exists purely to demonstrate end-to-end wiring; it
//! carries no independent business logic (SPEC_FULL.md §11).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ethkit_finalizer::{Finalizer, FinalizerConfig, FinalizerEvent};
use ethkit_monitor::{ChainMonitor, MonitorConfig};
use ethkit_primitives::EventKind;
use ethkit_provider::AlloyChainApi;
use ethkit_receipts::{ListenerConfig, ReceiptListener};
use ethkit_wallet::LocalWallet;
use tracing::info;

#[derive(Parser)]
#[clap(about = "ethkit chain-observation and transaction-finalization demo")]
struct Cli {
    /// WebSocket RPC endpoint (required for the monitor's head subscription).
    #[clap(long, env, default_value = "ws://localhost:8546")]
    rpc_ws_url: String,

    /// Minimum delay between head polls, in milliseconds.
    #[clap(long, default_value_t = 1000)]
    polling_interval_ms: u64,

    /// Maximum buffer depth (deepest reorg the monitor can resolve).
    #[clap(long, default_value_t = 64)]
    block_retention_limit: usize,

    /// Depth in blocks at which a receipt is considered final.
    #[clap(long, default_value_t = 12)]
    num_blocks_to_finality: u64,

    /// Private key (hex) for a wallet to track with the Finalizer. If
    /// omitted, the demo runs the Monitor and Receipt Listener only.
    #[clap(long, env, hide_env_values = true)]
    private_key: Option<String>
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let api = Arc::new(AlloyChainApi::connect_ws(&cli.rpc_ws_url).await?);

    let monitor_config = MonitorConfig::default()
        .with_polling_interval(Duration::from_millis(cli.polling_interval_ms))
        .with_block_retention_limit(cli.block_retention_limit);
    let monitor = ChainMonitor::new(api.clone(), monitor_config);
    let monitor_handle = monitor.spawn()?;

    let listener_config = ListenerConfig::default().with_num_blocks_to_finality(cli.num_blocks_to_finality);
    let listener = ReceiptListener::new(api.clone(), listener_config);
    let listener_handle = listener.spawn(monitor_handle.subscribe().await?)?;

    if let Some(private_key) = cli.private_key {
        let wallet = Arc::new(LocalWallet::from_hex(&private_key)?);
        let finalizer: Finalizer<_, _, ()> = Finalizer::new(api.clone(), wallet.clone(), FinalizerConfig::default());
        let mut finalizer_events = finalizer.spawn(monitor_handle.subscribe().await?)?.subscribe().await?;

        tokio::spawn(async move {
            while let Some(event) = finalizer_events.recv().await {
                match event {
                    FinalizerEvent::Added { tx, .. } => info!(hash = %tx.hash, nonce = tx.nonce(), "transaction mined"),
                    FinalizerEvent::Removed { tx, .. } => info!(hash = %tx.hash, nonce = tx.nonce(), "transaction reorged out, resubmitting")
                }
            }
        });

        info!(address = %wallet.address(), "finalizer tracking wallet");
    }

    let mut block_events = monitor_handle.subscribe().await?;
    info!("ethkit demo running, watching for block events (ctrl-c to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                listener_handle.stop();
                monitor_handle.stop();
                break
            }
            batch = block_events.recv() => {
                match batch {
                    Some(batch) => {
                        for event in batch {
                            match event.kind {
                                EventKind::Added => info!(number = event.block.number(), hash = %event.block.hash(), ok = event.ok, "block added"),
                                EventKind::Removed => info!(number = event.block.number(), hash = %event.block.hash(), "block removed")
                            }
                        }
                    }
                    None => {
                        info!("monitor's block event stream ended");
                        break
                    }
                }
            }
        }
    }

    Ok(())
}
