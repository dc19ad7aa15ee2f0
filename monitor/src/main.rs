use anyhow::Context;
use clap::Parser;
use client::ServiceClient;
use fireguardcore::store::MemoryStore;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use workflow::config::{MonitorConfig, SimulationConfig};
use workflow::runner::Runner;

mod client;
mod generator;
mod service;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Fire-detection monitor and alert service")]
struct Args {
    /// Run one offline monitoring session against a synthetic camera
    #[arg(long, default_value_t = false)]
    simulate: bool,
    /// Host the alert service until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Load the monitor config from YAML; other flags are ignored when set
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value = "127.0.0.1:9000")]
    bind: SocketAddr,
    #[arg(long, default_value_t = 33)]
    tick_ms: u64,
    #[arg(long, default_value_t = 5_000)]
    duration_ms: u64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 0.05)]
    fire_probability: f64,
    /// Confirm every pending alert instead of cancelling it
    #[arg(long, default_value_t = false)]
    auto_confirm: bool,
    /// Dispatch simulated alerts to a running service, e.g. http://127.0.0.1:9000
    #[arg(long)]
    remote: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = &args.workflow {
        MonitorConfig::load(path)?
    } else {
        MonitorConfig::from_args(
            args.bind,
            args.tick_ms,
            SimulationConfig {
                seed: args.seed,
                duration_ms: args.duration_ms,
                fire_probability: args.fire_probability,
                auto_confirm: args.auto_confirm,
                ..SimulationConfig::default()
            },
        )
    };

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;

    runtime.block_on(async {
        if args.simulate {
            let runner = Runner::new(config.clone());
            let summary = match &args.remote {
                Some(url) => {
                    let client = ServiceClient::new(url.as_str())?;
                    runner.simulate(Arc::new(client)).await?
                }
                None => runner.simulate(Arc::new(MemoryStore::seeded())).await?,
            };
            println!("Simulated run -> {}", summary);
            println!(
                "Final status -> {}",
                serde_json::to_string(&summary.status).context("encoding session status")?
            );
        }

        if args.serve {
            service::serve(config.bind, Arc::new(MemoryStore::seeded())).await?;
        }

        if !args.simulate && !args.serve {
            info!("nothing to do; pass --simulate and/or --serve");
        }
        Ok::<(), anyhow::Error>(())
    })
}
