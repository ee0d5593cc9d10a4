mod api;
mod config;

use clap::Parser;
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "junction",
    about = "Service-resolution and admission layer of the gateway"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long)]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let config = match config::Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Could not load configuration: {err}");
            process::exit(1);
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("Invalid configuration: {err}");
        process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // The guard must stay alive for the process lifetime.
    let _sentry = config.logging.as_ref().map(|logging| {
        sentry::init((
            logging.sentry_dsn.clone(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    if let Some(metrics_config) = &config.metrics {
        if let Err(err) = install_statsd(metrics_config) {
            eprintln!("Could not install the statsd exporter: {err}");
            process::exit(1);
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Could not start the runtime: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(api::serve(config)) {
        tracing::error!(error = %err, "lookup api exited");
        process::exit(1);
    }
}

fn install_statsd(config: &config::MetricsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let recorder = StatsdBuilder::from(&config.statsd_host, config.statsd_port)
        .build(Some("junction"))?;
    metrics::set_global_recorder(recorder).map_err(|err| err.to_string())?;

    shared::metrics_defs::describe_all(registry::metrics_defs::ALL_METRICS);
    shared::metrics_defs::describe_all(admission::metrics_defs::ALL_METRICS);
    Ok(())
}
