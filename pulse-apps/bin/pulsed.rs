use anyhow::{anyhow, Context, Result as AnyResult};
use clap::{crate_version, App, Arg, ArgMatches};
use pulse::{init_counters, ConsumerFactory, Coordinator};
use pulse_common::configs::AgentConfig;
use pulse_sources::SourceFactory;
use std::sync::Arc;

#[macro_use]
extern crate log;

#[tokio::main]
async fn main() {
    let matches = get_matches();

    let config_file = match matches.value_of("config") {
        Some(file) => file,
        None => {
            eprintln!("Expect agent config");
            eprintln!("use -h for help");
            std::process::exit(2);
        }
    };
    println!("Agent config: {:?}", config_file);
    let config = match AgentConfig::try_get(config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = log4rs::init_file(config.log_config(), Default::default()) {
        eprintln!("can't init logger from {}: {}", config.log_config(), e);
        std::process::exit(1);
    }

    let code = match run(&config).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("agent failed: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

/// Returns `true` on a clean stop.
async fn run(config: &AgentConfig) -> AnyResult<bool> {
    init_counters(config.telemetry()).context("telemetry")?;

    let coordinator = Coordinator::initialize(
        config,
        &SourceFactory::default(),
        &ConsumerFactory::new(config.shutdown_timeout()),
    )
    .context("initialization")?;
    let latch = coordinator.exit_latch();

    if let Err(e) = coordinator.start().await {
        coordinator.stop().await;
        return Err(anyhow!(e).context("start"));
    }
    create_signal_handlers(&coordinator)?;
    info!("agent is running");

    latch.wait().await;
    match serde_yaml::to_string(&coordinator.health()) {
        Ok(health) => info!("final state:\n{}", health),
        Err(e) => warn!("can't render final state: {}", e),
    }
    Ok(coordinator
        .shutdown_report()
        .map_or(false, |report| report.is_clean()))
}

fn create_signal_handlers(coordinator: &Arc<Coordinator>) -> AnyResult<()> {
    use tokio::signal::unix::SignalKind;
    for kind in [SignalKind::terminate(), SignalKind::interrupt()] {
        spawn_signal_handler(coordinator, kind)?;
    }
    Ok(())
}

fn spawn_signal_handler(
    coordinator: &Arc<Coordinator>,
    kind: tokio::signal::unix::SignalKind,
) -> AnyResult<()> {
    use tokio::signal::unix::signal;
    let mut task = signal(kind).context("signal handler")?;
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        task.recv().await;
        debug!("Got signal {:?}", kind);
        let report = coordinator.stop().await;
        for e in report.errors() {
            warn!("shutdown error: {}", e);
        }
    });
    Ok(())
}

fn get_matches<'a>() -> ArgMatches<'a> {
    App::new("pulsed")
        .version(crate_version!())
        .about("Periodic metrics collection agent")
        .arg(
            Arg::with_name("config")
                .help("agent config file")
                .takes_value(true)
                .short("c")
                .long("config"),
        )
        .get_matches()
}
