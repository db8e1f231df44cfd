//! Main application orchestration and execution

use crate::{
    cli::{Cli, Command, QueryArgs},
    client::NetmonClient,
    config::{display_config_summary, validate_config, ConfigParser},
    error::{AppError, Result},
    executor::{ProbeTimeouts, RoundExecutor},
    invoker::OnDemandInvoker,
    lifecycle::{shutdown_signal, LifecycleCoordinator, ShutdownOutcome},
    logging::LoggerFactory,
    models::{config::split_list, Config},
    output::RoundFormatter,
    probe::{DispatchProber, Prober},
    report::{CompositeReporter, GaugeReporter, LogReporter, Reporter},
    scheduler::{PeriodicScheduler, ScheduleIntervals},
    server::{self, AppState},
    types::MeasurementKind,
};
use std::sync::Arc;
use std::time::Duration;

/// Extra time the CLI waits beyond the server's own request deadline
const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::validation)?;
        Ok(Self { cli })
    }

    /// Run the selected command
    pub async fn run(self) -> Result<()> {
        let config = ConfigParser::new(self.cli.clone()).parse()?;

        match &self.cli.command {
            Command::Serve(_) => serve(config).await,
            Command::Ping(args) => {
                print!("{}", run_query(&config, MeasurementKind::Latency, args).await?);
                Ok(())
            }
            Command::Speed(args) => {
                print!("{}", run_query(&config, MeasurementKind::Throughput, args).await?);
                Ok(())
            }
        }
    }
}

/// Run the daemon until a termination signal arrives
pub async fn serve(config: Config) -> Result<()> {
    let factory = LoggerFactory::new(config.clone());
    let logger = factory.create_logger("APP").await;

    logger
        .info(&format!("{} v{} starting", crate::PKG_NAME, crate::VERSION))
        .field("session_id", factory.session_id())
        .log()
        .await;

    for warning in validate_config(&config)? {
        logger
            .warn(&warning.message)
            .field("level", warning.level.as_str())
            .log()
            .await;
    }

    if config.verbose {
        eprintln!("{}", display_config_summary(&config));
    }

    let targets = Arc::new(config.target_set()?);
    let gauges = Arc::new(GaugeReporter::new());
    let reporter: Arc<dyn Reporter> = Arc::new(CompositeReporter::new(vec![
        gauges.clone() as Arc<dyn Reporter>,
        Arc::new(LogReporter::new(factory.create_logger("REPORT").await)) as Arc<dyn Reporter>,
    ]));
    let prober: Arc<dyn Prober> = Arc::new(DispatchProber::system(config.ping_count));

    for kind in MeasurementKind::ALL {
        if let Err(e) = prober.check_ready(kind).await {
            logger
                .warn(&format!("{} prober is not ready: {}", kind, e))
                .field("kind", kind.as_str())
                .log()
                .await;
        }
    }

    let executor = RoundExecutor::new(prober, reporter, ProbeTimeouts::from(&config))
        .with_round_logger(factory.create_round_logger("EXECUTOR").await);

    let coordinator = LifecycleCoordinator::new(config.shutdown_grace(), factory.create_logger("LIFECYCLE").await);
    let shutdown = coordinator.shutdown_token();

    let state = AppState {
        invoker: OnDemandInvoker::new(executor.clone()).with_shutdown(shutdown.clone()),
        gauges,
        request_timeout: config.request_timeout(),
        logger: factory.create_logger("HTTP").await,
    };
    let listener = server::bind(config.http_port).await?;
    let server_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let result = server::serve(listener, state, shutdown.clone()).await;
            if result.is_err() {
                shutdown.cancel();
            }
            result
        }
    });

    let scheduler = PeriodicScheduler::new(executor, targets, ScheduleIntervals::from(&config))
        .with_logger(factory.create_logger("SCHEDULER").await);

    let outcome = coordinator.run(scheduler, shutdown_signal()).await;

    let server_result = match tokio::time::timeout(config.shutdown_grace(), server_task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(AppError::internal(format!("HTTP server task failed: {}", e))),
        Err(_) => {
            logger.warn("HTTP server did not stop within the grace period").log().await;
            Ok(())
        }
    };

    if outcome == ShutdownOutcome::GraceElapsed {
        logger.warn("Abandoned in-flight rounds at shutdown").log().await;
    }
    logger.info("netmon stopped").log().await;

    server_result
}

/// Ask a running server for an on-demand round and render the response
///
/// Per-target failures are part of the rendered output, not an error.
pub async fn run_query(config: &Config, kind: MeasurementKind, args: &QueryArgs) -> Result<String> {
    let ids = match &args.servers {
        Some(servers) => split_list(servers),
        None => match kind {
            MeasurementKind::Latency => config.ping_addresses.clone(),
            MeasurementKind::Throughput => config.speed_server_ids.clone(),
        },
    };

    if ids.is_empty() {
        let var = match kind {
            MeasurementKind::Latency => "NETMON_PING_ADDRESSES",
            MeasurementKind::Throughput => "NETMON_SPEED_SERVER_IDS",
        };
        return Err(AppError::validation(format!(
            "no {} targets given; pass --servers or set {}",
            kind, var
        )));
    }

    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.request_timeout() + CLIENT_TIMEOUT_MARGIN);
    let client = NetmonClient::new(&config.server_url, timeout)?;

    if args.json {
        let body = client.round_raw(kind, &ids).await?;
        Ok(format!("{}\n", body.trim_end()))
    } else {
        let view = client.round(kind, &ids).await?;
        Ok(format!("{}\n", RoundFormatter::new(config.enable_color).format_round(&view)))
    }
}
