//! inputenv probe
//!
//! Builds a controller environment, prints what it found, optionally
//! rumbles one device, then shuts the environment down.
//!
//! Usage:
//!   inputenv-probe [--config PATH] [--rumble INDEX FORCE] [--hold SECONDS]

use anyhow::{Context, Result, bail};
use inputenv_linux::{ControllerEnvironment, EnvironmentConfig, LinuxEnvironment, ShutdownOutcome};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    rumble: Option<(usize, f32)>,
    hold: Duration,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--rumble" => {
                let index = args
                    .next()
                    .context("--rumble needs a device index")?
                    .parse::<usize>()
                    .context("invalid device index")?;
                let force = args
                    .next()
                    .context("--rumble needs a force")?
                    .parse::<f32>()
                    .context("invalid force")?;
                parsed.rumble = Some((index, force));
            }
            "--hold" => {
                let secs = args
                    .next()
                    .context("--hold needs a number of seconds")?
                    .parse::<u64>()
                    .context("invalid hold time")?;
                parsed.hold = Duration::from_secs(secs);
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(parsed)
}

/// How long to keep the environment up before shutting down. A requested
/// rumble gets at least one effect length, or shutdown would discard it.
fn settle_time(args: &Args, config: &EnvironmentConfig) -> Duration {
    if args.rumble.is_some() {
        args.hold
            .max(Duration::from_millis(u64::from(config.rumble_duration_ms)))
    } else {
        args.hold
    }
}

fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => EnvironmentConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EnvironmentConfig::load_default().context("loading default configuration")?,
    };

    let env = LinuxEnvironment::with_config(&config);
    if !env.is_supported() {
        warn!("This platform has no Linux event subsystem");
        return Ok(());
    }

    info!("Found {} controllers", env.controllers().len());
    for controller in env.controllers() {
        let rumble = if controller.rumblers().is_empty() { "" } else { " [rumble]" };
        println!("{controller}{rumble}");
    }

    if let Some((index, force)) = args.rumble {
        let Some(controller) = env.controllers().iter().find(|c| c.index() == index) else {
            bail!("no controller with device index {index}");
        };
        let Some(rumbler) = controller.rumblers().first() else {
            bail!("{} has no force feedback", controller.name());
        };
        if !rumbler.rumble(force) {
            bail!("rumble for {} was not accepted", controller.name());
        }
        info!("Rumble {:.2} queued for {}", force, controller.name());
    }

    let settle = settle_time(&args, &config);
    if !settle.is_zero() {
        std::thread::sleep(settle);
    }

    match env.request_shutdown() {
        ShutdownOutcome::Completed => info!("Event subsystem shut down"),
        ShutdownOutcome::TimedOut => warn!("Event subsystem did not shut down in time"),
    }
    Ok(())
}
