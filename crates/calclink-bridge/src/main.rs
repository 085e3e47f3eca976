//! calclink entry point.
//!
//! Loads configuration, installs logging, and runs one subcommand.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config / init_logging
//!  └─ bridge
//!  │    ├─ LinkPoller          (spawn_blocking, owns the USB link)
//!  │    └─ console relay       (Tokio task: comms check, stdin, outbound)
//!  └─ list | read | send-program | send-var | exit-exam
//!       └─ CalculatorOperations (one blocking call, then exit)
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use calclink_bridge::application::operations::CalculatorOperations;
use calclink_bridge::application::poller::{LinkPoller, PollerConfig};
use calclink_bridge::application::session::{session_channels, CONNECTION_LOST, INBOUND_CAPACITY};
use calclink_bridge::infrastructure::console_relay::{self, RelayExit};
use calclink_bridge::infrastructure::logging::init_logging;
use calclink_bridge::infrastructure::storage::config::{self, AppConfig, DeviceConfig};
use calclink_bridge::infrastructure::usb::device::DeviceLink;

/// Interval at which the startup comms check looks for its answer.
const COMMS_CHECK_POLL: Duration = Duration::from_secs(1);

/// How long shutdown waits for a pending stdin read.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "calclink", version, about = "TI-84 Plus CE USB link bridge")]
struct Cli {
    /// Configuration file (default: the platform config directory).
    #[arg(long, global = true, env = "CALCLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter, e.g. `debug` (overrides the config file).
    #[arg(long, global = true, env = "CALCLINK_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the poller with a console relay until the link is lost.
    Bridge,
    /// List the programs on the calculator.
    List,
    /// Print a program's content.
    Read { title: String },
    /// Create or replace a program.  `ENTER` in the text starts a new line.
    SendProgram { title: String, text: String },
    /// Store a number in a real variable (A–Z).
    SendVar { name: String, value: String },
    /// Leave exam (Press-to-Test) mode.
    ExitExam,
    /// Write the effective configuration to the config file.
    WriteConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
    .context("failed to load configuration")?;

    // Held until exit so buffered log lines reach the file.
    let _log_guard = init_logging(&config.logging, cli.log_level.as_deref())
        .context("failed to initialise logging")?;

    info!("calclink {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Bridge => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            let result = runtime.block_on(run_bridge(config));
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
            result
        }
        Command::List => {
            let mut link = open_link(&config.device)?;
            for title in link.list_program_titles().context("listing failed")? {
                println!("{title}");
            }
            Ok(())
        }
        Command::Read { title } => {
            let mut link = open_link(&config.device)?;
            let content = link
                .read_program(&title)
                .with_context(|| format!("failed to read {title}"))?;
            println!("{content}");
            Ok(())
        }
        Command::SendProgram { title, text } => {
            let mut link = open_link(&config.device)?;
            link.upsert_program(&title, &text)
                .with_context(|| format!("failed to send {title}"))?;
            info!("sent program {title}");
            Ok(())
        }
        Command::SendVar { name, value } => {
            let mut link = open_link(&config.device)?;
            link.send_variable(&name, &value)
                .with_context(|| format!("failed to set {name} = {value}"))?;
            info!("stored {value} in {name}");
            Ok(())
        }
        Command::ExitExam => {
            let mut link = open_link(&config.device)?;
            link.exit_exam_mode().context("failed to leave exam mode")?;
            info!("exam mode exit sent");
            Ok(())
        }
        Command::WriteConfig => {
            let path = match cli.config {
                Some(path) => {
                    config::save_config_to(&config, &path)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    path
                }
                None => {
                    config::save_config(&config).context("failed to write config")?;
                    config::config_file_path().context("no config location")?
                }
            };
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Opens the calculator and runs the session handshake.
fn open_link(device: &DeviceConfig) -> anyhow::Result<CalculatorOperations<DeviceLink>> {
    let mut link = CalculatorOperations::open(device).with_context(|| {
        format!(
            "failed to open calculator {:04x}:{:04x}",
            device.vendor_id, device.product_id
        )
    })?;
    link.initialize_link().context("link handshake failed")?;
    Ok(link)
}

/// Runs the poller on a blocking thread and the console relay on the
/// runtime until either side stops or Ctrl-C.  A poller that fails to
/// open or initialise the link ends the bridge with its error.
async fn run_bridge(config: AppConfig) -> anyhow::Result<()> {
    let (relay, poller_handle) = session_channels(INBOUND_CAPACITY);

    // Shutdown flag shared with the poller thread.
    let running = Arc::new(AtomicBool::new(true));

    // ── Poller ────────────────────────────────────────────────────────────────
    let device = config.device.clone();
    let poller_config = PollerConfig::from(&config.poller);
    let poller_running = Arc::clone(&running);
    let mut poller_task = tokio::task::spawn_blocking(move || {
        let link = match CalculatorOperations::open(&device) {
            Ok(link) => link,
            Err(e) => {
                poller_handle.publish(CONNECTION_LOST);
                return Err(e).context("failed to open calculator");
            }
        };
        let poller = LinkPoller::new(link, poller_handle, poller_config);
        poller.run(&poller_running).context("poller failed")
    });

    // ── Console relay ─────────────────────────────────────────────────────────
    let relay_task = async {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let mut stdout = std::io::stdout();
        console_relay::run_session(
            &relay,
            &config.relay,
            &config.poller.confirmation_token,
            COMMS_CHECK_POLL,
            stdin,
            &mut stdout,
        )
        .await
    };

    // Whichever side stops first ends the bridge.
    let poller_finished = tokio::select! {
        exit = relay_task => {
            match exit {
                Ok(RelayExit::ConnectionLost) => warn!("connection to calculator lost"),
                Ok(RelayExit::InputClosed) => info!("console closed"),
                Err(e) => error!("relay stopped: {e}"),
            }
            None
        }
        joined = &mut poller_task => Some(joined),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            None
        }
    };

    running.store(false, Ordering::Relaxed);
    let joined = match poller_finished {
        Some(joined) => joined,
        None => poller_task.await,
    };
    let state = joined.context("poller thread panicked")??;
    info!("bridge stopped, poller state {state:?}");
    Ok(())
}
