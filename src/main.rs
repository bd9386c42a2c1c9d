//! Command-line front end for the Smoothieware controller driver.
//!
//! Opens a serial or TCP connection, optionally loads a G-code file, and
//! then accepts a small set of line commands on stdin (`start`, `pause`,
//! `resume`, `stop`, `status`, `feed <gcode>`, `quit`) until the connection
//! closes or the user quits. Session multiplexing across multiple clients is
//! explicitly out of scope for this driver — this binary is a single local
//! session exercising the `ControllerTrait` surface end to end.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use smoothie_comm::{
    ConnectionParams, DispatcherConfig, LocalFileReader, NoMacros, SerialTransport,
    SmoothiewareController, TcpConnectionInfo, TcpTransport, Transport,
};
use smoothie_core::ControllerTrait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use smoothie_driver::init_logging;

/// Command-line arguments for the Smoothieware controller driver.
#[derive(Parser, Debug)]
#[command(name = "smoothie-driver", version, about = "Smoothieware CNC/laser controller driver")]
struct Args {
    /// Serial port path (e.g. `/dev/ttyUSB0`) or TCP host, depending on `--tcp`.
    port: String,

    /// Treat `port` as a TCP host and use `--tcp-port` instead of a serial baud rate.
    #[arg(long)]
    tcp: bool,

    /// Serial baud rate (ignored when `--tcp` is set).
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// TCP port (only used when `--tcp` is set).
    #[arg(long, default_value_t = 23)]
    tcp_port: u16,

    /// G-code file to load (not started automatically unless `--start` is given).
    #[arg(long)]
    file: Option<PathBuf>,

    /// Start streaming the loaded file immediately after connecting.
    #[arg(long)]
    start: bool,

    /// Don't pause the workflow on a machine-reported `error:` response.
    #[arg(long)]
    ignore_errors: bool,
}

struct CliConfig {
    ignore_errors: bool,
}

impl DispatcherConfig for CliConfig {
    fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }
}

fn build_transport(args: &Args) -> Box<dyn Transport> {
    if args.tcp {
        Box::new(TcpTransport::new(TcpConnectionInfo::new(args.port.clone(), args.tcp_port)))
    } else {
        let params = ConnectionParams::serial(args.port.clone(), args.baud);
        Box::new(SerialTransport::new(params))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let args = Args::parse();

    let transport = build_transport(&args);
    let config: Arc<dyn DispatcherConfig> = Arc::new(CliConfig {
        ignore_errors: args.ignore_errors,
    });

    let mut controller = SmoothiewareController::with_config(
        args.port.clone(),
        transport,
        config,
        Arc::new(NoMacros),
        Arc::new(LocalFileReader),
    );

    info!(port = %args.port, "connecting");
    controller.connect().await?;

    if let Some(path) = &args.file {
        controller.dispatcher().sender_load_file(path).await?;
        info!(file = %path.display(), "loaded program");
        if args.start {
            controller.start_streaming().await?;
        }
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    println!("commands: start | pause | resume | stop | status | feed <gcode> | quit");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let result = match cmd {
            "start" => controller.start_streaming().await,
            "pause" => controller.pause_streaming().await,
            "resume" => controller.resume_streaming().await,
            "stop" => controller.cancel_streaming().await,
            "status" => {
                println!("{:?} / {:?}", controller.get_state(), controller.get_status());
                Ok(())
            }
            "feed" => controller.send_command(rest).await,
            "quit" | "exit" => break,
            other => {
                warn!(command = other, "unknown command");
                continue;
            }
        };
        if let Err(err) = result {
            error!(error = %err, "command failed");
        }
    }

    controller.disconnect().await?;
    Ok(())
}
