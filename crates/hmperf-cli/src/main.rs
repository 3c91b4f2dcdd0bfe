use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use hmperf_core::adb::AdbBackend;
use hmperf_core::session::Session;
use hmperf_core::{Config, Error};
use log::{debug, info};
use std::path::PathBuf;
use std::process::ExitCode;

mod logging;
mod output;

const SCENARIO_PROMPT: &str = "Test scenario (press Enter to confirm): ";

/// CLI-compatible ADB backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdbBackendArg {
    /// Built-in ADB implementation (no adb binary needed)
    Builtin,
    /// Use system-installed adb binary
    System,
}

impl From<AdbBackendArg> for AdbBackend {
    fn from(arg: AdbBackendArg) -> Self {
        match arg {
            AdbBackendArg::Builtin => AdbBackend::Builtin,
            AdbBackendArg::System => AdbBackend::System,
        }
    }
}

#[derive(Parser)]
#[command(name = "hmperf")]
#[command(about = "Start Android performance tests and upload their reports", long_about = None)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// ADB backend to use; overrides the config file
    #[arg(short = 'B', long = "backend", value_enum, global = true)]
    backend: Option<AdbBackendArg>,

    /// Config file (default: ./hmperf.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding token.txt, pub.pem, the collector and results
    #[arg(short = 'C', long = "work-dir", global = true)]
    work_dir: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push the collector to the device(s) and start a performance test
    Start {
        /// Device serial (optional, every attached device if not specified)
        device: Option<String>,
    },

    /// Upload the result of a device's performance test
    #[command(visible_alias = "up")]
    Upload {
        /// Device serial (optional, required when several are attached)
        device: Option<String>,

        /// Test scenario; prompted for when omitted
        #[arg(short, long)]
        remarks: Option<String>,
    },

    /// Upload the result of a desktop (x86) performance test
    UploadDesktop {
        /// Test scenario; prompted for when omitted
        #[arg(short, long)]
        remarks: Option<String>,
    },

    /// Verify the token and store the session's public key
    Pubkey,

    /// List attached Android devices
    Devices,

    /// Generate shell completion script
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "hmperf", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::setup_logger(cli.verbose) {
        output::warning(&format!("cannot set up logging: {e}"));
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            output::failure(&e);
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when the run completed but its last step did not succeed.
fn run(cli: Cli) -> Result<bool, Error> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    if let Some(dir) = cli.work_dir {
        config.work_dir = dir;
    }
    debug!("{config:?}");
    info!("ADB backend: {}", config.backend);

    let backend = config.backend;
    let session = Session::new(&config, &backend);

    match cli.command {
        Commands::Start { device } => {
            for serial in session.start(device.as_deref())? {
                output::status(&format!("Performance test started on {serial}"));
            }
            Ok(true)
        }
        Commands::Upload { device, remarks } => {
            let mut scenario = scenario_source(remarks);
            let outcome = session.upload(device.as_deref(), &mut scenario)?;
            Ok(output::upload_outcome(&outcome))
        }
        Commands::UploadDesktop { remarks } => {
            let mut scenario = scenario_source(remarks);
            let outcome = session.upload_desktop(&mut scenario)?;
            Ok(output::upload_outcome(&outcome))
        }
        Commands::Pubkey => {
            let path = session.refresh_key()?;
            output::status(&format!("User verified, key stored at {}", path.display()));
            Ok(true)
        }
        Commands::Devices => {
            let devices = session.devices()?;
            if devices.is_empty() {
                output::status("No attached devices");
            }
            for d in devices {
                output::status(&format!("{}\t{}", d.serial, d.status));
            }
            Ok(true)
        }
        Commands::Completions { .. } => Ok(true),
    }
}

/// Given remarks, or an interactive prompt for each report.
fn scenario_source(given: Option<String>) -> impl FnMut() -> hmperf_core::Result<String> {
    move || match &given {
        Some(text) => Ok(text.clone()),
        None => rustyline::DefaultEditor::new()
            .and_then(|mut rl| rl.readline(SCENARIO_PROMPT))
            .map_err(|e| Error::Prompt(e.to_string())),
    }
}
