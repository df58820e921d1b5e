use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, info};
use way_layout::actor::reactor::replay::{LoggingCompositor, Record, replay};
use way_layout::common::config::{
    Align, Arrange, Config, ConfigCommand, LogThreshold, UserScale, UserTransform, config_file,
};
use way_layout::common::log;
use way_layout::ipc::{self, IpcClient, Request, Response};
use way_layout::model::Transform;
use way_layout::server::{self, Options};
use way_layout::sys::process::acquire_singleton;

/// Arranges Wayland outputs automatically.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Record reactor events to the specified file path. Overwrites the file if
    /// exists.
    #[arg(long, value_name = "PATH")]
    record: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the running daemon's configuration and head state
    Get,
    /// Change a setting of the running daemon
    Set {
        #[command(subcommand)]
        setting: SetCommand,
    },
    /// Remove an entry from a list setting of the running daemon
    Delete {
        #[command(subcommand)]
        setting: DeleteCommand,
    },
    /// Write the running daemon's configuration to its file
    Write,
    /// Feed a recording made with --record through a reactor, without a compositor
    Replay { path: PathBuf },
}

#[derive(Subcommand)]
enum SetCommand {
    /// Arrange heads in a row or a column, aligned along the other axis
    ArrangeAlign {
        #[arg(long, value_enum)]
        arrange: Option<Arrange>,
        #[arg(long, value_enum)]
        align: Option<Align>,
    },
    /// Heads matching these names or descriptions are placed first, in order
    Order {
        #[arg(required = true)]
        name_desc: Vec<String>,
    },
    AutoScale {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    Scale { name_desc: String, scale: f64 },
    Transform {
        name_desc: String,
        #[arg(value_enum)]
        transform: Transform,
    },
    /// Prefer the highest refresh rate at the preferred resolution
    MaxPreferredRefresh { name_desc: String },
    Disabled { name_desc: String },
    LaptopDisplayPrefix { prefix: String },
    LogThreshold {
        #[arg(value_enum)]
        threshold: LogThreshold,
    },
}

#[derive(Subcommand)]
enum DeleteCommand {
    Scale { name_desc: String },
    Transform { name_desc: String },
    MaxPreferredRefresh { name_desc: String },
    Disabled { name_desc: String },
}

impl From<SetCommand> for ConfigCommand {
    fn from(cmd: SetCommand) -> Self {
        match cmd {
            SetCommand::ArrangeAlign { arrange, align } => {
                ConfigCommand::SetArrangeAlign { arrange, align }
            }
            SetCommand::Order { name_desc } => ConfigCommand::SetOrder(name_desc),
            SetCommand::AutoScale { enabled } => ConfigCommand::SetAutoScale(enabled),
            SetCommand::Scale { name_desc, scale } => {
                ConfigCommand::SetScale(UserScale { name_desc, scale })
            }
            SetCommand::Transform { name_desc, transform } => {
                ConfigCommand::SetTransform(UserTransform { name_desc, transform })
            }
            SetCommand::MaxPreferredRefresh { name_desc } => {
                ConfigCommand::AddMaxPreferredRefresh(name_desc)
            }
            SetCommand::Disabled { name_desc } => ConfigCommand::AddDisabled(name_desc),
            SetCommand::LaptopDisplayPrefix { prefix } => {
                ConfigCommand::SetLaptopDisplayPrefix(prefix)
            }
            SetCommand::LogThreshold { threshold } => ConfigCommand::SetLogThreshold(threshold),
        }
    }
}

impl From<DeleteCommand> for ConfigCommand {
    fn from(cmd: DeleteCommand) -> Self {
        match cmd {
            DeleteCommand::Scale { name_desc } => ConfigCommand::DeleteScale(name_desc),
            DeleteCommand::Transform { name_desc } => ConfigCommand::DeleteTransform(name_desc),
            DeleteCommand::MaxPreferredRefresh { name_desc } => {
                ConfigCommand::DeleteMaxPreferredRefresh(name_desc)
            }
            DeleteCommand::Disabled { name_desc } => ConfigCommand::DeleteDisabled(name_desc),
        }
    }
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();

    let request = match opt.command {
        None => None,
        Some(Commands::Get) => Some(Request::GetConfig),
        Some(Commands::Set { setting }) => Some(Request::Apply(setting.into())),
        Some(Commands::Delete { setting }) => Some(Request::Apply(setting.into())),
        Some(Commands::Write) => Some(Request::WriteConfig),
        Some(Commands::Replay { path }) => {
            log::init_logging();
            process::exit(run_replay(&path));
        }
    };

    if let Some(request) = request {
        process::exit(send_request(&request));
    }

    log::init_logging();
    install_panic_hook();

    if let Err(e) = run_daemon(opt.config, opt.record) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run_daemon(config: Option<PathBuf>, record: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(pid_file) = acquire_singleton()? else {
        anyhow::bail!("way-layout is already running on this terminal");
    };
    info!("pid file {}", pid_file.path().display());

    let config_path = match config {
        Some(path) => path,
        None => config_file()?,
    };
    let config = Config::load(&config_path);
    log::set_threshold(config.log_threshold);

    let record = Record::new(record.as_deref())?;
    server::run(Options { config, config_path, record })
}

fn send_request(request: &Request) -> i32 {
    let response = match IpcClient::new(ipc::socket_path()).send(request) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    match &response {
        Response::Success { data } => print_json(data),
        Response::Error { error } => match error.get("message").and_then(|m| m.as_str()) {
            Some(message) => eprintln!("{message}"),
            None => print_json(error),
        },
    }

    if response.is_success() { 0 } else { 1 }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

fn run_replay(path: &std::path::Path) -> i32 {
    let mut compositor = LoggingCompositor::default();
    let result = replay(path, &mut compositor)
        .with_context(|| format!("Could not replay {}", path.display()));
    match result {
        Ok(reactor) => {
            info!("{} configurations applied", compositor.applied);
            print_json(&serde_json::to_value(reactor.snapshot()).unwrap_or_default());
            0
        }
        Err(e) => {
            error!("{e:#}");
            1
        }
    }
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of unwinding through the event loop.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
