use clap::{Parser, Subcommand};
use funlink::domain::settings::SettingsService;
use funlink::infrastructure::logging::{self, DiagnosticLog};
use funlink::Dispatcher;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "funlink", version, about = "Send axis commands to motion devices")]
struct Cli {
    /// Settings file to use instead of the per-user default
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one command over the configured transport
    Send {
        /// Command text, e.g. "L0:75:500" or "L0:40:500;R1:80:500"
        command: String,
    },
    /// Probe the configured transport with a fixed test move
    Test,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let service = match cli.config {
        Some(path) => SettingsService::from_path(path),
        None => match SettingsService::new() {
            Ok(service) => service,
            Err(err) => {
                eprintln!("failed to open settings: {err:#}");
                return ExitCode::FAILURE;
            }
        },
    };
    let settings = service.get().clone();

    let _logging = match logging::init_logger(&settings.log_settings) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let Some(connection) = settings.connection() else {
        eprintln!("link is disabled in settings; nothing sent");
        return ExitCode::FAILURE;
    };
    info!("using {} transport", connection.kind_name());

    let diag = DiagnosticLog::new();
    let dispatcher = Dispatcher::new(diag.clone());
    let framing = settings.framing();

    let ok = match cli.command {
        Command::Send { command } => {
            dispatcher
                .send(&connection, &framing, &settings.axis_ranges, &command)
                .await
        }
        Command::Test => dispatcher.test_connection(&connection, &framing).await,
    };

    if ok {
        println!("ok");
        ExitCode::SUCCESS
    } else {
        eprintln!("send failed over {}:", connection.kind_name());
        for line in diag.snapshot() {
            eprintln!("  {line}");
        }
        ExitCode::FAILURE
    }
}
