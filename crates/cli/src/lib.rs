pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use commands::act::TerminalConfirm;
use reqflow_client::{AssumeYes, ConfirmIntent};

#[derive(Debug, Parser)]
#[command(
    name = "reqflow",
    about = "Request lifecycle CLI",
    long_about = "Work the approval and validation queues, resubmit returned requests, and operate the local store.",
    after_help = "Examples:\n  reqflow login --email approver@demo.com --password demo-password\n  reqflow queue approval --function vendor-master\n  reqflow act approval 12 return --remarks \"fix HSN code\"\n  reqflow doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Sign in and store the session token")]
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "REQFLOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    #[command(about = "Revoke the session token and clear the local session")]
    Logout,
    #[command(about = "Show the signed-in account")]
    Whoami,
    #[command(about = "List a queue: approval, validation, approved, validated, or mine")]
    Queue {
        queue: String,
        #[arg(long, help = "Function key to filter by, or `all`")]
        function: Option<String>,
    },
    #[command(about = "Approve, reject, or return a pending request")]
    Act {
        queue: String,
        id: String,
        action: String,
        #[arg(long)]
        remarks: Option<String>,
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
    #[command(about = "Show one request")]
    Show { id: String },
    #[command(about = "Edit a returned request and send it back for approval")]
    Resubmit {
        id: String,
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
    #[command(about = "Create a new request")]
    Submit {
        function: String,
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo accounts and requests")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, session, database, and backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Login { email, password } => commands::session::run_login(&email, &password),
        Command::Logout => commands::session::run_logout(),
        Command::Whoami => commands::session::run_whoami(),
        Command::Queue { queue, function } => commands::queue::run(&queue, function.as_deref()),
        Command::Act { queue, id, action, remarks, yes } => {
            let confirm: &dyn ConfirmIntent = if yes { &AssumeYes } else { &TerminalConfirm };
            commands::act::run(&queue, &id, &action, remarks.as_deref(), confirm)
        }
        Command::Show { id } => commands::request::run_show(&id),
        Command::Resubmit { id, set } => commands::request::run_resubmit(&id, &set),
        Command::Submit { function, set } => commands::request::run_submit(&function, &set),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
