use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use finanzguru::cli::login::LoginCredentials;
use finanzguru::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct LoginArgs {
    /// Refresh token from an existing Finanzguru session
    #[arg(long)]
    refresh_token: Option<String>,

    /// Account password
    #[arg(long)]
    password: Option<String>,
}

impl From<LoginArgs> for LoginCredentials {
    fn from(args: LoginArgs) -> Self {
        match (args.refresh_token, args.password) {
            (Some(token), _) => LoginCredentials::RefreshToken(token),
            (None, Some(password)) => LoginCredentials::Password(password),
            (None, None) => unreachable!("clap requires one login method"),
        }
    }
}

impl From<Commands> for finanzguru::AppCommand {
    fn from(cmd: Commands) -> finanzguru::AppCommand {
        match cmd {
            Commands::Status { json } => finanzguru::AppCommand::Status { json },
            Commands::Watch => finanzguru::AppCommand::Watch,
            Commands::Login(args) => finanzguru::AppCommand::Login(args.into()),
            Commands::Logout => finanzguru::AppCommand::Logout,
            Commands::Setup { .. } => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup {
        /// E-mail address of the Finanzguru account
        #[arg(long)]
        email: Option<String>,
    },
    /// Log in and store the session for the configured account
    Login(LoginArgs),
    /// Fetch and display the current overview
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll the overview on the configured interval
    Watch,
    /// Remove the stored session
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup { email }) => {
            finanzguru::cli::setup::setup(cli.config_path.as_deref(), email.as_deref()).map(|_| ())
        }
        Some(cmd) => finanzguru::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
