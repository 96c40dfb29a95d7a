use anyhow::Result;
use clap::Parser;

use keystash_cli::cli::{ClientCommands, Cli, Commands, TokenCommands, UserCommands};
use keystash_cli::commands::{self, Context};
use keystash_cli::config::{self, loader::load_config};
use keystash_cli::observability;
use keystash_cli::output::print_error;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config or KEYSTASH_CONFIG
    Explicit,
    /// Default path (keystash.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Explicit => write!(f, "--config / KEYSTASH_CONFIG"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();
    let logging = observability::LogControl::install();

    let (config_path, source) = match cli.config.as_deref() {
        Some(path) => (path.to_string(), ConfigSource::Explicit),
        None => (config::DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default),
    };

    if matches!(source, ConfigSource::Explicit) && !std::path::Path::new(&config_path).exists() {
        eprintln!("Configuration error: {config_path} does not exist");
        std::process::exit(2);
    }

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = logging.apply(&cfg.logging.level) {
        eprintln!("Warning: {e:#}");
    }
    tracing::debug!(
        path = %config_path,
        source = %source,
        backend = %cfg.cache.backend,
        "Configuration loaded"
    );

    let ctx = Context::new(cfg, cli.format.unwrap_or_default());
    if let Err(e) = run(&cli, &ctx).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, ctx: &Context) -> Result<()> {
    match &cli.command {
        Commands::Client(args) => match &args.command {
            ClientCommands::Register(register) => commands::client::register(ctx, register).await?,
            ClientCommands::Show(id) => commands::client::show(ctx, &id.id).await?,
            ClientCommands::List => commands::client::list(ctx).await?,
            ClientCommands::Delete(id) => commands::client::delete(ctx, &id.id).await?,
        },
        Commands::User(args) => match &args.command {
            UserCommands::Create(create) => {
                commands::user::create(ctx, &create.username, create.password_stdin).await?;
            }
            UserCommands::Delete(user) => commands::user::delete(ctx, &user.username).await?,
            UserCommands::Consents(user) => commands::user::consents(ctx, &user.username).await?,
        },
        Commands::Token(args) => match &args.command {
            TokenCommands::Inspect(token) => commands::token::inspect(ctx, &token.token).await?,
            TokenCommands::Revoke(token) => commands::token::revoke(ctx, &token.token).await?,
        },
        Commands::Keys(args) => commands::keys::list(ctx, &args.pattern).await?,
        Commands::Demo => commands::demo::run(ctx).await?,
        Commands::Config => print!("{}", ctx.config.to_redacted_toml()?),
    }

    Ok(())
}
