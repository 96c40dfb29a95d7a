use clap::{Parser, Subcommand, ValueEnum};
use keystash_auth::GrantType;

#[derive(Parser)]
#[command(name = "keystash")]
#[command(about = "Keystash: manage OAuth 2.0 clients, users and tokens")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to keystash.toml)
    #[arg(short, long, global = true, env = "KEYSTASH_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage registered clients
    Client(ClientArgs),
    /// Manage users
    User(UserArgs),
    /// Inspect or revoke issued tokens
    Token(TokenArgs),
    /// List raw cache keys matching a pattern (e.g. "client:*")
    Keys(KeysArgs),
    /// Run a complete authorization-code grant and print each step
    Demo,
    /// Show the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct ClientArgs {
    #[command(subcommand)]
    pub command: ClientCommands,
}

#[derive(Subcommand)]
pub enum ClientCommands {
    /// Register a new client and print its secret
    Register(RegisterArgs),
    /// Show a client
    Show(IdArgs),
    /// List every client
    List,
    /// Delete a client
    Delete(IdArgs),
}

#[derive(clap::Args)]
pub struct RegisterArgs {
    /// Display name
    #[arg(long)]
    pub name: String,
    /// Allowed redirect URI (repeatable)
    #[arg(long = "redirect-uri", required = true)]
    pub redirect_uris: Vec<String>,
    /// Allowed grant type (repeatable; defaults to authorization_code and refresh_token)
    #[arg(long = "grant-type")]
    pub grant_types: Vec<GrantType>,
}

#[derive(clap::Args)]
pub struct IdArgs {
    /// Client id
    pub id: String,
}

#[derive(clap::Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Create(CreateUserArgs),
    /// Delete a user
    Delete(UsernameArgs),
    /// List the clients a user has authorized
    Consents(UsernameArgs),
}

#[derive(clap::Args)]
pub struct CreateUserArgs {
    /// Username
    pub username: String,
    /// Read the password from the first line of stdin instead of
    /// KEYSTASH_USER_PASSWORD
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(clap::Args)]
pub struct UsernameArgs {
    /// Username
    pub username: String,
}

#[derive(clap::Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Show what an access token grants
    Inspect(TokenValueArgs),
    /// Revoke an access or refresh token
    Revoke(TokenValueArgs),
}

#[derive(clap::Args)]
pub struct TokenValueArgs {
    /// Token value
    pub token: String,
}

#[derive(clap::Args)]
pub struct KeysArgs {
    /// Glob pattern; `*` matches any run of characters
    #[arg(default_value = "*")]
    pub pattern: String,
}
