use crate::config::{DEFAULT_TIMEOUT_SECONDS, ProviderConfig, Setting, TOKEN_ENV, URL_ENV};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "terraform-provider-opencti")]
#[command(version)]
#[command(about = "Declarative provider for OpenCTI platform administration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (logs go to stderr)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve lifecycle requests as JSON lines on stdin/stdout
    Serve,

    /// Connect to the platform and report what the provider manages
    Check(ConnectionArgs),

    /// Print the provider and resource schemas as JSON
    Schema,

    /// Read one existing entity and print its state
    Import {
        /// Resource type, e.g. opencti_role or role
        type_name: String,

        /// Platform id of the entity
        id: String,

        /// Print sensitive attributes such as API tokens
        #[arg(long)]
        show_sensitive: bool,

        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Platform connection for the one-shot commands
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// OpenCTI platform URL
    #[arg(long, env = URL_ENV)]
    pub url: Option<String>,

    /// API token of an administrator
    #[arg(long, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,

    /// Timeout of a single API call in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout: u64,

    /// Skip unknown relation names instead of failing
    #[arg(long)]
    pub lenient: bool,
}

impl From<ConnectionArgs> for ProviderConfig {
    fn from(args: ConnectionArgs) -> Self {
        Self {
            url: args.url.into(),
            token: args.token.into(),
            timeout_seconds: Setting::Known(args.timeout),
            strict_references: Setting::Known(!args.lenient),
        }
    }
}
