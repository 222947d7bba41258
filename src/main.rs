mod cli;
mod commands;
mod config;
mod provider;
mod resource;
mod server;
mod ui;

use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity; stderr only, stdout is the protocol
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    log::trace!("Verbosity {}", ctx.verbose);

    match cli.command {
        Command::Serve => {
            let provider = provider::Provider::new(env!("CARGO_PKG_VERSION"));
            server::Server::new(provider)
                .serve(io::BufReader::new(io::stdin()), io::stdout().lock())
                .context("Provider server failed")
        }
        Command::Check(connection) => commands::check::run(&ctx, connection),
        Command::Schema => commands::schema::run(&ctx),
        Command::Import {
            type_name,
            id,
            show_sensitive,
            connection,
        } => commands::import::run(&ctx, &type_name, &id, show_sensitive, connection),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "terraform-provider-opencti", &mut io::stdout());
            Ok(())
        }
    }
}
