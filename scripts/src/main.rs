use std::{env, path::PathBuf};

use clap::Parser;
use franklin_scripts::{
    cli::Cli,
    constants::{DEFAULT_ENV_FILE, ENV_FILE_ENV_VAR},
    errors::ScriptError,
    utils::load_env_file,
};
use tracing::{debug, Level};

#[tokio::main]
async fn main() -> Result<(), ScriptError> {
    // Values from the env file fill in the arguments not set in the shell
    let env_file = env::var(ENV_FILE_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ENV_FILE));
    let env_loaded = load_env_file(&env_file)?;

    let Cli { globals, command } = Cli::parse();

    let max_level = if globals.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .pretty()
        .with_max_level(max_level)
        .init();

    if env_loaded {
        debug!("Loaded environment from {}", env_file.display());
    }

    command.run(globals).await
}
