// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use principia_core::config::LoginConfig;
use principia_core::login::LoginUseCase;
use principia_core::storage::{FileBackend, MemoryBackend, StorageBackend};
use serde::Serialize;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Login { email, password } => {
            let use_case = build_use_case(&args);
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            let result = runtime.block_on(use_case.execute(email, password));
            print_json(&result)?;
            if !result.success {
                return Err(Error::LoginFailed(result.error.unwrap_or_default()));
            }
        }
        Commands::Logout => {
            let result = build_use_case(&args).logout();
            print_json(&result)?;
            if !result.success {
                return Err(Error::Custom("logout failed".into()));
            }
        }
        Commands::Refresh => {
            let result = build_use_case(&args).refresh();
            print_json(&result)?;
            if !result.success {
                return Err(Error::Custom(result.error.unwrap_or_default()));
            }
        }
        Commands::Status => {
            let use_case = build_use_case(&args);
            print_json(&use_case.get_auth_state())?;
            let remaining = use_case.sessions().time_remaining();
            if !remaining.is_zero() {
                log::info!("session expires in {}s", remaining.as_secs());
            }
        }
    }

    Ok(())
}

fn build_use_case(args: &Cli) -> LoginUseCase {
    let mut config = LoginConfig::from_env();
    if let Some(path) = &args.store_path {
        config.store_path = path.clone();
    }

    let backend: Arc<dyn StorageBackend> = if args.memory {
        Arc::new(MemoryBackend::new())
    } else {
        log::debug!("session store at {}", config.store_path.display());
        Arc::new(FileBackend::new(config.store_path.clone()))
    };

    LoginUseCase::from_config(&config, backend)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
