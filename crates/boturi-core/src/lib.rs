// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub mod config;

pub use config::{ConfigError, GameConfig, RenderCfg, WindowCfg};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

/// Formats an error chain the way `fatal` prints it.
pub fn fatal_message(err: &anyhow::Error) -> String {
    format!("BOTURI ERROR: {err:#}")
}

/// Reports an unrecoverable error and terminates the process.
///
/// Used for environment misconfiguration such as a device without a usable
/// depth format. Nothing is retried.
pub fn fatal(err: &anyhow::Error) -> ! {
    tracing::error!("{err:#}");
    eprintln!("{}", fatal_message(err));
    std::process::exit(1)
}
