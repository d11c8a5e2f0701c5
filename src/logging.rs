use std::io::IsTerminal;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, filter::LevelFilter};

pub const LOG_ENV_VAR: &str = "JOBTRACK_LOG";

/// Install the stderr subscriber, filtered by `JOBTRACK_LOG` (default `info`).
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .with_env_var(LOG_ENV_VAR)
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .init();
    });
}
