//! Tracing setup for the host process.
//!
//! The subscriber is only installed when `ACUMATE_LOG` (or `RUST_LOG`) is set. Output goes to
//! stderr so it never mixes with the JSON the bridge hands back to the editor.
//!
//! ```bash
//! ACUMATE_LOG=acumate_native=debug code .
//! ACUMATE_LOG="acumate_native::metadata_cache=trace" code .
//! ```

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ACUMATE_LOG";

fn build_filter() -> Option<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(value) => Some(EnvFilter::builder().parse_lossy(value)),
        Err(_) if std::env::var("RUST_LOG").is_ok() => Some(EnvFilter::from_default_env()),
        Err(_) => None,
    }
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let Some(filter) = build_filter() else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging();
        tracing::debug!("still alive");
    }
}
