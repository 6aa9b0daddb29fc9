//! Process-wide logging collaborator.
//!
//! The core treats logging as an external collaborator with three
//! verbs: `status` (informational), `warn` (continue after logging),
//! and `die` (fatal — logs then terminates the process). These map onto
//! the `log` crate's levels; `init()` installs `env_logger` once at
//! process start the way `fil_logger`/`env_logger` are wired up in
//! `filecoin-project-rust-proofs` and `koverstreet-bcachefs-tools`.

/// Install the global logger. Safe to call more than once; only the
/// first call takes effect.
pub fn init() {
    let _ = env_logger::builder().format_timestamp_millis().try_init();
}

/// Log an informational status line.
#[macro_export]
macro_rules! status {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

/// Log a warning and continue.
#[macro_export]
macro_rules! warning {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

/// Log a fatal diagnostic and terminate the process with a non-zero
/// exit status. Never returns.
#[macro_export]
macro_rules! die {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        std::process::exit(1)
    }};
}

pub use crate::{die, status, warning};
