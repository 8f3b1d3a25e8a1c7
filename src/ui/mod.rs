//! Terminal output for CLI commands
//!
//! Styled output and spinners in interactive terminals, plain prefixed
//! lines in CI and when output is piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, key_value_status, section, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
