//! Terminal output
//!
//! Uses `cliclack` framing and `indicatif` spinners on a terminal, and plain
//! prefixed lines in CI or when output is piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    entry_line, format_idle, intro, key_value, outro, remark, step_error_detail, step_info,
    step_ok, step_warn_hint, usage_table,
};
pub use progress::{StatusLine, TaskSpinner};
