//! Terminal output for the CLI
//!
//! Interactive terminals get `cliclack` styling and spinners; pipes and CI
//! get plain, greppable lines with `[OK]`/`[WARN]`/`[FAIL]` prefixes.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_success, remark, step_info, step_ok, step_ok_detail, step_warn,
    step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
