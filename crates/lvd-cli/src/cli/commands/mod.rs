//! CLI command handlers, one file per command.

mod clear_cache;
mod control;
mod courses;
mod download;
mod login;
mod materials;
mod terms;

pub use super::control_socket::ControlVerb;
pub use clear_cache::run_clear_cache;
pub use control::run_control;
pub use courses::run_courses;
pub use download::run_download;
pub use login::run_login;
pub use materials::run_materials;
pub use terms::run_terms;
