//! CLI command implementations

pub mod config;
pub mod invalidate;
pub mod pause;
pub mod read;
pub mod run;
pub mod status;

pub use config::execute as config;
pub use invalidate::execute as invalidate;
pub use pause::{pause, resume};
pub use read::execute as read;
pub use run::execute as run;
pub use status::execute as status;
