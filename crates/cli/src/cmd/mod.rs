mod fetch;
mod install;
mod resolve;

pub use fetch::cmd_fetch;
pub use install::cmd_install;
pub use resolve::ResolveArgs;
