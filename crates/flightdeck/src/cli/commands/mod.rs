//! CLI commands

mod completions;
mod devices;
mod run;
mod share;

pub use completions::CompletionsCommand;
pub use devices::DevicesCommand;
pub use run::RunCommand;
pub use share::ShareCommand;
