pub mod clients;
pub mod config;
pub mod error;
pub mod mutator;
pub mod orchestrator;
pub mod paginate;
pub mod publish;
pub mod report;
pub mod source;
pub mod workspace;

mod app;
pub mod commands;

// Re-export App and Config from modules
pub use app::App;
pub use config::Config;

#[cfg(test)]
mod test_utils;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
