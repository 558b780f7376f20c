//! One module per CLI subcommand, each adding a `cmd_*` method to [`crate::App`].

mod list;
mod run;
