pub mod app;
pub mod backend;
pub mod command;
pub mod config;
pub mod context;
pub mod job;
pub mod logging;
pub mod runtime;
pub mod session;
pub mod terminal;
pub mod ui;
pub mod util;

#[cfg(test)]
mod test_support;
