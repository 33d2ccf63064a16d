pub mod app;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod enrich;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod runner;
pub mod sort;
pub mod state;
pub mod utils;

#[cfg(test)]
mod tests;
