pub mod app;
pub mod binder;
pub mod cli;
pub mod config;
pub mod dom;
pub mod fetcher;
pub mod navigation;
pub mod notify;
pub mod print;
pub mod render;
pub mod sanitize;
pub mod session;
pub mod token;

#[cfg(test)]
mod tests;
