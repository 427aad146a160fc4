pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod http;
pub mod normalize;
pub mod output;
pub mod poll;
pub mod providers;
pub mod report;
pub mod server;
