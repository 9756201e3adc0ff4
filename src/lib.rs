pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod proto;
pub mod proxy;
pub mod session;
pub mod socks;
pub mod utils;
