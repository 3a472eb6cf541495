pub mod config_loader;
pub mod dialogs;
pub mod error_policy;
pub mod gateway;
pub mod pagination;
pub mod poller;
pub mod projection;
pub mod session;
