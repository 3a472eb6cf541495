//! Client for a machine-learning challenge platform: paginated lists, live-refreshing
//! leaderboards and worker logs, and the session and error handling around them.

pub mod error;
pub mod models;
pub mod screens;
pub mod services;
