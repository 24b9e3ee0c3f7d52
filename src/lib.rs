pub mod error;
pub mod relay_session;
pub mod resolver;
pub mod session_config;
