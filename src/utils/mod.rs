pub mod canonical;
pub mod error;
pub mod logger;
pub mod monitor;
pub mod validation;
