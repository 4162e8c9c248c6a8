pub mod audit;
pub mod config;
pub mod database;
pub mod error;
pub mod init;
pub mod llm;
pub mod models;
pub mod momentum;
pub mod plan;
pub mod services;
pub mod storage;
pub mod sync;

pub use error::{AppError, Result};
pub use init::AppServices;
