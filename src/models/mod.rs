pub mod chat;
pub mod daily_log;
pub mod goal;
pub mod habit;
pub mod plan;
pub mod user;

pub use chat::*;
pub use daily_log::*;
pub use goal::*;
pub use habit::*;
pub use plan::*;
pub use user::*;
