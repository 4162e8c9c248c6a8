pub mod daily_logs;
pub mod daily_plans;
pub mod goals;
pub mod habits;
pub mod messages;
pub mod stats;
pub mod users;
