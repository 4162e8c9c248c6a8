pub mod analytics;
pub mod chat;
pub mod goals;
pub mod habits;
pub mod notifications;
pub mod reflection;
pub mod users;

pub use analytics::{
    rewards, trend_summary, upcoming_rewards, Badge, BadgeKind, TrendPoint, TrendSummary, UpcomingBadge,
};
pub use chat::ChatService;
pub use goals::{GoalService, GoalUpdate};
pub use habits::HabitService;
pub use notifications::{poke_for_current_block, NotificationCategory, Notifier, TracingNotifier};
pub use reflection::{ReflectionInput, ReflectionOutcome, ReflectionService};
pub use users::UserService;
