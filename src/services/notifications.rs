use crate::models::DailyPlan;
use chrono::{DateTime, Timelike, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const NOTIFICATION_TITLE: &str = "Fetch says...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationCategory {
    DeepWork,
    Slacking,
    Reminder,
    Abandonment,
}

impl NotificationCategory {
    pub fn messages(&self) -> &'static [&'static str] {
        match self {
            NotificationCategory::DeepWork => &[
                "Time for Deep Work. No excuses, just output.",
                "Your deep work block starts now. Lock in.",
                "The world is noisy. Go silent for a bit.",
            ],
            NotificationCategory::Slacking => &[
                "I smell procrastination. Get back to it.",
                "Your score is dropping. Do something about it.",
                "Excuses don't build empires. Action does.",
            ],
            NotificationCategory::Reminder => &[
                "Did you do what you said you'd do?",
                "Checking in. Are we winning today?",
                "Don't let the day win. You win the day.",
            ],
            NotificationCategory::Abandonment => &[
                "Where are you going? The work isn't done.",
                "Leaving already? Average people quit when it gets hard.",
                "I'm still watching. Your distraction just cost you points.",
                "Oh, look. Someone found something shinier than their future.",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Context, when given, replaces the canned message.
pub fn compose<R: Rng + ?Sized>(
    category: NotificationCategory,
    context: Option<&str>,
    rng: &mut R,
) -> Notification {
    let body = match context {
        Some(context) => context.to_string(),
        None => category
            .messages()
            .choose(rng)
            .copied()
            .unwrap_or_default()
            .to_string(),
    };
    Notification {
        title: NOTIFICATION_TITLE.to_string(),
        body,
    }
}

/// Delivery is someone else's problem; pokes are fire-and-forget.
pub trait Notifier: Send + Sync {
    fn poke(&self, category: NotificationCategory, context: Option<String>);
}

/// Writes pokes to the log. Used by the command-line driver.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn poke(&self, category: NotificationCategory, context: Option<String>) {
        let notification = compose(category, context.as_deref(), &mut rand::thread_rng());
        tracing::info!(
            category = ?category,
            title = %notification.title,
            "{}",
            notification.body
        );
    }
}

/// Pokes about the block scheduled for the current hour, if any. Returns
/// the category used.
pub fn poke_for_current_block(
    plan: &DailyPlan,
    now: DateTime<Utc>,
    notifier: &dyn Notifier,
) -> Option<NotificationCategory> {
    let block = plan.event_at_hour(now.hour())?;
    let category = if block.is_deep_work() {
        NotificationCategory::DeepWork
    } else {
        NotificationCategory::Reminder
    };
    notifier.poke(category, Some(format!("Block: {}", block.title)));
    Some(category)
}
