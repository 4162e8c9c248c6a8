use std::path::PathBuf;

use antigravity_lib::config::Config;
use antigravity_lib::plan::open_slots;
use antigravity_lib::models::{GoalCategory, GoalTerm, NewGoal, NewHabit, SmartFields, UserProfile};
use antigravity_lib::services::{
    poke_for_current_block, rewards, trend_summary, upcoming_rewards, GoalUpdate, ReflectionInput,
    TracingNotifier,
};
use antigravity_lib::sync::Session;
use antigravity_lib::AppServices;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "antigravity")]
#[command(about = "Daily reflections, habits and momentum from the command line")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Act as this signed-in user (see `sign-in`)
    #[arg(short, long, env = "ANTIGRAVITY_USER")]
    user: Option<String>,

    /// Never touch the remote store in this run
    #[arg(long)]
    guest: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit today's reflection and get scored
    Audit {
        reflection: String,
        #[arg(short, long, default_value_t = 3)]
        energy: u8,
        #[arg(short, long, default_value = "Steady")]
        mood: String,
    },
    #[command(subcommand)]
    Habit(HabitCommand),
    #[command(subcommand)]
    Goal(GoalCommand),
    #[command(subcommand)]
    Plan(PlanCommand),
    /// Past daily logs, newest first
    History,
    /// Average score and chart points
    Trends,
    /// Earned and upcoming badges
    Rewards,
    /// Talk to the coach
    Chat { message: Option<String> },
    /// Generate a first-day plan for a new user
    Onboard { role: String, pain: String },
    /// Register or refresh a user profile
    SignIn {
        user_id: String,
        #[arg(long, default_value = "Explorer")]
        name: String,
        #[arg(long, default_value = "")]
        email: String,
    },
    /// Print the effective configuration
    Config {
        /// Write it to this path as TOML
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum HabitCommand {
    Add {
        text: String,
        #[arg(long)]
        target: Option<u32>,
        #[arg(long)]
        unit: Option<String>,
    },
    Toggle { id: String },
    Quantity { id: String, value: u32 },
    Delete { id: String },
    List,
    /// Clear completion flags for a new day
    Reset,
}

#[derive(Subcommand)]
enum GoalCommand {
    Add {
        title: String,
        #[arg(long, default_value = "personal")]
        category: GoalCategory,
        #[arg(long, default_value = "month")]
        term: GoalTerm,
        #[arg(long)]
        target_date: NaiveDate,
        #[arg(long)]
        target_number: Option<f64>,
        #[arg(long)]
        unit: Option<String>,
        /// Ask the coach to review the goal first
        #[arg(long)]
        audit: bool,
    },
    Progress {
        id: String,
        #[arg(long, conflicts_with = "number")]
        percent: Option<u8>,
        #[arg(long)]
        number: Option<f64>,
    },
    Delete { id: String },
    List,
}

#[derive(Subcommand)]
enum PlanCommand {
    Show {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Add {
        title: String,
        start: String,
        #[arg(long, default_value = "deep-work")]
        kind: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Remove {
        id: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Toggle {
        id: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Commit to today's plan
    Lock,
    /// Nudge about the current block
    Poke,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let services = AppServices::initialize(&config).await?;

    let mut session = AppServices::new_session(&config);
    if cli.guest {
        session.force_guest();
    }
    if let Some(user_id) = &cli.user {
        session = signed_in(&services, session, user_id)?;
    }

    let now = Utc::now();
    let today = now.date_naive();

    match cli.command {
        Command::Audit {
            reflection,
            energy,
            mood,
        } => {
            let outcome = services
                .reflections
                .submit(
                    &session,
                    ReflectionInput {
                        reflection,
                        energy,
                        mood,
                    },
                )
                .await?;
            print_json(&outcome)?;
        }
        Command::Habit(command) => match command {
            HabitCommand::Add { text, target, unit } => {
                let habit = NewHabit {
                    text,
                    target_quantity: target,
                    unit,
                };
                print_json(&services.habits.add(&session, habit).await?)?;
            }
            HabitCommand::Toggle { id } => {
                print_json(&services.habits.toggle(&session, &id, today).await?)?;
            }
            HabitCommand::Quantity { id, value } => {
                print_json(&services.habits.update_quantity(&session, &id, value, today).await?)?;
            }
            HabitCommand::Delete { id } => {
                print_json(&services.habits.delete(&session, &id).await?)?;
            }
            HabitCommand::List => {
                print_json(&services.habits.list(&session).await?)?;
            }
            HabitCommand::Reset => {
                let reset = services.habits.reset_for_new_day(&session, today).await?;
                print_json(&serde_json::json!({ "reset": reset, "date": today }))?;
            }
        },
        Command::Goal(command) => match command {
            GoalCommand::Add {
                title,
                category,
                term,
                target_date,
                target_number,
                unit,
                audit,
            } => {
                let goal = NewGoal {
                    title,
                    category,
                    term,
                    target_date,
                    smart: SmartFields::default(),
                    target_number,
                    unit,
                };
                let (goal, review) = services.goals.create(&session, goal, audit).await?;
                print_json(&serde_json::json!({ "goal": goal, "review": review }))?;
            }
            GoalCommand::Progress { id, percent, number } => {
                let update = match (percent, number) {
                    (Some(p), _) => GoalUpdate::Percent(p),
                    (None, Some(n)) => GoalUpdate::Number(n),
                    (None, None) => anyhow::bail!("Pass --percent or --number"),
                };
                print_json(&services.goals.update_progress(&session, &id, update).await?)?;
            }
            GoalCommand::Delete { id } => {
                print_json(&services.goals.delete(&session, &id).await?)?;
            }
            GoalCommand::List => {
                print_json(&services.goals.list(&session).await?)?;
            }
        },
        Command::Plan(command) => match command {
            PlanCommand::Show { date } => {
                let date = date.unwrap_or(today);
                let plan = services.plans.get(&session, date).await?;
                let lock = services.plans.lock_state(&session, date)?;
                print_json(&serde_json::json!({
                    "plan": plan,
                    "lock": lock,
                    "momentum": plan.completion_percentage(),
                    "open_slots": open_slots(&plan),
                }))?;
            }
            PlanCommand::Add {
                title,
                start,
                kind,
                date,
            } => {
                let date = date.unwrap_or(today);
                print_json(&services.plans.add_event(&session, date, &title, &start, &kind).await?)?;
            }
            PlanCommand::Remove { id, date } => {
                let date = date.unwrap_or(today);
                print_json(&services.plans.remove_event(&session, date, &id).await?)?;
            }
            PlanCommand::Toggle { id, date } => {
                let date = date.unwrap_or(today);
                print_json(&services.plans.toggle_event(&session, date, &id).await?)?;
            }
            PlanCommand::Lock => {
                print_json(&services.plans.lock(&session, today).await?)?;
            }
            PlanCommand::Poke => {
                let plan = services.plans.get(&session, today).await?;
                let category = poke_for_current_block(&plan, now, &TracingNotifier);
                print_json(&serde_json::json!({ "poked": category }))?;
            }
        },
        Command::History => {
            print_json(&services.reflections.history(&session).await?)?;
        }
        Command::Trends => {
            let history = services.reflections.history(&session).await?;
            print_json(&trend_summary(&history))?;
        }
        Command::Rewards => {
            let history = services.reflections.history(&session).await?;
            let stats = services.stores.local.load_stats(session.storage_key_owner())?;
            print_json(&serde_json::json!({
                "earned": rewards(stats.as_ref(), &history),
                "upcoming": upcoming_rewards(stats.as_ref(), &history),
            }))?;
        }
        Command::Chat { message } => match message {
            Some(message) => print_json(&services.chat.send(&session, &message).await?)?,
            None => print_json(&services.chat.history(&session).await?)?,
        },
        Command::Onboard { role, pain } => {
            print_json(&services.audit_engine.initial_plan(&role, &pain).await)?;
        }
        Command::SignIn {
            user_id,
            name,
            email,
        } => {
            let profile = UserProfile {
                user_id,
                name,
                email,
                picture: String::new(),
            };
            let user = services.users.sign_in(&mut session, profile).await?;
            print_json(&serde_json::json!({
                "user": user,
                "mode": session.mode(),
                "trial_days_left": user.days_left(now),
            }))?;
        }
        Command::Config { save } => {
            if let Some(path) = save {
                config.save_to_file(&path)?;
                tracing::info!("Configuration saved to {}", path.display());
            }
            print_json(&config.redacted())?;
        }
    }

    Ok(())
}

/// Restores a previously signed-in user from the local cache.
fn signed_in(services: &AppServices, mut session: Session, user_id: &str) -> anyhow::Result<Session> {
    let premium = services
        .stores
        .local
        .load_user(user_id)?
        .map(|user| user.has_premium(Utc::now()))
        .ok_or_else(|| anyhow::anyhow!("Unknown user {}; run `sign-in` first", user_id))?;
    session.sign_in(user_id, premium);
    Ok(session)
}
