use antigravity_lib::audit::AuditSource;
use antigravity_lib::config::Config;
use antigravity_lib::database::SqliteDatabase;
use antigravity_lib::llm::{GenerationRequest, LlmClient, ProviderError, TextProvider};
use antigravity_lib::models::{NewHabit, UserProfile};
use antigravity_lib::services::ReflectionInput;
use antigravity_lib::storage::LocalStorage;
use antigravity_lib::sync::{Session, StorageMode, Stores};
use antigravity_lib::AppServices;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct DownProvider {
    name: &'static str,
    calls: AtomicUsize,
}

impl DownProvider {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextProvider for DownProvider {
    fn id(&self) -> &str {
        self.name
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Http {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    services: AppServices,
    primary: Arc<DownProvider>,
    secondary: Arc<DownProvider>,
}

async fn fixture(with_remote: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let local = Arc::new(LocalStorage::with_base_dir(dir.path()).unwrap());
    let remote = if with_remote {
        Some(Arc::new(SqliteDatabase::in_memory().await.unwrap()))
    } else {
        None
    };

    let primary = DownProvider::new("gemini");
    let secondary = DownProvider::new("groq");
    let providers: Vec<Arc<dyn TextProvider>> = vec![
        primary.clone() as Arc<dyn TextProvider>,
        secondary.clone() as Arc<dyn TextProvider>,
    ];
    let llm = LlmClient::new(providers, Duration::from_millis(250));

    let config = Config::from_lookup(|_| None);
    let services = AppServices::with_stores(&config, Stores::new(local, remote), llm);
    Fixture {
        _dir: dir,
        services,
        primary,
        secondary,
    }
}

fn reflection(text: &str, energy: u8) -> ReflectionInput {
    ReflectionInput {
        reflection: text.to_string(),
        energy,
        mood: "Steady".to_string(),
    }
}

fn evening(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, day, 21, 0, 0).unwrap()
}

#[tokio::test]
async fn test_outage_still_scores_and_keeps_one_log_per_day() {
    let f = fixture(false).await;
    let session = Session::guest();

    for text in ["Read", "Run", "Write"] {
        f.services
            .habits
            .add(
                &session,
                NewHabit {
                    text: text.to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    let habits = f.services.habits.list(&session).await.unwrap();
    for habit in habits.iter().take(2) {
        f.services
            .habits
            .toggle(&session, &habit.id, evening(1).date_naive())
            .await
            .unwrap();
    }

    let first = f
        .services
        .reflections
        .submit_at(&session, reflection("Finished the draft", 3), evening(1))
        .await
        .unwrap();
    assert_eq!(first.audit_source, AuditSource::Fallback);
    assert_eq!(first.entry.productivity_score, 80);
    assert!(first.entry.did_today_count);
    assert!(!first.entry.report.is_empty());
    assert_eq!(first.stats.streak, 1);
    assert_eq!(f.primary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.secondary.calls.load(Ordering::SeqCst), 1);

    let again = f
        .services
        .reflections
        .submit_at(&session, reflection("Also cleaned the inbox", 3), evening(1))
        .await
        .unwrap();
    assert_eq!(again.stats.streak, 1);

    let history = f.services.reflections.history(&session).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].reflection, "Also cleaned the inbox");

    let next = f
        .services
        .reflections
        .submit_at(&session, reflection("Kept going", 3), evening(2))
        .await
        .unwrap();
    assert_eq!(next.stats.streak, 2);
    assert_eq!(next.stats.score, 80);
}

#[tokio::test]
async fn test_low_day_resets_streak() {
    let f = fixture(false).await;
    let session = Session::guest();

    f.services
        .reflections
        .submit_at(&session, reflection("Good", 5), evening(1))
        .await
        .unwrap();
    let low = f
        .services
        .reflections
        .submit_at(&session, reflection("Rough", 1), evening(2))
        .await
        .unwrap();

    // 40 + 10 with no habits done: not counted.
    assert_eq!(low.entry.productivity_score, 50);
    assert!(!low.entry.did_today_count);
    assert_eq!(low.stats.streak, 0);
    assert_eq!(low.stats.score, 66);
}

#[tokio::test]
async fn test_offline_days_merge_after_going_online() {
    let f = fixture(true).await;
    let profile = UserProfile {
        user_id: "u1".to_string(),
        name: "Sam".to_string(),
        email: "sam@example.com".to_string(),
        picture: String::new(),
    };

    let mut offline = Session::guest();
    offline.force_guest();
    f.services.users.sign_in(&mut offline, profile.clone()).await.unwrap();
    assert_eq!(offline.mode(), StorageMode::Guest);
    f.services
        .reflections
        .submit_at(&offline, reflection("Written while offline", 4), evening(1))
        .await
        .unwrap();

    let mut online = Session::guest();
    f.services.users.sign_in(&mut online, profile).await.unwrap();
    let outcome = f
        .services
        .reflections
        .submit_at(&online, reflection("Back online", 4), evening(2))
        .await
        .unwrap();
    assert_eq!(outcome.storage, StorageMode::AuthenticatedOnline);

    let history = f.services.reflections.history(&online).await.unwrap();
    let days: Vec<u32> = history
        .iter()
        .map(|e| chrono::Datelike::day(&e.date))
        .collect();
    assert_eq!(days, vec![2, 1]);

    let remote_only = f.services.stores.remote.as_ref().unwrap();
    assert_eq!(remote_only.list_daily_logs("u1").await.unwrap().len(), 1);
}
