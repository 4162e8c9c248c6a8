use crate::{
    audit::AuditEngine,
    config::Config,
    database::SqliteDatabase,
    error::Result,
    llm::{LlmClient, PersonaConfig},
    plan::PlanService,
    services::{ChatService, GoalService, HabitService, ReflectionService, UserService},
    storage::LocalStorage,
    sync::{Session, Stores},
};
use std::sync::Arc;

pub struct AppServices {
    pub stores: Stores,
    pub llm_client: Arc<LlmClient>,
    pub audit_engine: Arc<AuditEngine>,
    pub habits: Arc<HabitService>,
    pub goals: Arc<GoalService>,
    pub plans: Arc<PlanService>,
    pub reflections: Arc<ReflectionService>,
    pub chat: Arc<ChatService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub async fn initialize(config: &Config) -> Result<Self> {
        if let Err(problems) = config.validate() {
            for problem in &problems {
                tracing::warn!("Config problem: {}", problem);
            }
        }

        let local = match &config.storage.local_data_dir {
            Some(dir) => LocalStorage::with_base_dir(dir)?,
            None => LocalStorage::new()?,
        };
        tracing::info!("Local cache at {}", local.data_dir().display());

        let database = match SqliteDatabase::connect(config.storage.database_url.as_deref()).await {
            Ok(db) => {
                tracing::info!("Remote store initialized successfully");
                Some(Arc::new(db))
            }
            Err(e) => {
                tracing::error!("Failed to initialize remote store, running local-only: {}", e);
                None
            }
        };

        Ok(Self::with_stores(
            config,
            Stores::new(Arc::new(local), database),
            LlmClient::from_config(&config.providers),
        ))
    }

    /// Wires every service over the given stores and provider chain.
    pub fn with_stores(config: &Config, stores: Stores, llm_client: LlmClient) -> Self {
        if !llm_client.has_configured_provider() {
            tracing::error!(
                "No AI provider credentials configured (GEMINI_API_KEY / GROQ_API_KEY); audits will use the local fallback"
            );
        }
        let llm_client = Arc::new(llm_client);

        let persona = PersonaConfig::by_name(&config.persona.name);
        tracing::info!(persona = %persona.name, providers = ?llm_client.provider_ids(), "Coach ready");

        let audit_engine = Arc::new(AuditEngine::new(llm_client.clone(), persona.clone()));
        let habits = Arc::new(HabitService::new(stores.clone(), config.limits.free_habit_limit));
        let goals = Arc::new(GoalService::new(stores.clone(), audit_engine.clone()));
        let plans = Arc::new(PlanService::new(stores.clone()));
        let reflections = Arc::new(ReflectionService::new(
            stores.clone(),
            audit_engine.clone(),
            habits.clone(),
            goals.clone(),
        ));
        let chat = Arc::new(ChatService::new(
            stores.clone(),
            llm_client.clone(),
            persona,
            habits.clone(),
            goals.clone(),
        ));
        let users = Arc::new(UserService::new(stores.clone(), config.limits.trial_days));

        Self {
            stores,
            llm_client,
            audit_engine,
            habits,
            goals,
            plans,
            reflections,
            chat,
            users,
        }
    }

    /// The starting session for this process: guest, unless the config
    /// forces guest mode for every later sign-in too.
    pub fn new_session(config: &Config) -> Session {
        Session::from_config(&config.session)
    }
}
