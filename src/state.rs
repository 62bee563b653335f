use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::db::Database;
use crate::services::llm_provider::LLMProvider;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db: Database,
    llm: Arc<LLMProvider>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, llm: LLMProvider, config: Config) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db,
            llm: Arc::new(llm),
            config: Arc::new(config),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn llm(&self) -> Arc<LLMProvider> {
        Arc::clone(&self.llm)
    }

    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}
