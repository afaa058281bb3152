use crate::{config::Config, db::Database};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::ViewTable;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub views: Arc<ViewTable>,
    /// Token ids revoked by logout, kept until the token would expire anyway
    pub revoked_tokens: Arc<DashMap<String, DateTime<Utc>>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config,
            views: Arc::new(ViewTable::default()),
            revoked_tokens: Arc::new(DashMap::new()),
        }
    }

    pub fn revoke_token(&self, token_id: String, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        self.revoked_tokens.retain(|_, exp| *exp > now);
        self.revoked_tokens.insert(token_id, expires_at);
    }

    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.revoked_tokens.contains_key(token_id)
    }
}
