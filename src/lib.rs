pub mod api;
pub mod config;
pub mod crypto;
pub mod db;
pub mod storage;

pub use db::DbPool;

use config::Config;

use crate::crypto::TokenService;
use crate::storage::ImageStorage;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenService,
    pub storage: ImageStorage,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let secret = config.jwt_secret_or_generate();
        let tokens = TokenService::new(
            &secret,
            chrono::Duration::days(config.auth.token_ttl_days),
        );
        let storage = ImageStorage::from_config(&config.upload);
        Self {
            config,
            db,
            tokens,
            storage,
        }
    }
}
