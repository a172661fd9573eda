pub mod assets;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod models;
pub mod names;
pub mod services;

use std::sync::Arc;

use assets::AssetCheck;
use config::Config;
use services::score::ScoreSigner;

pub use context::{RequestContext, SessionUser};
pub use error::{ActionResult, GameError, GameResult};

/// Everything the services share for the lifetime of the process.
#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub config: Arc<Config>,
    pub signer: Arc<ScoreSigner>,
    pub assets: Arc<dyn AssetCheck>,
}

impl AppState {
    pub fn new(
        db: db::Db,
        config: Config,
        signer: ScoreSigner,
        assets: impl AssetCheck + 'static,
    ) -> Self {
        AppState {
            db,
            config: Arc::new(config),
            signer: Arc::new(signer),
            assets: Arc::new(assets),
        }
    }

    pub fn images(&self) -> services::images::ImageSelector {
        services::images::ImageSelector::new(self.db.clone(), self.assets.clone())
    }

    pub fn achievements(&self) -> services::achievements::AchievementService {
        services::achievements::AchievementService::new(self.db.clone())
    }

    pub fn games(&self) -> services::game::GameService {
        services::game::GameService::new(self.clone())
    }

    pub fn multiplayer(&self) -> services::multiplayer::MultiplayerService {
        services::multiplayer::MultiplayerService::new(self.clone())
    }

    pub fn daily(&self) -> services::daily::DailyChallengeService {
        services::daily::DailyChallengeService::new(self.clone())
    }

    pub fn accounts(&self) -> services::accounts::AccountService {
        services::accounts::AccountService::new(self.db.clone())
    }
}
