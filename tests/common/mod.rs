#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use realvsai::assets::AllAssets;
use realvsai::config::Config;
use realvsai::context::SessionUser;
use realvsai::db::Db;
use realvsai::models::{Difficulty, ImageKind};
use realvsai::services::score::ScoreSigner;
use realvsai::{AppState, RequestContext};

pub async fn create_test_db() -> Db {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("realvsai_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover file from previous runs
    let _ = std::fs::remove_file(&path);
    let url = format!("file:{}", path.display());
    Db::new(url, String::new())
        .await
        .expect("failed to create test database")
}

/// `per_tier` real and AI images for every difficulty.
pub async fn seed_images(db: &Db, per_tier: usize) {
    for difficulty in Difficulty::ALL {
        for i in 0..per_tier {
            for kind in [ImageKind::Real, ImageKind::Ai] {
                let filename = format!("{}{}_{i}.jpg", kind.bucket(), difficulty.as_str());
                db.insert_image(&filename, kind, Some(difficulty), None, None)
                    .await
                    .unwrap();
            }
        }
    }
}

pub async fn create_test_state() -> AppState {
    let db = create_test_db().await;
    seed_images(&db, 6).await;
    create_state_with(db)
}

/// App state over an already prepared database.
pub fn create_state_with(db: Db) -> AppState {
    let config = Config::default();
    let signer = ScoreSigner::new(
        Some("integration-secret".to_string()),
        config.score_token_max_age,
    );
    AppState::new(db, config, signer, AllAssets)
}

pub fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub async fn create_player(state: &AppState, username: &str) -> SessionUser {
    let id = state
        .db
        .create_user(username, &format!("{username}@example.com"), "password123")
        .await
        .unwrap();
    SessionUser {
        id,
        username: username.to_string(),
        is_admin: false,
    }
}

pub fn ctx_for(user: Option<&SessionUser>, now: NaiveDateTime, seed: u64) -> RequestContext {
    RequestContext::at(user.cloned(), now, seed)
}
