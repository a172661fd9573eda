use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use color_eyre::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::context::RequestContext;
use crate::db::{DailyChallengeRecord, GameRow};
use crate::error::{GameError, GameResult};
use crate::models::{Difficulty, GameMode, ShownImages, TierFilter};
use crate::names;
use crate::services::achievements::AchievementKind;
use crate::services::game::{tier_for, GameState};
use crate::services::images::ImagePair;
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct DailyStatus {
    pub eligible: bool,
    pub next_challenge_date: Option<NaiveDateTime>,
    pub streak: i64,
    pub games_completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCompletion {
    /// Admin replays on an already played day change nothing.
    pub logged_only: bool,
    pub streak: i64,
    pub games_completed: i64,
    pub next_challenge_date: NaiveDateTime,
    pub new_achievements: Vec<AchievementKind>,
    pub avatar: Option<String>,
}

/// Tomorrow at the unlock hour.
pub fn next_unlock(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now.date() + Duration::days(1);
    let unlock = NaiveTime::from_hms_opt(names::DAILY_UNLOCK_HOUR, 0, 0).unwrap_or_default();
    tomorrow.and_time(unlock)
}

pub fn is_eligible(record: Option<&DailyChallengeRecord>, now: NaiveDateTime) -> bool {
    record.map_or(true, |r| r.next_challenge_date <= now)
}

/// Applies one finished challenge to the streak bookkeeping.
pub fn record_play(record: &mut DailyChallengeRecord, today: NaiveDate, success: bool, now: NaiveDateTime) {
    let missed_day = record
        .date_last_challenge
        .is_some_and(|last| last < today - Duration::days(1));
    if missed_day {
        record.streak = 0;
    }

    if success {
        record.streak += 1;
        record.games_completed += 1;
    } else {
        record.streak = 0;
    }

    record.date_last_challenge = Some(today);
    record.next_challenge_date = next_unlock(now);
}

#[derive(Clone)]
pub struct DailyChallengeService {
    state: AppState,
}

impl DailyChallengeService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn status(&self, ctx: &RequestContext, username: &str) -> GameResult<DailyStatus> {
        let record = self.state.db.daily_record(username).await?;
        Ok(DailyStatus {
            eligible: is_eligible(record.as_ref(), ctx.now),
            next_challenge_date: record.as_ref().map(|r| r.next_challenge_date),
            streak: record.as_ref().map_or(0, |r| r.streak),
            games_completed: record.as_ref().map_or(0, |r| r.games_completed),
        })
    }

    /// Starts today's challenge for the logged-in player and uses up the day's
    /// attempt. Admins may replay at any time.
    pub async fn start(&self, ctx: &mut RequestContext) -> GameResult<GameState> {
        let Some(username) = ctx.username().map(str::to_string) else {
            return Err(GameError::Invalid(
                "log in to play the daily challenge".to_string(),
            ));
        };

        let claimed = self
            .state
            .db
            .claim_daily_attempt(&username, ctx.now, next_unlock(ctx.now))
            .await?;
        if !claimed {
            if !ctx.is_admin() {
                let next = self
                    .state
                    .db
                    .daily_record(&username)
                    .await?
                    .map(|r| r.next_challenge_date);
                return Err(GameError::Invalid(format!(
                    "the next daily challenge unlocks at {}",
                    next.map(|n| n.to_string()).unwrap_or_default()
                )));
            }
            tracing::info!("admin {username} is replaying the daily challenge");
        }

        self.state
            .games()
            .open_game(ctx, GameMode::Daily, None, false)
            .await
    }

    pub async fn complete(
        &self,
        ctx: &mut RequestContext,
        username: &str,
        success: bool,
    ) -> GameResult<DailyCompletion> {
        let today = ctx.now.date();
        let mut record = self
            .state
            .db
            .daily_record(username)
            .await?
            .unwrap_or_else(|| DailyChallengeRecord {
                username: username.to_string(),
                date_last_challenge: None,
                next_challenge_date: ctx.now,
                games_completed: 0,
                streak: 0,
            });

        if record.date_last_challenge == Some(today) {
            if !ctx.is_admin() {
                return Err(GameError::Invalid(
                    "today's daily challenge is already scored".to_string(),
                ));
            }
            tracing::info!(
                "admin replay of the daily challenge by {username} (success={success}), not recorded"
            );
            return Ok(DailyCompletion {
                logged_only: true,
                streak: record.streak,
                games_completed: record.games_completed,
                next_challenge_date: record.next_challenge_date,
                new_achievements: Vec::new(),
                avatar: None,
            });
        }

        record_play(&mut record, today, success, ctx.now);
        self.state.db.save_daily_record(&record).await?;

        tracing::info!(
            "daily challenge for {username}: success={success} streak={} completed={}",
            record.streak,
            record.games_completed
        );

        let mut new_achievements = Vec::new();
        let mut avatar = None;
        let user = self.state.db.find_user_by_username(username).await?;
        if let (Some(user), true) = (user, success) {
            new_achievements = self
                .state
                .achievements()
                .on_daily_completed(user.id, record.games_completed, record.streak, ctx.now)
                .await?;
            avatar = self.grant_random_avatar(ctx, user.id).await?;
        }

        Ok(DailyCompletion {
            logged_only: false,
            streak: record.streak,
            games_completed: record.games_completed,
            next_challenge_date: record.next_challenge_date,
            new_achievements,
            avatar,
        })
    }

    pub async fn avatars(&self, user_id: i64) -> GameResult<Vec<String>> {
        Ok(self.state.db.user_avatars(user_id).await?)
    }

    /// A random avatar the user does not own yet, if any remain.
    async fn grant_random_avatar(
        &self,
        ctx: &mut RequestContext,
        user_id: i64,
    ) -> Result<Option<String>> {
        let owned = self.state.db.user_avatars(user_id).await?;
        let remaining: Vec<&str> = names::AVATARS
            .iter()
            .copied()
            .filter(|avatar| !owned.iter().any(|o| o == avatar))
            .collect();

        let Some(avatar) = remaining.choose(&mut ctx.rng).copied() else {
            return Ok(None);
        };
        if self.state.db.grant_avatar(user_id, avatar, ctx.now).await? {
            tracing::info!("user {user_id} unlocked avatar {avatar}");
            return Ok(Some(avatar.to_string()));
        }
        Ok(None)
    }

    /// Pair for a daily turn, avoiding every image the player saw in earlier
    /// challenges. The last turn draws hard images, or falls back to the
    /// turn's usual tier when no hard pair exists.
    pub(crate) async fn pick_daily_pair(
        &self,
        rng: &mut StdRng,
        game: &mut GameRow,
    ) -> Result<Option<ImagePair>> {
        let images = self.state.images();
        let Some(username) = game.username.clone() else {
            return images
                .pick_pair(rng, tier_for(game), &mut game.shown_images)
                .await;
        };

        let mut history = self.state.db.daily_history(&username).await?;
        let mut seen: ShownImages = history
            .seen_real_images
            .ids()
            .iter()
            .chain(history.seen_ai_images.ids())
            .chain(game.shown_images.ids())
            .copied()
            .collect();

        let hard = TierFilter::Exactly(Difficulty::Hard);
        let final_round = game.current_turn >= game.total_turns;
        let filter = if final_round && images.has_tier(hard).await? {
            hard
        } else {
            tier_for(game)
        };
        let pair = images.pick_pair(rng, filter, &mut seen).await?;

        if let Some(pair) = &pair {
            game.shown_images.push(pair.real.id);
            game.shown_images.push(pair.ai.id);
            history.seen_real_images.push(pair.real.id);
            history.seen_ai_images.push(pair.ai.id);
            history.seen_real_images.keep_recent(names::DAILY_HISTORY_WINDOW);
            history.seen_ai_images.keep_recent(names::DAILY_HISTORY_WINDOW);
            self.state.db.save_daily_history(&username, &history).await?;
        }
        Ok(pair)
    }
}
