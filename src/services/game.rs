use chrono::NaiveDateTime;
use rand::Rng;
use serde::Serialize;
use ulid::Ulid;

use crate::context::RequestContext;
use crate::db::{GameRow, Image, NewGame};
use crate::error::{GameError, GameResult};
use crate::models::{Choice, Difficulty, GameMode, TierFilter};
use crate::names;
use crate::services::achievements::AchievementKind;
use crate::services::daily::DailyCompletion;
use crate::services::score::{Expected, Verification};
use crate::AppState;

// ---------------------------------------------------------------------------
// Records returned to controllers
// ---------------------------------------------------------------------------

/// An image as the player sees it. Never says which kind it is.
#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub id: i64,
    pub filename: String,
}

impl From<&Image> for ImageView {
    fn from(image: &Image) -> Self {
        ImageView {
            id: image.id,
            filename: image.filename.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Round {
    pub turn: i64,
    pub left: ImageView,
    pub right: ImageView,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    pub session_id: String,
    pub game_mode: GameMode,
    pub difficulty: Option<Difficulty>,
    pub total_turns: i64,
    pub current_turn: i64,
    pub lives: i64,
    pub starting_lives: i64,
    pub score: i64,
    pub streak: i64,
    pub best_streak: i64,
    pub correct_answers: i64,
    pub completed: bool,
    pub victory: bool,
    pub game_over: bool,
    pub round: Option<Round>,
    /// Pending bonus pick; answered before the round above.
    pub bonus: Option<Vec<ImageView>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub score: i64,
    pub lives: i64,
    pub streak: i64,
    pub next_turn: i64,
    pub completed: bool,
    pub game_over: bool,
    pub victory: bool,
    pub bonus_available: bool,
    pub score_token: Option<String>,
    pub new_achievements: Vec<AchievementKind>,
    pub daily: Option<DailyCompletion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BonusOutcome {
    pub is_correct: bool,
    pub lives: i64,
    pub score: i64,
    pub life_gained: bool,
    pub points_lost: i64,
}

// ---------------------------------------------------------------------------
// Pure transitions
// ---------------------------------------------------------------------------

/// 1 below a streak of 5, 2 from 5, 4 from 10 and so on.
pub fn streak_multiplier(streak: i64) -> i64 {
    let doublings = (streak / names::STREAK_STEP).clamp(0, names::MAX_STREAK_DOUBLINGS);
    1 << doublings
}

pub fn points_for(base_points: i64, streak_before: i64) -> i64 {
    base_points * streak_multiplier(streak_before)
}

/// Applies one answered turn to the row and recomputes completion.
pub fn apply_answer(game: &mut GameRow, correct: bool, base_points: i64) {
    if correct {
        game.score += points_for(base_points, game.current_streak);
        game.current_streak += 1;
        game.correct_answers += 1;
        game.best_streak = game.best_streak.max(game.current_streak);
    } else {
        game.lives = (game.lives - 1).max(0);
        game.current_streak = 0;
    }

    game.current_turn += 1;
    game.completed =
        game.lives == 0 || (game.total_turns > 0 && game.current_turn > game.total_turns);
}

pub fn is_victory(game: &GameRow) -> bool {
    game.completed && game.lives > 0
}

/// Whether the turn about to be shown opens with a bonus pick.
pub fn bonus_due(game: &GameRow) -> bool {
    !game.completed
        && game.current_turn % names::BONUS_ROUND_EVERY == 0
        && game.difficulty != Some(Difficulty::Hard)
        && game.lives < game.starting_lives
        && game.bonus_turn != game.current_turn
}

/// Image tier a turn draws from. Endless and daily games get harder as they go.
pub fn tier_for(game: &GameRow) -> TierFilter {
    let turn = game.current_turn;
    match game.game_mode {
        GameMode::Single => TierFilter::for_difficulty(game.difficulty),
        GameMode::Endless => TierFilter::UpTo(if turn <= names::ENDLESS_EASY_UNTIL {
            Difficulty::Easy
        } else if turn <= names::ENDLESS_MEDIUM_UNTIL {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        }),
        GameMode::Daily => TierFilter::UpTo(if turn <= names::DAILY_EASY_UNTIL {
            Difficulty::Easy
        } else if turn <= names::DAILY_MEDIUM_UNTIL {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        }),
    }
}

fn half_rounded_up(score: i64) -> i64 {
    (score.max(0) + 1) / 2
}

fn timestamp(at: NaiveDateTime) -> i64 {
    at.and_utc().timestamp()
}

// ---------------------------------------------------------------------------
// GameService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GameService {
    state: AppState,
}

impl GameService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn create_game(
        &self,
        ctx: &mut RequestContext,
        mode: GameMode,
        difficulty: Option<Difficulty>,
        time_penalty: bool,
    ) -> GameResult<GameState> {
        if mode == GameMode::Daily {
            return Err(GameError::Invalid(
                "daily games are started from the daily challenge".to_string(),
            ));
        }
        self.open_game(ctx, mode, difficulty, time_penalty).await
    }

    /// Creates the row for any mode and shows its first pair.
    pub(crate) async fn open_game(
        &self,
        ctx: &mut RequestContext,
        mode: GameMode,
        difficulty: Option<Difficulty>,
        time_penalty: bool,
    ) -> GameResult<GameState> {
        let (difficulty, total_turns, lives) = match mode {
            GameMode::Single => {
                let difficulty = difficulty.ok_or_else(|| {
                    GameError::Invalid("single player games need a difficulty".to_string())
                })?;
                let preset = difficulty.preset();
                (Some(difficulty), preset.turns, preset.lives)
            }
            GameMode::Endless => (None, 0, names::ENDLESS_LIVES),
            GameMode::Daily => (None, names::DAILY_TURNS, names::DAILY_LIVES),
        };

        let session_id = Ulid::new().to_string();
        let username = ctx.username().map(str::to_string);
        let new_game = NewGame {
            session_id: &session_id,
            game_mode: mode,
            difficulty,
            total_turns,
            lives,
            time_penalty,
            user_id: ctx.user_id(),
            username: username.as_deref(),
            created_at: ctx.now,
        };

        let mut game = self.state.db.insert_game(&new_game).await?;
        self.present_pair(ctx, &mut game).await?;
        self.save(ctx, &mut game).await?;

        self.state_of(&game).await
    }

    pub async fn submit_answer(
        &self,
        ctx: &mut RequestContext,
        session_id: &str,
        choice: Choice,
    ) -> GameResult<AnswerOutcome> {
        let mut game = self.load_active(session_id).await?;

        if choice == Choice::Timeout && !game.time_penalty {
            return Err(GameError::Invalid(
                "timeouts only count in games with a time penalty".to_string(),
            ));
        }

        if game.bonus_images.is_some() {
            tracing::debug!("bonus round skipped in game {session_id}");
            clear_bonus(&mut game);
        }

        self.resolve_pair(ctx, &mut game).await?;

        let is_correct = match choice {
            Choice::Left => game.left_is_real,
            Choice::Right => !game.left_is_real,
            Choice::Timeout => false,
        };

        apply_answer(&mut game, is_correct, self.state.config.base_points);

        if !game.completed {
            self.present_pair(ctx, &mut game).await?;
            if bonus_due(&game) {
                self.offer_bonus(ctx, &mut game).await?;
            }
        }

        self.save(ctx, &mut game).await?;

        tracing::debug!(
            "game {session_id}: correct={is_correct} score={} lives={} turn={}",
            game.score,
            game.lives,
            game.current_turn
        );

        let mut score_token = None;
        let mut daily = None;
        if game.completed {
            score_token = Some(self.finish(ctx, &game).await);
            if game.game_mode == GameMode::Daily {
                daily = self.complete_daily(ctx, &game).await;
            }
        }

        let mut new_achievements = self.evaluate_achievements(ctx, &game).await;
        if let Some(daily) = &daily {
            new_achievements.extend(daily.new_achievements.iter().copied());
        }

        Ok(AnswerOutcome {
            is_correct,
            score: game.score,
            lives: game.lives,
            streak: game.current_streak,
            next_turn: game.current_turn,
            completed: game.completed,
            game_over: game.completed && game.lives == 0,
            victory: is_victory(&game),
            bonus_available: game.bonus_images.is_some(),
            score_token,
            new_achievements,
            daily,
        })
    }

    pub async fn submit_bonus(
        &self,
        ctx: &mut RequestContext,
        session_id: &str,
        image_id: i64,
    ) -> GameResult<BonusOutcome> {
        let mut game = self.load_active(session_id).await?;

        let Some(offered) = game.bonus_images.as_ref() else {
            return Err(GameError::Invalid("no bonus round is pending".to_string()));
        };
        if !offered.contains(image_id) {
            return Err(GameError::Invalid(format!(
                "image {image_id} is not part of this bonus round"
            )));
        }

        let is_correct = game.bonus_real_image == Some(image_id);
        let mut life_gained = false;
        let mut points_lost = 0;
        if is_correct {
            life_gained = game.lives < game.starting_lives;
            game.lives = (game.lives + 1).min(game.starting_lives);
        } else {
            points_lost = half_rounded_up(game.score);
            game.score -= points_lost;
        }
        clear_bonus(&mut game);

        self.save(ctx, &mut game).await?;

        tracing::info!(
            "bonus round in game {session_id}: correct={is_correct} lives={} score={}",
            game.lives,
            game.score
        );

        Ok(BonusOutcome {
            is_correct,
            lives: game.lives,
            score: game.score,
            life_gained,
            points_lost,
        })
    }

    pub async fn get_game_state(&self, session_id: &str) -> GameResult<GameState> {
        let game = self
            .state
            .db
            .game_by_session(session_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("game {session_id}")))?;
        self.state_of(&game).await
    }

    /// Retention: deletes games last updated before `older_than`.
    pub async fn cleanup_games(&self, older_than: NaiveDateTime) -> GameResult<u64> {
        Ok(self.state.db.delete_games_before(older_than).await?)
    }

    /// Checks a submitted score token against the request clock.
    pub async fn verify_score(
        &self,
        ctx: &RequestContext,
        token: &str,
        expected: Expected,
    ) -> GameResult<Verification> {
        let verification = self.state.signer.verify_at(
            token,
            expected,
            timestamp(ctx.now),
            self.state.config.score_token_max_age,
        );
        match &verification.reason {
            None => Ok(verification),
            Some(reason) => Err(GameError::IntegrityFailure(reason.to_string())),
        }
    }

    async fn load_active(&self, session_id: &str) -> GameResult<GameRow> {
        let game = self
            .state
            .db
            .game_by_session(session_id)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("game {session_id}")))?;
        if game.completed {
            return Err(GameError::AlreadyCompleted(session_id.to_string()));
        }
        Ok(game)
    }

    async fn save(&self, ctx: &RequestContext, game: &mut GameRow) -> GameResult<()> {
        if !self.state.db.save_game(game, ctx.now).await? {
            return Err(GameError::Conflict(format!("game {}", game.session_id)));
        }
        Ok(())
    }

    /// Picks the pair for the current turn and which side the real image goes on.
    async fn present_pair(&self, ctx: &mut RequestContext, game: &mut GameRow) -> GameResult<()> {
        let pair = if game.game_mode == GameMode::Daily {
            self.state.daily().pick_daily_pair(&mut ctx.rng, game).await?
        } else {
            let filter = tier_for(game);
            self.state
                .images()
                .pick_pair(&mut ctx.rng, filter, &mut game.shown_images)
                .await?
        };

        let pair = pair.ok_or_else(|| GameError::NotFound("images for the next round".to_string()))?;
        game.current_real_image = Some(pair.real.id);
        game.current_ai_image = Some(pair.ai.id);
        game.left_is_real = ctx.rng.gen_bool(0.5);
        Ok(())
    }

    async fn offer_bonus(&self, ctx: &mut RequestContext, game: &mut GameRow) -> GameResult<()> {
        let filter = tier_for(game);
        let bonus = self
            .state
            .images()
            .pick_bonus(&mut ctx.rng, filter, &mut game.shown_images)
            .await?;

        match bonus {
            Some(bonus) => {
                game.bonus_images = Some(bonus.ids());
                game.bonus_real_image = Some(bonus.real_id);
                tracing::debug!("bonus round offered in game {}", game.session_id);
            }
            None => tracing::warn!("not enough images for a bonus round in game {}", game.session_id),
        }
        Ok(())
    }

    /// Regenerates the displayed pair when it is missing, duplicated or points at
    /// deleted images.
    async fn resolve_pair(&self, ctx: &mut RequestContext, game: &mut GameRow) -> GameResult<()> {
        let usable = match (game.current_real_image, game.current_ai_image) {
            (Some(real), Some(ai)) if real != ai => {
                self.state.db.image(real).await?.is_some()
                    && self.state.db.image(ai).await?.is_some()
            }
            _ => false,
        };

        if !usable {
            tracing::warn!(
                "game {} had no usable pair on turn {}, picking a new one",
                game.session_id,
                game.current_turn
            );
            self.present_pair(ctx, game).await?;
        }
        Ok(())
    }

    /// Leaderboard entry and signed score for a finished game. The game is
    /// already saved as completed, so a leaderboard failure is only logged.
    async fn finish(&self, ctx: &RequestContext, game: &GameRow) -> String {
        let username = game
            .username
            .as_deref()
            .or_else(|| ctx.username());
        match username {
            Some(username) => {
                let recorded = self
                    .state
                    .db
                    .record_score(
                        game.user_id,
                        username,
                        game.score,
                        game.game_mode,
                        game.difficulty,
                        ctx.now,
                    )
                    .await;
                if let Err(e) = recorded {
                    tracing::error!(
                        "failed to record leaderboard entry for game {}: {e}",
                        game.session_id
                    );
                }
            }
            None => tracing::debug!("guest game {} finished, no leaderboard entry", game.session_id),
        }

        tracing::info!(
            "game {} completed: mode={} score={} victory={}",
            game.session_id,
            game.game_mode,
            game.score,
            is_victory(game)
        );

        self.state
            .signer
            .sign(game.score, game.user_id, Some(timestamp(ctx.now)))
    }

    async fn complete_daily(
        &self,
        ctx: &mut RequestContext,
        game: &GameRow,
    ) -> Option<DailyCompletion> {
        let username = game.username.as_deref()?;
        match self
            .state
            .daily()
            .complete(ctx, username, is_victory(game))
            .await
        {
            Ok(completion) => Some(completion),
            Err(e) => {
                tracing::error!("failed to record daily challenge for {username}: {e}");
                None
            }
        }
    }

    /// Badges are a side effect: a failure here never fails the already saved turn.
    async fn evaluate_achievements(
        &self,
        ctx: &RequestContext,
        game: &GameRow,
    ) -> Vec<AchievementKind> {
        let Some(user_id) = game.user_id else {
            return Vec::new();
        };
        let achievements = self.state.achievements();

        let mut unlocked = match achievements.on_turn(user_id, game, ctx.now).await {
            Ok(kinds) => kinds,
            Err(e) => {
                tracing::error!("achievement check failed for user {user_id}: {e}");
                Vec::new()
            }
        };

        if game.completed {
            match achievements.on_game_completed(user_id, game, ctx.now).await {
                Ok(kinds) => unlocked.extend(kinds),
                Err(e) => tracing::error!("completion achievements failed for user {user_id}: {e}"),
            }
        }
        unlocked
    }

    async fn state_of(&self, game: &GameRow) -> GameResult<GameState> {
        let mut round = None;
        if !game.completed {
            if let (Some(real_id), Some(ai_id)) = (game.current_real_image, game.current_ai_image) {
                let real = self.state.db.image(real_id).await?;
                let ai = self.state.db.image(ai_id).await?;
                if let (Some(real), Some(ai)) = (real, ai) {
                    let (left, right) = if game.left_is_real { (real, ai) } else { (ai, real) };
                    round = Some(Round {
                        turn: game.current_turn,
                        left: ImageView::from(&left),
                        right: ImageView::from(&right),
                    });
                }
            }
        }

        let mut bonus = None;
        if let Some(ids) = &game.bonus_images {
            let mut views = Vec::with_capacity(ids.len());
            for id in ids.ids() {
                if let Some(image) = self.state.db.image(*id).await? {
                    views.push(ImageView::from(&image));
                }
            }
            bonus = Some(views);
        }

        Ok(GameState {
            session_id: game.session_id.clone(),
            game_mode: game.game_mode,
            difficulty: game.difficulty,
            total_turns: game.total_turns,
            current_turn: game.current_turn,
            lives: game.lives,
            starting_lives: game.starting_lives,
            score: game.score,
            streak: game.current_streak,
            best_streak: game.best_streak,
            correct_answers: game.correct_answers,
            completed: game.completed,
            victory: is_victory(game),
            game_over: game.completed && game.lives == 0,
            round,
            bonus,
        })
    }
}

fn clear_bonus(game: &mut GameRow) {
    game.bonus_images = None;
    game.bonus_real_image = None;
    game.bonus_turn = game.current_turn;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShownImages;

    fn row(mode: GameMode, difficulty: Option<Difficulty>, turns: i64, lives: i64) -> GameRow {
        let at = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        GameRow {
            id: 1,
            session_id: "s".to_string(),
            game_mode: mode,
            difficulty,
            total_turns: turns,
            current_turn: 1,
            lives,
            starting_lives: lives,
            score: 0,
            current_streak: 0,
            best_streak: 0,
            correct_answers: 0,
            completed: false,
            shown_images: ShownImages::default(),
            current_real_image: Some(1),
            current_ai_image: Some(2),
            left_is_real: true,
            time_penalty: false,
            bonus_turn: 0,
            bonus_images: None,
            bonus_real_image: None,
            user_id: None,
            username: None,
            version: 0,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn multiplier_doubles_every_five() {
        assert_eq!(streak_multiplier(0), 1);
        assert_eq!(streak_multiplier(4), 1);
        assert_eq!(streak_multiplier(5), 2);
        assert_eq!(streak_multiplier(9), 2);
        assert_eq!(streak_multiplier(10), 4);
        assert_eq!(streak_multiplier(1_000), 1 << names::MAX_STREAK_DOUBLINGS);
    }

    #[test]
    fn sixth_correct_answer_scores_double() {
        let mut game = row(GameMode::Single, Some(Difficulty::Medium), 50, 3);
        for _ in 0..5 {
            apply_answer(&mut game, true, 10);
        }
        assert_eq!(game.score, 50);
        apply_answer(&mut game, true, 10);
        assert_eq!(game.score, 70);
        assert_eq!(game.best_streak, 6);
    }

    #[test]
    fn five_wrong_answers_end_an_easy_game() {
        let mut game = row(GameMode::Single, Some(Difficulty::Easy), 20, 5);
        for _ in 0..5 {
            assert!(!game.completed);
            apply_answer(&mut game, false, 10);
            assert!(game.lives >= 0);
        }
        assert!(game.completed);
        assert_eq!(game.lives, 0);
        assert!(!is_victory(&game));
    }

    #[test]
    fn lives_never_go_negative() {
        let mut game = row(GameMode::Endless, None, 0, 1);
        apply_answer(&mut game, false, 10);
        apply_answer(&mut game, false, 10);
        assert_eq!(game.lives, 0);
    }

    #[test]
    fn finite_game_completes_after_last_turn() {
        let mut game = row(GameMode::Single, Some(Difficulty::Easy), 2, 5);
        apply_answer(&mut game, true, 10);
        assert!(!game.completed);
        apply_answer(&mut game, false, 10);
        assert!(game.completed);
        assert!(is_victory(&game));
    }

    #[test]
    fn endless_runs_until_lives_are_gone() {
        let mut game = row(GameMode::Endless, None, 0, 3);
        for _ in 0..200 {
            apply_answer(&mut game, true, 10);
        }
        assert!(!game.completed);
    }

    #[test]
    fn wrong_answer_resets_streak() {
        let mut game = row(GameMode::Single, Some(Difficulty::Easy), 20, 5);
        apply_answer(&mut game, true, 10);
        apply_answer(&mut game, true, 10);
        apply_answer(&mut game, false, 10);
        assert_eq!(game.current_streak, 0);
        assert_eq!(game.best_streak, 2);
        assert_eq!(game.correct_answers, 2);
    }

    #[test]
    fn bonus_needs_lost_life_and_tenth_turn() {
        let mut game = row(GameMode::Single, Some(Difficulty::Easy), 20, 5);
        game.current_turn = 10;
        assert!(!bonus_due(&game));
        game.lives = 4;
        assert!(bonus_due(&game));
        game.bonus_turn = 10;
        assert!(!bonus_due(&game));
        game.bonus_turn = 0;
        game.difficulty = Some(Difficulty::Hard);
        assert!(!bonus_due(&game));
    }

    #[test]
    fn tiers_escalate() {
        let mut game = row(GameMode::Endless, None, 0, 3);
        assert_eq!(tier_for(&game), TierFilter::UpTo(Difficulty::Easy));
        game.current_turn = 11;
        assert_eq!(tier_for(&game), TierFilter::UpTo(Difficulty::Medium));
        game.current_turn = 26;
        assert_eq!(tier_for(&game), TierFilter::UpTo(Difficulty::Hard));

        let mut daily = row(GameMode::Daily, None, 10, 3);
        daily.current_turn = 3;
        assert_eq!(tier_for(&daily), TierFilter::UpTo(Difficulty::Easy));
        daily.current_turn = 4;
        assert_eq!(tier_for(&daily), TierFilter::UpTo(Difficulty::Medium));
        daily.current_turn = 8;
        assert_eq!(tier_for(&daily), TierFilter::UpTo(Difficulty::Hard));
    }

    #[test]
    fn bonus_penalty_rounds_up() {
        assert_eq!(half_rounded_up(0), 0);
        assert_eq!(half_rounded_up(15), 8);
        assert_eq!(half_rounded_up(20), 10);
    }

    #[tokio::test]
    async fn leaderboard_failure_still_returns_token() {
        use crate::assets::AllAssets;
        use crate::config::Config;
        use crate::context::SessionUser;
        use crate::db::Db;
        use crate::models::ImageKind;
        use crate::services::score::ScoreSigner;

        let path = std::env::temp_dir().join(format!(
            "realvsai_unit_finish_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let db = Db::new(format!("file:{}", path.display()), String::new())
            .await
            .unwrap();
        for (filename, kind) in [("real/hard.jpg", ImageKind::Real), ("ai/hard.jpg", ImageKind::Ai)] {
            db.insert_image(filename, kind, Some(Difficulty::Hard), None, None)
                .await
                .unwrap();
        }
        let id = db
            .create_user("ada", "ada@example.com", "password123")
            .await
            .unwrap();
        db.connect()
            .unwrap()
            .execute("DROP TABLE leaderboard", ())
            .await
            .unwrap();

        let config = Config::default();
        let signer = ScoreSigner::new(Some("unit-secret".to_string()), config.score_token_max_age);
        let state = AppState::new(db, config, signer, AllAssets);
        let user = SessionUser {
            id,
            username: "ada".to_string(),
            is_admin: false,
        };
        let at = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut ctx = RequestContext::at(Some(user), at, 1);

        let games = state.games();
        let game = games
            .create_game(&mut ctx, GameMode::Single, Some(Difficulty::Hard), false)
            .await
            .unwrap();
        // Hard starts with a single life.
        let outcome = games
            .submit_answer(&mut ctx, &game.session_id, Choice::Timeout)
            .await
            .unwrap();

        assert!(outcome.completed);
        assert!(outcome.score_token.is_some());
        let stored = games.get_game_state(&game.session_id).await.unwrap();
        assert!(stored.completed);
    }
}
