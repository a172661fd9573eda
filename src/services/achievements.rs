use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use color_eyre::Result;
use serde::{Serialize, Serializer};

use crate::db::{Db, GameRow};
use crate::models::{Difficulty, GameMode};

// ---------------------------------------------------------------------------
// Achievement kinds
// ---------------------------------------------------------------------------

/// Every badge the game can award, keyed by its catalog criteria tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AchievementKind {
    FirstGame,
    CompleteEasy,
    CompleteMedium,
    CompleteHard,
    ReachScore20,
    ReachScore50,
    ReachScore100,
    ReachScore200,
    PerfectGame,
    Streak10,
    Streak25,
    EndlessTurns25,
    EndlessTurns50,
    MultiplayerWin,
    GamesPlayed10,
    GamesPlayed50,
    DailyGames1,
    DailyGames7,
    DailyGames30,
    DailyStreak3,
    DailyStreak7,
    DailyStreak30,
    AllDifficulties,
    Donation,
    OverAchiever,
}

use AchievementKind::*;

const SCORE_TIERS: [(i64, AchievementKind); 4] = [
    (20, ReachScore20),
    (50, ReachScore50),
    (100, ReachScore100),
    (200, ReachScore200),
];
const STREAK_TIERS: [(i64, AchievementKind); 2] = [(10, Streak10), (25, Streak25)];
const ENDLESS_TIERS: [(i64, AchievementKind); 2] = [(25, EndlessTurns25), (50, EndlessTurns50)];
const GAMES_PLAYED_TIERS: [(i64, AchievementKind); 2] = [(10, GamesPlayed10), (50, GamesPlayed50)];
const DAILY_GAMES_TIERS: [(i64, AchievementKind); 3] =
    [(1, DailyGames1), (7, DailyGames7), (30, DailyGames30)];
const DAILY_STREAK_TIERS: [(i64, AchievementKind); 3] =
    [(3, DailyStreak3), (7, DailyStreak7), (30, DailyStreak30)];

impl AchievementKind {
    pub const ALL: [AchievementKind; 25] = [
        FirstGame,
        CompleteEasy,
        CompleteMedium,
        CompleteHard,
        ReachScore20,
        ReachScore50,
        ReachScore100,
        ReachScore200,
        PerfectGame,
        Streak10,
        Streak25,
        EndlessTurns25,
        EndlessTurns50,
        MultiplayerWin,
        GamesPlayed10,
        GamesPlayed50,
        DailyGames1,
        DailyGames7,
        DailyGames30,
        DailyStreak3,
        DailyStreak7,
        DailyStreak30,
        AllDifficulties,
        Donation,
        OverAchiever,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            FirstGame => "first_game",
            CompleteEasy => "complete_easy",
            CompleteMedium => "complete_medium",
            CompleteHard => "complete_hard",
            ReachScore20 => "reach_score_20",
            ReachScore50 => "reach_score_50",
            ReachScore100 => "reach_score_100",
            ReachScore200 => "reach_score_200",
            PerfectGame => "perfect_game",
            Streak10 => "streak_10",
            Streak25 => "streak_25",
            EndlessTurns25 => "endless_turns_25",
            EndlessTurns50 => "endless_turns_50",
            MultiplayerWin => "multiplayer_win",
            GamesPlayed10 => "games_played_10",
            GamesPlayed50 => "games_played_50",
            DailyGames1 => "daily_games_1",
            DailyGames7 => "daily_games_7",
            DailyGames30 => "daily_games_30",
            DailyStreak3 => "daily_streak_3",
            DailyStreak7 => "daily_streak_7",
            DailyStreak30 => "daily_streak_30",
            AllDifficulties => "all_difficulties",
            Donation => "donation",
            OverAchiever => "over_achiever",
        }
    }

    pub fn from_tag(tag: &str) -> Option<AchievementKind> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn for_completion(difficulty: Difficulty) -> AchievementKind {
        match difficulty {
            Difficulty::Easy => CompleteEasy,
            Difficulty::Medium => CompleteMedium,
            Difficulty::Hard => CompleteHard,
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for AchievementKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

/// Every tier whose threshold `value` has reached.
fn reached(tiers: &[(i64, AchievementKind)], value: i64) -> impl Iterator<Item = AchievementKind> + '_ {
    tiers
        .iter()
        .filter(move |(threshold, _)| value >= *threshold)
        .map(|(_, kind)| *kind)
}

// ---------------------------------------------------------------------------
// AchievementRepository trait
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait AchievementRepository: Send + Sync {
    fn grant_achievement(
        &self,
        user_id: i64,
        criteria: &str,
        at: NaiveDateTime,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn held_criteria(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    fn catalog_criteria(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    fn game_by_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<GameRow>>> + Send;

    fn latest_completed_game(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<GameRow>>> + Send;

    fn completed_games_count(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<i64>> + Send;

    fn completed_difficulties(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Difficulty>>> + Send;
}

impl AchievementRepository for Db {
    fn grant_achievement(
        &self,
        user_id: i64,
        criteria: &str,
        at: NaiveDateTime,
    ) -> impl std::future::Future<Output = Result<bool>> + Send {
        Db::grant_achievement(self, user_id, criteria, at)
    }

    fn held_criteria(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send {
        Db::held_criteria(self, user_id)
    }

    fn catalog_criteria(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send {
        Db::catalog_criteria(self)
    }

    fn game_by_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<GameRow>>> + Send {
        Db::game_by_session(self, session_id)
    }

    fn latest_completed_game(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Option<GameRow>>> + Send {
        Db::latest_completed_game(self, user_id)
    }

    fn completed_games_count(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<i64>> + Send {
        Db::completed_games_count(self, user_id)
    }

    fn completed_difficulties(
        &self,
        user_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<Difficulty>>> + Send {
        Db::completed_difficulties(self, user_id)
    }
}

// ---------------------------------------------------------------------------
// AchievementService
// ---------------------------------------------------------------------------

/// Where to look for the finished game when judging a perfect run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfectLookup<'a> {
    pub snapshot: Option<&'a GameRow>,
    pub session_id: Option<&'a str>,
}

pub struct AchievementService<R: AchievementRepository = Db> {
    repo: R,
}

impl<R: AchievementRepository + Clone> Clone for AchievementService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<R: AchievementRepository> AchievementService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Grants `kind` unless the user already holds it and returns what was newly
    /// unlocked. Unlocking the last missing badge also unlocks Over Achiever.
    pub async fn award_if_unearned(
        &self,
        user_id: i64,
        kind: AchievementKind,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        let mut unlocked = Vec::new();
        if !self.repo.grant_achievement(user_id, kind.tag(), at).await? {
            return Ok(unlocked);
        }
        unlocked.push(kind);
        if kind != OverAchiever && self.check_over_achiever(user_id, at).await? {
            unlocked.push(OverAchiever);
        }
        Ok(unlocked)
    }

    /// Same as [`Self::award_if_unearned`] for a raw criteria tag; unknown tags grant nothing.
    pub async fn award_tag(
        &self,
        user_id: i64,
        tag: &str,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        match AchievementKind::from_tag(tag) {
            Some(kind) => self.award_if_unearned(user_id, kind, at).await,
            None => {
                tracing::warn!("ignoring unknown achievement tag '{tag}'");
                Ok(Vec::new())
            }
        }
    }

    async fn award_all(
        &self,
        user_id: i64,
        kinds: impl IntoIterator<Item = AchievementKind>,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        let mut unlocked = Vec::new();
        for kind in kinds {
            unlocked.extend(self.award_if_unearned(user_id, kind, at).await?);
        }
        Ok(unlocked)
    }

    /// Score, streak and endless-distance badges after one scored turn.
    pub async fn on_turn(
        &self,
        user_id: i64,
        game: &GameRow,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        let mut kinds: Vec<AchievementKind> = reached(&SCORE_TIERS, game.score).collect();
        kinds.extend(reached(&STREAK_TIERS, game.best_streak));
        if game.game_mode == GameMode::Endless {
            let turns_played = game.current_turn - 1;
            kinds.extend(reached(&ENDLESS_TIERS, turns_played));
        }
        self.award_all(user_id, kinds, at).await
    }

    pub async fn on_game_completed(
        &self,
        user_id: i64,
        game: &GameRow,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        let mut kinds = vec![FirstGame];

        let victory = game.lives > 0;
        if victory && game.game_mode == GameMode::Single {
            if let Some(difficulty) = game.difficulty {
                kinds.push(AchievementKind::for_completion(difficulty));
            }
        }

        let lookup = PerfectLookup {
            snapshot: Some(game),
            session_id: Some(&game.session_id),
        };
        if self.is_perfect(user_id, lookup).await? {
            kinds.push(PerfectGame);
        }

        let played = self.repo.completed_games_count(user_id).await?;
        kinds.extend(reached(&GAMES_PLAYED_TIERS, played));

        let mut unlocked = self.award_all(user_id, kinds, at).await?;
        unlocked.extend(self.check_all_difficulties(user_id, at).await?);
        Ok(unlocked)
    }

    pub async fn on_multiplayer_win(
        &self,
        user_id: i64,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        self.award_all(user_id, [MultiplayerWin], at).await
    }

    pub async fn on_daily_completed(
        &self,
        user_id: i64,
        games_completed: i64,
        streak: i64,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        let kinds = reached(&DAILY_GAMES_TIERS, games_completed)
            .chain(reached(&DAILY_STREAK_TIERS, streak))
            .collect::<Vec<_>>();
        let mut unlocked = self.award_all(user_id, kinds, at).await?;
        unlocked.extend(self.check_all_difficulties(user_id, at).await?);
        Ok(unlocked)
    }

    pub async fn on_donation(&self, user_id: i64, at: NaiveDateTime) -> Result<Vec<AchievementKind>> {
        self.award_all(user_id, [Donation], at).await
    }

    /// Secret reward for finishing every single-player difficulty at least once.
    pub async fn check_all_difficulties(
        &self,
        user_id: i64,
        at: NaiveDateTime,
    ) -> Result<Vec<AchievementKind>> {
        let done = self.repo.completed_difficulties(user_id).await?;
        if Difficulty::ALL.iter().all(|d| done.contains(d)) {
            return self.award_all(user_id, [AllDifficulties], at).await;
        }
        Ok(Vec::new())
    }

    /// A finished game where no life was lost. Uses the snapshot when given, then the
    /// session's stored row, then the user's latest completed game.
    pub async fn is_perfect(&self, user_id: i64, lookup: PerfectLookup<'_>) -> Result<bool> {
        if let Some(game) = lookup.snapshot {
            return Ok(perfect(game));
        }

        if let Some(session_id) = lookup.session_id {
            if let Some(game) = self.repo.game_by_session(session_id).await? {
                return Ok(perfect(&game));
            }
        }

        match self.repo.latest_completed_game(user_id).await? {
            Some(game) => Ok(perfect(&game)),
            None => Ok(false),
        }
    }

    /// True when this call granted Over Achiever.
    async fn check_over_achiever(&self, user_id: i64, at: NaiveDateTime) -> Result<bool> {
        let held: HashSet<String> = self.repo.held_criteria(user_id).await?.into_iter().collect();
        let catalog = self.repo.catalog_criteria().await?;

        let complete = catalog
            .iter()
            .filter(|criteria| criteria.as_str() != OverAchiever.tag())
            .all(|criteria| held.contains(criteria));

        if complete && !catalog.is_empty() {
            return self
                .repo
                .grant_achievement(user_id, OverAchiever.tag(), at)
                .await;
        }
        Ok(false)
    }
}

fn perfect(game: &GameRow) -> bool {
    game.completed && game.total_turns > 0 && game.lives == game.starting_lives
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
