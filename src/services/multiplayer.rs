use chrono::NaiveDateTime;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use ulid::Ulid;

use crate::context::RequestContext;
use crate::db::{MultiplayerGameRow, NewMultiplayerGame, PlayerRow};
use crate::error::{GameError, GameResult};
use crate::models::{Choice, MultiplayerStatus, TierFilter};
use crate::names;
use crate::services::bots;
use crate::services::game::{ImageView, Round};
use crate::AppState;

const ROOM_CODE_ATTEMPTS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub slot: i64,
    pub player_name: String,
    pub score: i64,
    pub is_bot: bool,
    pub answered: bool,
    pub bonus_claimed: bool,
}

impl From<&PlayerRow> for PlayerView {
    fn from(player: &PlayerRow) -> Self {
        PlayerView {
            slot: player.slot,
            player_name: player.player_name.clone(),
            score: player.score,
            is_bot: player.is_bot,
            answered: player.answered,
            bonus_claimed: player.bonus_claimed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiplayerState {
    pub game_code: String,
    pub room_code: String,
    pub is_public: bool,
    pub status: MultiplayerStatus,
    pub total_turns: i64,
    pub current_turn: i64,
    pub wait_timeout: NaiveDateTime,
    pub has_bots: bool,
    pub players: Vec<PlayerView>,
    pub round: Option<Round>,
    /// Slots sharing the top score once the game is over.
    pub winners: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Seat {
    pub game_code: String,
    pub room_code: String,
    pub slot: i64,
    pub status: MultiplayerStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct Backfill {
    pub game_code: String,
    pub bots: Vec<String>,
}

impl Backfill {
    pub fn added_any(&self) -> bool {
        !self.bots.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BotTurn {
    pub slot: i64,
    pub is_correct: bool,
    pub response_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub is_correct: bool,
    pub score: i64,
    pub bots: Vec<BotTurn>,
    pub turn_advanced: bool,
    pub current_turn: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChestOutcome {
    pub chest: i64,
    pub bonus: i64,
    pub total: i64,
    /// Every chest's value, revealed after the pick.
    pub chests: Vec<i64>,
}

/// Slots holding the highest score.
pub fn winners(players: &[PlayerRow]) -> Vec<i64> {
    let Some(top) = players.iter().map(|p| p.score).max() else {
        return Vec::new();
    };
    players
        .iter()
        .filter(|p| p.score == top)
        .map(|p| p.slot)
        .collect()
}

fn free_slots(players: &[PlayerRow]) -> Vec<i64> {
    (1..=names::MAX_PLAYERS)
        .filter(|slot| !players.iter().any(|p| p.slot == *slot))
        .collect()
}

/// Why bots may not join, if anything blocks them.
fn backfill_blocker(game: &MultiplayerGameRow, players: &[PlayerRow], now: NaiveDateTime) -> Option<&'static str> {
    if game.started_at.is_some() {
        Some("already started")
    } else if game.status.is_started() {
        Some("already in progress")
    } else if game.current_turn > 1 {
        Some("past the first turn")
    } else if game.has_bots {
        Some("already has bots")
    } else if now < game.wait_timeout {
        Some("still waiting for players")
    } else if !players.iter().any(|p| !p.is_bot) {
        Some("no human player")
    } else if (players.len() as i64) >= names::MIN_PLAYERS {
        Some("enough players")
    } else {
        None
    }
}

fn clean_name(player_name: &str) -> GameResult<String> {
    let name = player_name.trim();
    if name.is_empty() {
        return Err(GameError::Invalid("player name is required".to_string()));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct MultiplayerService {
    state: AppState,
}

impl MultiplayerService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn create_game(
        &self,
        ctx: &mut RequestContext,
        player_name: &str,
        is_public: bool,
    ) -> GameResult<Seat> {
        let player_name = clean_name(player_name)?;
        let total_turns = self
            .state
            .db
            .setting_i64(names::MULTIPLAYER_TURNS_SETTING, self.state.config.multiplayer_turns)
            .await?
            .max(1);

        let mut room_code = None;
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let candidate = bots::room_code(&mut ctx.rng);
            if !self.state.db.room_code_exists(&candidate).await? {
                room_code = Some(candidate);
                break;
            }
        }
        let room_code = room_code
            .ok_or_else(|| GameError::Conflict("room code space is exhausted".to_string()))?;

        let game_code = Ulid::new().to_string();
        let game = self
            .state
            .db
            .insert_multiplayer_game(&NewMultiplayerGame {
                game_code: &game_code,
                room_code: &room_code,
                is_public,
                total_turns,
                wait_timeout: ctx.now + self.state.config.bot_wait,
                host_user_id: ctx.user_id(),
                host_name: &player_name,
                created_at: ctx.now,
            })
            .await?;

        Ok(Seat {
            game_code: game.game_code,
            room_code: game.room_code,
            slot: names::HOST_SLOT,
            status: game.status,
        })
    }

    pub async fn join_game(
        &self,
        ctx: &mut RequestContext,
        room_code: &str,
        player_name: &str,
    ) -> GameResult<Seat> {
        let player_name = clean_name(player_name)?;
        let game = match bots::normalize_room_code(room_code) {
            Some(code) => self.state.db.multiplayer_by_room(&code).await?,
            None => None,
        }
        .ok_or_else(|| GameError::NotFound(format!("room {room_code}")))?;

        self.seat(ctx, game, &player_name).await
    }

    /// Joins the oldest open public lobby, or opens a new public one.
    pub async fn quick_match(&self, ctx: &mut RequestContext, player_name: &str) -> GameResult<Seat> {
        let player_name = clean_name(player_name)?;

        for game in self.state.db.open_public_games().await? {
            let code = game.game_code.clone();
            match self.seat(ctx, game, &player_name).await {
                Ok(seat) => return Ok(seat),
                Err(GameError::Invalid(reason) | GameError::Conflict(reason)) => {
                    tracing::debug!("quick match skipped {code}: {reason}");
                }
                Err(e) => return Err(e),
            }
        }

        self.create_game(ctx, &player_name, true).await
    }

    async fn seat(
        &self,
        ctx: &mut RequestContext,
        mut game: MultiplayerGameRow,
        player_name: &str,
    ) -> GameResult<Seat> {
        if game.status.is_started() || game.started_at.is_some() {
            return Err(GameError::Invalid(format!(
                "game {} has already started",
                game.room_code
            )));
        }

        let players = self.state.db.players(game.id).await?;
        let Some(slot) = free_slots(&players).first().copied() else {
            return Err(GameError::Invalid(format!("game {} is full", game.room_code)));
        };

        if !self
            .state
            .db
            .add_player(game.id, slot, ctx.user_id(), player_name)
            .await?
        {
            return Err(GameError::Conflict(format!(
                "slot {slot} of game {}",
                game.room_code
            )));
        }

        if game.status == MultiplayerStatus::Waiting && (players.len() as i64) + 1 >= names::MIN_PLAYERS {
            game.status = MultiplayerStatus::Ready;
            self.save(&mut game).await?;
            tracing::info!("game {} is ready to start", game.game_code);
        }

        Ok(Seat {
            game_code: game.game_code,
            room_code: game.room_code,
            slot,
            status: game.status,
        })
    }

    /// Host-only start of a ready lobby. The host is whoever holds the first
    /// slot; a lobby opened by an account also requires that account.
    pub async fn start_game(
        &self,
        ctx: &mut RequestContext,
        game_code: &str,
        slot: i64,
    ) -> GameResult<MultiplayerState> {
        let mut game = self.load(game_code).await?;

        let account_matches = game.host_user_id.is_none() || game.host_user_id == ctx.user_id();
        if slot != names::HOST_SLOT || !account_matches {
            return Err(GameError::Invalid("only the host can start the game".to_string()));
        }
        if game.status != MultiplayerStatus::Ready {
            return Err(GameError::Invalid(format!(
                "game {game_code} is {} and cannot be started",
                game.status.as_str()
            )));
        }

        game.status = MultiplayerStatus::InProgress;
        game.started_at = Some(ctx.now);
        self.present_pair(ctx, &mut game).await?;
        self.save(&mut game).await?;

        tracing::info!("game {game_code} started by its host");
        self.get_state(game_code).await
    }

    /// Fills a lonely lobby with bots once its wait timeout passed. A no-op otherwise.
    pub async fn backfill_bots(&self, ctx: &mut RequestContext, game_code: &str) -> GameResult<Backfill> {
        let mut game = self.load(game_code).await?;
        let players = self.state.db.players(game.id).await?;
        let none = Backfill {
            game_code: game_code.to_string(),
            bots: Vec::new(),
        };

        if let Some(reason) = backfill_blocker(&game, &players, ctx.now) {
            tracing::debug!("no bots for game {game_code}: {reason}");
            return Ok(none);
        }

        let curated = self.state.db.bot_usernames().await?;
        let mut taken: Vec<String> = players.iter().map(|p| p.player_name.clone()).collect();
        let mut bots_to_add = Vec::new();
        for slot in free_slots(&players) {
            let name = bots::bot_name(&mut ctx.rng, &curated, &taken);
            taken.push(name.clone());
            bots_to_add.push((slot, name));
        }

        if !self.state.db.fill_with_bots(&mut game, &bots_to_add, ctx.now).await? {
            tracing::debug!("game {game_code} changed before bots could join");
            return Ok(none);
        }

        self.present_pair(ctx, &mut game).await?;
        self.save(&mut game).await?;

        Ok(Backfill {
            game_code: game_code.to_string(),
            bots: bots_to_add.into_iter().map(|(_, name)| name).collect(),
        })
    }

    /// Runs [`Self::backfill_bots`] over every waiting lobby past its timeout.
    pub async fn backfill_expired(&self, ctx: &mut RequestContext) -> GameResult<Vec<Backfill>> {
        let mut filled = Vec::new();
        for game in self.state.db.waiting_games_past_timeout(ctx.now).await? {
            let backfill = self.backfill_bots(ctx, &game.game_code).await?;
            if backfill.added_any() {
                filled.push(backfill);
            }
        }
        tracing::info!("bot backfill sweep filled {} games", filled.len());
        Ok(filled)
    }

    pub async fn submit_answer(
        &self,
        ctx: &mut RequestContext,
        game_code: &str,
        slot: i64,
        choice: Choice,
    ) -> GameResult<TurnOutcome> {
        let mut game = self.load(game_code).await?;
        match game.status {
            MultiplayerStatus::InProgress => {}
            MultiplayerStatus::Completed => {
                return Err(GameError::AlreadyCompleted(game_code.to_string()))
            }
            _ => return Err(GameError::Invalid(format!("game {game_code} has not started"))),
        }

        let players = self.state.db.players(game.id).await?;
        let player = players
            .iter()
            .find(|p| p.slot == slot)
            .ok_or_else(|| GameError::NotFound(format!("slot {slot} in game {game_code}")))?;
        if player.is_bot {
            return Err(GameError::Invalid("bots answer on their own".to_string()));
        }
        if player.answered {
            return Err(GameError::Invalid(format!(
                "slot {slot} already answered turn {}",
                game.current_turn
            )));
        }

        if game.current_real_image.is_none() || game.current_ai_image.is_none() {
            tracing::warn!("game {game_code} had no pair on turn {}", game.current_turn);
            self.present_pair(ctx, &mut game).await?;
            self.save(&mut game).await?;
        }

        let is_correct = match choice {
            Choice::Left => game.left_is_real,
            Choice::Right => !game.left_is_real,
            Choice::Timeout => false,
        };
        let points = if is_correct { names::MULTIPLAYER_POINTS } else { 0 };
        if !self
            .state
            .db
            .record_player_answer(game.id, slot, points, None)
            .await?
        {
            return Err(GameError::Invalid(format!("slot {slot} already answered")));
        }

        let mut bot_turns = Vec::new();
        for bot in players.iter().filter(|p| p.is_bot && !p.answered) {
            let answer = bots::simulate_answer(&mut ctx.rng);
            let points = if answer.correct { names::MULTIPLAYER_POINTS } else { 0 };
            if self
                .state
                .db
                .record_player_answer(game.id, bot.slot, points, Some(answer.response_ms))
                .await?
            {
                bot_turns.push(BotTurn {
                    slot: bot.slot,
                    is_correct: answer.correct,
                    response_ms: answer.response_ms,
                });
            }
        }

        let players = self.state.db.players(game.id).await?;
        let score = players
            .iter()
            .find(|p| p.slot == slot)
            .map_or(0, |p| p.score);

        let mut turn_advanced = false;
        if players.iter().all(|p| p.answered) {
            turn_advanced = self.advance(ctx, &mut game, &players).await?;
        }

        Ok(TurnOutcome {
            is_correct,
            score,
            bots: bot_turns,
            turn_advanced,
            current_turn: game.current_turn,
            completed: game.status == MultiplayerStatus::Completed,
        })
    }

    /// Moves everyone to the next turn, or ends the game after the last one.
    /// `false` when another request advanced it first.
    async fn advance(
        &self,
        ctx: &mut RequestContext,
        game: &mut MultiplayerGameRow,
        players: &[PlayerRow],
    ) -> GameResult<bool> {
        game.current_turn += 1;
        let completed = game.current_turn > game.total_turns;
        if completed {
            game.status = MultiplayerStatus::Completed;
            game.current_real_image = None;
            game.current_ai_image = None;
        } else {
            self.present_pair(ctx, game).await?;
        }

        if !self.state.db.save_multiplayer_game(game).await? {
            tracing::debug!("turn of game {} was advanced by another request", game.game_code);
            return Ok(false);
        }

        if completed {
            tracing::info!("multiplayer game {} completed", game.game_code);
            self.reward_winners(ctx, players).await;
        } else {
            self.state.db.reset_answers(game.id).await?;
        }
        Ok(true)
    }

    async fn reward_winners(&self, ctx: &RequestContext, players: &[PlayerRow]) {
        let top = winners(players);
        let achievements = self.state.achievements();
        for player in players.iter().filter(|p| !p.is_bot && top.contains(&p.slot)) {
            let Some(user_id) = player.user_id else {
                continue;
            };
            if let Err(e) = achievements.on_multiplayer_win(user_id, ctx.now).await {
                tracing::error!("failed to award multiplayer win to user {user_id}: {e}");
            }
        }
    }

    /// Post-game mini-game: each finishing player opens one of four chests once.
    pub async fn open_bonus_chest(
        &self,
        ctx: &mut RequestContext,
        game_code: &str,
        slot: i64,
        chest: i64,
    ) -> GameResult<ChestOutcome> {
        let game = self.load(game_code).await?;
        if game.status != MultiplayerStatus::Completed {
            return Err(GameError::Invalid(
                "bonus chests open once the game is over".to_string(),
            ));
        }

        let chest_count = names::BONUS_CHEST_VALUES.len() as i64;
        if !(1..=chest_count).contains(&chest) {
            return Err(GameError::Invalid(format!("chest must be between 1 and {chest_count}")));
        }

        let players = self.state.db.players(game.id).await?;
        let player = players
            .iter()
            .find(|p| p.slot == slot && !p.is_bot)
            .ok_or_else(|| GameError::NotFound(format!("player in slot {slot}")))?;

        let mut layout = names::BONUS_CHEST_VALUES.to_vec();
        layout.shuffle(&mut ctx.rng);
        let chests = self.state.db.bonus_chests(game.id, slot, &layout).await?;
        if chests.chosen_chest.is_some() {
            return Err(GameError::Invalid(format!("slot {slot} already opened a chest")));
        }

        let bonus = chests
            .chest_values
            .get((chest - 1) as usize)
            .copied()
            .ok_or_else(|| GameError::NotFound(format!("chest {chest}")))?;

        if !self
            .state
            .db
            .claim_bonus_chest(game.id, slot, chest, bonus)
            .await?
        {
            return Err(GameError::Invalid(format!("slot {slot} already opened a chest")));
        }

        Ok(ChestOutcome {
            chest,
            bonus,
            total: player.score + bonus,
            chests: chests.chest_values,
        })
    }

    pub async fn get_state(&self, game_code: &str) -> GameResult<MultiplayerState> {
        let game = self.load(game_code).await?;
        let players = self.state.db.players(game.id).await?;

        let mut round = None;
        if game.status == MultiplayerStatus::InProgress {
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

        let winners = if game.status == MultiplayerStatus::Completed {
            winners(&players)
        } else {
            Vec::new()
        };

        Ok(MultiplayerState {
            game_code: game.game_code,
            room_code: game.room_code,
            is_public: game.is_public,
            status: game.status,
            total_turns: game.total_turns,
            current_turn: game.current_turn,
            wait_timeout: game.wait_timeout,
            has_bots: game.has_bots,
            players: players.iter().map(PlayerView::from).collect(),
            round,
            winners,
        })
    }

    async fn load(&self, game_code: &str) -> GameResult<MultiplayerGameRow> {
        self.state
            .db
            .multiplayer_by_code(game_code)
            .await?
            .ok_or_else(|| GameError::NotFound(format!("multiplayer game {game_code}")))
    }

    async fn save(&self, game: &mut MultiplayerGameRow) -> GameResult<()> {
        if !self.state.db.save_multiplayer_game(game).await? {
            return Err(GameError::Conflict(format!("multiplayer game {}", game.game_code)));
        }
        Ok(())
    }

    async fn present_pair(&self, ctx: &mut RequestContext, game: &mut MultiplayerGameRow) -> GameResult<()> {
        let pair = self
            .state
            .images()
            .pick_pair(&mut ctx.rng, TierFilter::Any, &mut game.shown_images)
            .await?
            .ok_or_else(|| GameError::NotFound("images for the next round".to_string()))?;
        game.current_real_image = Some(pair.real.id);
        game.current_ai_image = Some(pair.ai.id);
        game.left_is_real = ctx.rng.gen_bool(0.5);
        Ok(())
    }
}
