mod common;

use chrono::Duration;
use realvsai::models::{Choice, Difficulty, GameMode};
use realvsai::services::game::GameState;
use realvsai::services::score::Expected;
use realvsai::GameError;

use common::{create_player, create_test_state, ctx_for, noon};

fn real_side(state: &GameState) -> Choice {
    let round = state.round.as_ref().expect("game should show a pair");
    if round.left.filename.starts_with("real/") {
        Choice::Left
    } else {
        Choice::Right
    }
}

fn wrong_side(state: &GameState) -> Choice {
    match real_side(state) {
        Choice::Left => Choice::Right,
        _ => Choice::Left,
    }
}

#[tokio::test]
async fn test_new_game_shows_distinct_pair() {
    let state = create_test_state().await;
    let mut ctx = ctx_for(None, noon(2024, 3, 1), 1);

    let game = state
        .games()
        .create_game(&mut ctx, GameMode::Single, Some(Difficulty::Easy), false)
        .await
        .unwrap();

    assert_eq!(game.total_turns, 20);
    assert_eq!(game.lives, 5);
    assert_eq!(game.current_turn, 1);
    let round = game.round.unwrap();
    assert_ne!(round.left.id, round.right.id);
    let reals = [&round.left, &round.right]
        .iter()
        .filter(|v| v.filename.starts_with("real/"))
        .count();
    assert_eq!(reals, 1);
}

#[tokio::test]
async fn test_single_game_needs_difficulty() {
    let state = create_test_state().await;
    let mut ctx = ctx_for(None, noon(2024, 3, 1), 1);

    let err = state
        .games()
        .create_game(&mut ctx, GameMode::Single, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Invalid(_)));

    let err = state
        .games()
        .create_game(&mut ctx, GameMode::Daily, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Invalid(_)));
}

#[tokio::test]
async fn test_correct_answers_score_and_streak() {
    let state = create_test_state().await;
    let games = state.games();
    let mut ctx = ctx_for(None, noon(2024, 3, 1), 7);

    let mut game = games
        .create_game(&mut ctx, GameMode::Single, Some(Difficulty::Easy), false)
        .await
        .unwrap();

    for _ in 0..6 {
        let outcome = games
            .submit_answer(&mut ctx, &game.session_id, real_side(&game))
            .await
            .unwrap();
        assert!(outcome.is_correct);
        game = games.get_game_state(&game.session_id).await.unwrap();
    }

    // Five answers at 10 points, the sixth doubled by the streak.
    assert_eq!(game.score, 70);
    assert_eq!(game.streak, 6);
    assert_eq!(game.best_streak, 6);
    assert_eq!(game.lives, 5);
    assert_eq!(game.current_turn, 7);

    let outcome = games
        .submit_answer(&mut ctx, &game.session_id, wrong_side(&game))
        .await
        .unwrap();
    assert!(!outcome.is_correct);
    assert_eq!(outcome.streak, 0);
    assert_eq!(outcome.lives, 4);
    assert_eq!(outcome.score, 70);
}

#[tokio::test]
async fn test_five_wrong_answers_end_easy_game() {
    let state = create_test_state().await;
    let games = state.games();
    let mut ctx = ctx_for(None, noon(2024, 3, 1), 3);

    let mut game = games
        .create_game(&mut ctx, GameMode::Single, Some(Difficulty::Easy), false)
        .await
        .unwrap();

    let mut last = None;
    for _ in 0..5 {
        let outcome = games
            .submit_answer(&mut ctx, &game.session_id, wrong_side(&game))
            .await
            .unwrap();
        if !outcome.completed {
            game = games.get_game_state(&game.session_id).await.unwrap();
        }
        last = Some(outcome);
    }

    let last = last.unwrap();
    assert!(last.completed);
    assert!(last.game_over);
    assert!(!last.victory);
    assert_eq!(last.lives, 0);
    assert!(last.score_token.is_some());

    let err = games
        .submit_answer(&mut ctx, &game.session_id, Choice::Left)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::AlreadyCompleted(_)));

    let finished = games.get_game_state(&game.session_id).await.unwrap();
    assert!(finished.completed);
    assert!(finished.round.is_none());
}

#[tokio::test]
async fn test_timeout_requires_time_penalty() {
    let state = create_test_state().await;
    let games = state.games();
    let mut ctx = ctx_for(None, noon(2024, 3, 1), 5);

    let relaxed = games
        .create_game(&mut ctx, GameMode::Endless, None, false)
        .await
        .unwrap();
    let err = games
        .submit_answer(&mut ctx, &relaxed.session_id, Choice::Timeout)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Invalid(_)));

    let timed = games
        .create_game(&mut ctx, GameMode::Endless, None, true)
        .await
        .unwrap();
    let outcome = games
        .submit_answer(&mut ctx, &timed.session_id, Choice::Timeout)
        .await
        .unwrap();
    assert!(!outcome.is_correct);
    assert_eq!(outcome.lives, 2);
}

#[tokio::test]
async fn test_unknown_game_is_not_found() {
    let state = create_test_state().await;
    let err = state.games().get_game_state("missing").await.unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)));
}

#[tokio::test]
async fn test_bonus_round_restores_life() {
    let state = create_test_state().await;
    let games = state.games();
    let mut ctx = ctx_for(None, noon(2024, 3, 1), 11);

    let mut game = games
        .create_game(&mut ctx, GameMode::Single, Some(Difficulty::Easy), false)
        .await
        .unwrap();

    // One miss, then right answers until turn 10 comes up.
    let outcome = games
        .submit_answer(&mut ctx, &game.session_id, wrong_side(&game))
        .await
        .unwrap();
    assert!(!outcome.bonus_available);
    game = games.get_game_state(&game.session_id).await.unwrap();
    for _ in 0..8 {
        let outcome = games
            .submit_answer(&mut ctx, &game.session_id, real_side(&game))
            .await
            .unwrap();
        game = games.get_game_state(&game.session_id).await.unwrap();
        if game.current_turn == 10 {
            assert!(outcome.bonus_available);
        }
    }
    assert_eq!(game.current_turn, 10);
    assert_eq!(game.lives, 4);

    let bonus = game.bonus.clone().expect("bonus round should be offered");
    assert_eq!(bonus.len(), 4);
    let real = bonus
        .iter()
        .find(|v| v.filename.starts_with("real/"))
        .unwrap();

    let outcome = games
        .submit_bonus(&mut ctx, &game.session_id, real.id)
        .await
        .unwrap();
    assert!(outcome.is_correct);
    assert!(outcome.life_gained);
    assert_eq!(outcome.lives, 5);

    let err = games
        .submit_bonus(&mut ctx, &game.session_id, real.id)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::Invalid(_)));
}

#[tokio::test]
async fn test_wrong_bonus_pick_halves_score() {
    let state = create_test_state().await;
    let games = state.games();
    let mut ctx = ctx_for(None, noon(2024, 3, 1), 13);

    let mut game = games
        .create_game(&mut ctx, GameMode::Single, Some(Difficulty::Easy), false)
        .await
        .unwrap();
    games
        .submit_answer(&mut ctx, &game.session_id, wrong_side(&game))
        .await
        .unwrap();
    game = games.get_game_state(&game.session_id).await.unwrap();
    for _ in 0..8 {
        games
            .submit_answer(&mut ctx, &game.session_id, real_side(&game))
            .await
            .unwrap();
        game = games.get_game_state(&game.session_id).await.unwrap();
    }
    // 8 correct: 5 * 10 + 3 * 20
    assert_eq!(game.score, 110);

    let bonus = game.bonus.clone().unwrap();
    let fake = bonus.iter().find(|v| v.filename.starts_with("ai/")).unwrap();
    let outcome = games
        .submit_bonus(&mut ctx, &game.session_id, fake.id)
        .await
        .unwrap();
    assert!(!outcome.is_correct);
    assert_eq!(outcome.points_lost, 55);
    assert_eq!(outcome.score, 55);
    assert_eq!(outcome.lives, 4);
}

#[tokio::test]
async fn test_score_token_verifies_for_player() {
    let state = create_test_state().await;
    let player = create_player(&state, "ada").await;
    let games = state.games();
    let now = noon(2024, 3, 1);
    let mut ctx = ctx_for(Some(&player), now, 17);

    let mut game = games
        .create_game(&mut ctx, GameMode::Single, Some(Difficulty::Easy), false)
        .await
        .unwrap();
    let mut token = None;
    for _ in 0..5 {
        let outcome = games
            .submit_answer(&mut ctx, &game.session_id, wrong_side(&game))
            .await
            .unwrap();
        if outcome.completed {
            token = outcome.score_token;
        } else {
            game = games.get_game_state(&game.session_id).await.unwrap();
        }
    }
    let token = token.unwrap();

    let expected = Expected {
        score: Some(0),
        user_id: Some(player.id),
    };
    let verified = games.verify_score(&ctx, &token, expected).await.unwrap();
    assert!(verified.valid);
    assert_eq!(verified.user_id, Some(player.id));

    let mismatch = Expected {
        score: Some(500),
        user_id: Some(player.id),
    };
    let err = games.verify_score(&ctx, &token, mismatch).await.unwrap_err();
    assert!(matches!(err, GameError::IntegrityFailure(_)));

    let later = ctx_for(Some(&player), now + Duration::seconds(301), 17);
    let err = games
        .verify_score(&later, &token, expected)
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::IntegrityFailure(_)));

    let board = state
        .db
        .top_scores(GameMode::Single, Some(Difficulty::Easy), 10)
        .await
        .unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].username, "ada");

    let badges = state.db.held_criteria(player.id).await.unwrap();
    assert!(badges.contains(&"first_game".to_string()));
}

#[tokio::test]
async fn test_cleanup_removes_stale_games() {
    let state = create_test_state().await;
    let games = state.games();
    let old = noon(2024, 1, 1);
    let mut ctx = ctx_for(None, old, 19);

    let stale = games
        .create_game(&mut ctx, GameMode::Endless, None, false)
        .await
        .unwrap();

    let mut fresh_ctx = ctx_for(None, noon(2024, 3, 1), 19);
    let fresh = games
        .create_game(&mut fresh_ctx, GameMode::Endless, None, false)
        .await
        .unwrap();

    let removed = games.cleanup_games(noon(2024, 2, 1)).await.unwrap();
    assert_eq!(removed, 1);
    assert!(games.get_game_state(&stale.session_id).await.is_err());
    assert!(games.get_game_state(&fresh.session_id).await.is_ok());
}
