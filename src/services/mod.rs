pub mod accounts;
pub mod achievements;
pub mod bots;
pub mod daily;
pub mod game;
pub mod images;
pub mod multiplayer;
pub mod score;
