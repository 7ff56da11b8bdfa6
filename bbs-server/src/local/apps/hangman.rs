//! # Hangman (builtin app)
//!
//! A small single-player word-guessing game exercising `CapabilityFacade`'s
//! `user_storage` (per-player game state, isolated by `user_id`, P3) and
//! demonstrating the `OnceLock`-captured-at-`on_init` pattern every
//! compiled-in app uses to reach its capability facade from
//! `handle_command`, which `BbsApp` gives no facade parameter to (§4.4 -
//! the facade is handed once, at `on_init`, not threaded through every call).

use std::sync::OnceLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::capability::CapabilityFacade;
use crate::contract::{BbsApp, CommandResult};
use crate::domain::{SessionView, Value};

const WORDS: &[&str] = &["RUST", "TERMINAL", "BULLETIN", "SANDBOX", "REGISTRY", "CAPABILITY"];
const MAX_WRONG_GUESSES: u32 = 6;

struct GameState {
    word: String,
    guessed: Vec<char>,
    wrong: u32,
}

impl GameState {
    fn new(word: String) -> Self {
        Self { word, guessed: Vec::new(), wrong: 0 }
    }

    fn is_won(&self) -> bool {
        self.word.chars().all(|c| self.guessed.contains(&c))
    }

    fn is_lost(&self) -> bool {
        self.wrong >= MAX_WRONG_GUESSES
    }

    fn render(&self) -> String {
        let masked: String = self
            .word
            .chars()
            .map(|c| if self.guessed.contains(&c) { c } else { '_' })
            .collect::<Vec<_>>()
            .join(" ");
        let guessed_letters: String = self.guessed.iter().collect::<String>();
        format!(
            "{masked}\nWrong guesses: {}/{MAX_WRONG_GUESSES}  Guessed: {guessed_letters}",
            self.wrong
        )
    }

    fn to_value(&self) -> Value {
        let mut map = std::collections::HashMap::new();
        map.insert("word".to_string(), Value::String(self.word.clone()));
        map.insert("guessed".to_string(), Value::List(self.guessed.iter().map(|c| Value::String(c.to_string())).collect()));
        map.insert("wrong".to_string(), Value::Number(self.wrong as f64));
        Value::Map(map)
    }

    fn from_value(value: Value) -> Option<Self> {
        let Value::Map(map) = value else { return None };
        let Value::String(word) = map.get("word")?.clone() else { return None };
        let Value::List(items) = map.get("guessed")?.clone() else { return None };
        let guessed = items
            .into_iter()
            .filter_map(|v| if let Value::String(s) = v { s.chars().next() } else { None })
            .collect();
        let Value::Number(wrong) = map.get("wrong")?.clone() else { return None };
        Some(Self { word, guessed, wrong: wrong as u32 })
    }
}

pub struct HangmanApp {
    caps: OnceLock<CapabilityFacade>,
}

impl Default for HangmanApp {
    fn default() -> Self {
        Self::new()
    }
}

impl HangmanApp {
    pub fn new() -> Self {
        Self { caps: OnceLock::new() }
    }

    fn caps(&self) -> &CapabilityFacade {
        self.caps.get().expect("HangmanApp::on_init must run before handle_command")
    }

    fn pick_word(session: &SessionView) -> String {
        let seed: usize = session.key.bytes().map(|b| b as usize).sum();
        WORDS[seed % WORDS.len()].to_string()
    }

    async fn load_game(&self, user_id: Uuid) -> Option<GameState> {
        self.caps().user_storage_get(user_id, "game").await.ok().flatten().and_then(GameState::from_value)
    }

    async fn save_game(&self, user_id: Uuid, game: &GameState) {
        let _ = self.caps().user_storage_set(user_id, "game", game.to_value(), None).await;
    }
}

#[async_trait]
impl BbsApp for HangmanApp {
    fn id(&self) -> &str {
        "hangman"
    }
    fn name(&self) -> &str {
        "Hangman"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Guess the word one letter at a time before you run out of attempts."
    }
    fn author(&self) -> &str {
        "builtin"
    }

    async fn get_welcome_screen(&self) -> String {
        "Hangman - guess the word one letter at a time.\nType a letter to guess, NEW for a new word, B to go back.".to_string()
    }

    async fn handle_command(&self, _screen_id: Option<&str>, command: &str, session: &SessionView) -> CommandResult {
        let Some(user_id) = session.user_id else {
            return CommandResult::to_main("You must be logged in to play Hangman.");
        };

        let normalized = command.trim().to_uppercase();

        if normalized == "NEW" {
            let game = GameState::new(Self::pick_word(session));
            let response = format!("New game started!\n{}", game.render());
            self.save_game(user_id, &game).await;
            return CommandResult::new(response, Some("play".to_string()));
        }

        let mut game = match self.load_game(user_id).await {
            Some(game) => game,
            None => GameState::new(Self::pick_word(session)),
        };

        if game.is_won() || game.is_lost() {
            let outcome = if game.is_won() { "You already won this round." } else { "You already lost this round." };
            return CommandResult::new(format!("{outcome} Type NEW to play again.\n{}", game.render()), Some("play".to_string()));
        }

        let Some(letter) = normalized.chars().next().filter(|c| c.is_ascii_alphabetic() && normalized.len() == 1) else {
            return CommandResult::new(
                format!("Type a single letter, NEW, or B to go back.\n{}", game.render()),
                Some("play".to_string()),
            );
        };

        if !game.guessed.contains(&letter) {
            game.guessed.push(letter);
            if !game.word.contains(letter) {
                game.wrong += 1;
            }
        }

        let response = if game.is_won() {
            format!("You guessed it! The word was {}.\n{}", game.word, game.render())
        } else if game.is_lost() {
            format!("Out of guesses. The word was {}.\n{}", game.word, game.render())
        } else {
            game.render()
        };

        self.save_game(user_id, &game).await;
        CommandResult::new(response, Some("play".to_string()))
    }

    async fn get_help(&self, _screen_id: Option<&str>) -> String {
        "Type a single letter to guess it. NEW starts a fresh word. B or BACK returns to the main menu.".to_string()
    }

    async fn on_init(&self, caps: &CapabilityFacade) {
        let _ = self.caps.set(caps.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_masks_unguessed_letters() {
        let mut game = GameState::new("RUST".to_string());
        game.guessed.push('R');
        let rendered = game.render();
        assert!(rendered.starts_with("R _ _ _"));
    }

    #[test]
    fn a_game_is_won_once_every_letter_is_guessed() {
        let mut game = GameState::new("GO".to_string());
        assert!(!game.is_won());
        game.guessed.push('G');
        game.guessed.push('O');
        assert!(game.is_won());
    }

    #[test]
    fn a_game_is_lost_at_the_wrong_guess_ceiling() {
        let mut game = GameState::new("RUST".to_string());
        game.wrong = MAX_WRONG_GUESSES;
        assert!(game.is_lost());
    }

    #[test]
    fn game_state_round_trips_through_value() {
        let mut game = GameState::new("RUST".to_string());
        game.guessed.push('R');
        game.wrong = 2;
        let value = game.to_value();
        let restored = GameState::from_value(value).unwrap();
        assert_eq!(restored.word, "RUST");
        assert_eq!(restored.guessed, vec!['R']);
        assert_eq!(restored.wrong, 2);
    }
}
