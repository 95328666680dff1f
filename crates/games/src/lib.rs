//! Session kinds built on the session machinery: a reference turn-based
//! game and trivia rounds.

pub mod error;
pub mod example;
pub mod trivia;

pub use {
    error::{Error, Result},
    example::{ExampleGame, ExampleRules},
    trivia::{TriviaData, TriviaService, TriviaSession, load_questions},
};
