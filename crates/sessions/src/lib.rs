//! Session lifecycle for games, trivia rounds, and paginated displays.
//!
//! A [`SessionRegistry`] holds at most one live [`Session`] per
//! [`SessionKey`] (a channel or a message). Each registered session gets its
//! own event-bus subscription which is released the moment the session ends.
//! Turn-based kinds build on [`Game`], which wraps a circular [`TurnOrder`]
//! and a [`Phase`] and filters inbound messages by turn holder, phase, and
//! channel type before handing them to the kind's [`GameRules`].

pub mod error;
pub mod game;
pub mod key;
pub mod registry;
pub mod session;
pub mod turn_order;

pub use {
    error::{Error, Result},
    game::{Game, GameRules, MessageRoute, Phase, Player, Table},
    key::SessionKey,
    registry::{Dispatch, SessionGuard, SessionRegistry},
    session::{Session, SessionFlow},
    turn_order::TurnOrder,
};
