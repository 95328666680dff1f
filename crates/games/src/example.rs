//! Reference turn-based game.
//!
//! The turn holder's direct messages are acknowledged during MainPhase and
//! their public messages during SpecialPhase; everything else is ignored.

use std::sync::Arc;

use {
    async_trait::async_trait,
    gamehall_channels::{ChannelOutbound, InboundMessage},
    gamehall_common::ChannelId,
    gamehall_sessions::{Game, GameRules, MessageRoute, Phase, Player, Result, SessionFlow, Table},
};

pub type ExampleGame = Game<ExampleRules>;

#[derive(Debug, Default)]
pub struct ExampleRules;

impl ExampleRules {
    /// Build a game in Setup for `players` in `channel`.
    pub fn game(
        channel: ChannelId,
        players: impl IntoIterator<Item = Player>,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Result<ExampleGame> {
        Game::new(channel, players, outbound, Self)
    }
}

#[async_trait]
impl GameRules for ExampleRules {
    const KIND: &'static str = "example";

    async fn setup(&mut self, table: &mut Table) -> Result<()> {
        table.announce("Asserting randomized starting parameters.").await
    }

    async fn on_turn_start(&mut self, table: &mut Table) -> Result<()> {
        if table.turn() == 0 {
            table.announce("Dealing.").await
        } else {
            table.announce("Next turn commencing.").await
        }
    }

    fn accepts(&self, phase: Phase) -> Option<MessageRoute> {
        match phase {
            Phase::MainPhase => Some(MessageRoute::Direct),
            Phase::SpecialPhase => Some(MessageRoute::Public),
            _ => None,
        }
    }

    async fn on_turn_message(
        &mut self,
        table: &mut Table,
        message: &InboundMessage,
    ) -> Result<SessionFlow> {
        if message.is_direct {
            table
                .outbound()
                .send_text(message.channel_id, "PM received.")
                .await?;
        } else {
            table.announce("Message acknowledged.").await?;
        }
        Ok(SessionFlow::Continue)
    }

    fn render_state(&self, table: &Table) -> String {
        format!(
            "State of the game at turn {}\nThe current turn player is **{}**.\nThe current phase is **{:?}**",
            table.turn(),
            table.turn_holder().user.name,
            table.phase(),
        )
    }
}
