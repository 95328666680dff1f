use {async_trait::async_trait, gamehall_channels::InboundEvent};

use crate::{Result, key::SessionKey};

/// What a session wants after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    /// Terminal state reached; the registry tears the session down.
    End,
}

/// One live game, trivia round, or paginated display.
///
/// Irrelevant events (wrong user, wrong phase, wrong channel type) are not
/// errors: return `Ok(SessionFlow::Continue)` without side effects.
#[async_trait]
pub trait Session: Send + 'static {
    /// Short kind name used in logs ("trivia", "help", ...).
    fn kind(&self) -> &'static str;

    /// Cheap pre-filter deciding whether the per-session subscription
    /// forwards `event` at all. Runs without the session lock.
    ///
    /// The default forwards events that happened in the keyed channel or
    /// refer to the keyed message.
    fn routes(key: &SessionKey, event: &InboundEvent) -> bool
    where
        Self: Sized,
    {
        match key {
            SessionKey::Channel(channel) => event.channel_id() == Some(*channel),
            SessionKey::Message(message) => event.message_id() == Some(*message),
        }
    }

    async fn handle_event(&mut self, event: &InboundEvent) -> Result<SessionFlow>;

    /// Called once when the session is ended explicitly.
    async fn on_end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Plain-text summary of the current state. Must not mutate.
    fn render_state(&self) -> String;
}
