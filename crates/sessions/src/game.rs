//! Turn-based session state machine.
//!
//! [`Game`] owns the shared machinery (turn order, phase, turn counter,
//! message filtering) and delegates everything kind-specific to a
//! [`GameRules`] implementation.

use std::sync::Arc;

use {
    async_trait::async_trait,
    gamehall_channels::{ChannelOutbound, InboundEvent, InboundMessage},
    gamehall_common::{ChannelId, UserId, UserRef},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    Error, Result,
    key::SessionKey,
    session::{Session, SessionFlow},
    turn_order::TurnOrder,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    StartOfTurn,
    MainPhase,
    SpecialPhase,
    EndPhase,
    Ended,
}

impl Phase {
    /// Phases in which the turn holder may act.
    pub fn is_mid_turn(self) -> bool {
        matches!(self, Self::MainPhase | Self::SpecialPhase | Self::EndPhase)
    }
}

/// Channel type a phase listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRoute {
    /// Direct messages to the bot.
    Direct,
    /// The game's own public channel.
    Public,
}

impl MessageRoute {
    fn of(message: &InboundMessage) -> Self {
        if message.is_direct {
            Self::Direct
        } else {
            Self::Public
        }
    }
}

/// A participant. Two players are the same player iff their user ids match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub user: UserRef,
}

impl Player {
    pub fn id(&self) -> UserId {
        self.user.id
    }
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.user.id == other.user.id
    }
}

impl Eq for Player {}

impl From<UserRef> for Player {
    fn from(user: UserRef) -> Self {
        Self { user }
    }
}

/// State shared by every turn-based kind.
pub struct Table {
    channel: ChannelId,
    players: TurnOrder<Player>,
    phase: Phase,
    turn: u32,
    outbound: Arc<dyn ChannelOutbound>,
}

impl Table {
    /// The public channel the game runs in.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn players(&self) -> &TurnOrder<Player> {
        &self.players
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn turn_holder(&self) -> &Player {
        self.players.current()
    }

    pub fn outbound(&self) -> &Arc<dyn ChannelOutbound> {
        &self.outbound
    }

    /// Move to a mid-turn phase. Only legal once a turn has started and
    /// before the game ended.
    pub fn enter_phase(&mut self, phase: Phase) -> Result<()> {
        if !phase.is_mid_turn() || matches!(self.phase, Phase::Setup | Phase::Ended) {
            return Err(Error::invalid_transition("enter phase", self.phase));
        }
        self.phase = phase;
        Ok(())
    }

    /// Post to the game's public channel.
    pub async fn announce(&self, text: &str) -> Result<()> {
        self.outbound.send_text(self.channel, text).await?;
        Ok(())
    }
}

/// Kind-specific behaviour of a turn-based game.
#[async_trait]
pub trait GameRules: Send + 'static {
    const KIND: &'static str;

    /// One-time preparation (shuffling, dealing). Runs in [`Phase::Setup`].
    async fn setup(&mut self, _table: &mut Table) -> Result<()> {
        Ok(())
    }

    /// Reset per-turn data. Runs on every entry into [`Phase::StartOfTurn`].
    async fn on_turn_start(&mut self, _table: &mut Table) -> Result<()> {
        Ok(())
    }

    /// Channel type the turn holder must use in `phase`, or `None` if the
    /// phase takes no messages.
    fn accepts(&self, phase: Phase) -> Option<MessageRoute>;

    /// A message from the turn holder that passed phase and route filtering.
    async fn on_turn_message(
        &mut self,
        table: &mut Table,
        message: &InboundMessage,
    ) -> Result<SessionFlow>;

    async fn on_end(&mut self, _table: &mut Table) -> Result<()> {
        Ok(())
    }

    fn render_state(&self, table: &Table) -> String;
}

/// A turn-based game session.
pub struct Game<R> {
    table: Table,
    rules: R,
}

impl<R: GameRules> Game<R> {
    /// Build a game in [`Phase::Setup`]. Fails with
    /// [`Error::EmptyTurnOrder`] when `players` is empty.
    pub fn new(
        channel: ChannelId,
        players: impl IntoIterator<Item = Player>,
        outbound: Arc<dyn ChannelOutbound>,
        rules: R,
    ) -> Result<Self> {
        Ok(Self {
            table: Table {
                channel,
                players: TurnOrder::new(players)?,
                phase: Phase::Setup,
                turn: 0,
                outbound,
            },
            rules,
        })
    }

    pub async fn setup(&mut self) -> Result<()> {
        if self.table.phase != Phase::Setup {
            return Err(Error::invalid_transition("set up", self.table.phase));
        }
        self.rules.setup(&mut self.table).await
    }

    /// First turn: cursor at the head, turn counter 0.
    pub async fn start(&mut self) -> Result<()> {
        if self.table.phase != Phase::Setup {
            return Err(Error::invalid_transition("start", self.table.phase));
        }
        self.table.players.reset_to_head();
        self.table.turn = 0;
        self.table.phase = Phase::StartOfTurn;
        self.rules.on_turn_start(&mut self.table).await
    }

    /// Hand the turn to the next player and re-enter StartOfTurn.
    pub async fn advance_turn(&mut self) -> Result<()> {
        if matches!(self.table.phase, Phase::Setup | Phase::Ended) {
            return Err(Error::invalid_transition("advance the turn", self.table.phase));
        }
        self.table.players.advance();
        self.table.turn += 1;
        self.table.phase = Phase::StartOfTurn;
        debug!(
            kind = R::KIND,
            channel = %self.table.channel,
            turn = self.table.turn,
            holder = %self.table.turn_holder().user,
            "turn advanced"
        );
        self.rules.on_turn_start(&mut self.table).await
    }

    pub fn enter_phase(&mut self, phase: Phase) -> Result<()> {
        self.table.enter_phase(phase)
    }

    pub fn phase(&self) -> Phase {
        self.table.phase
    }

    pub fn turn(&self) -> u32 {
        self.table.turn
    }

    pub fn turn_holder(&self) -> &Player {
        self.table.turn_holder()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    /// Enter [`Phase::Ended`] and run the kind's end hook, whether the game
    /// was won or ended explicitly. The hook runs once.
    async fn finish(&mut self) -> Result<()> {
        if self.table.phase == Phase::Ended {
            return Ok(());
        }
        self.table.phase = Phase::Ended;
        self.rules.on_end(&mut self.table).await
    }

    /// Whether `message` is a legal move right now.
    fn is_turn_message(&self, message: &InboundMessage) -> bool {
        let phase = self.table.phase;
        if !phase.is_mid_turn() {
            return false;
        }
        let Some(route) = self.rules.accepts(phase) else {
            return false;
        };
        if MessageRoute::of(message) != route {
            return false;
        }
        if route == MessageRoute::Public && message.channel_id != self.table.channel {
            return false;
        }
        message.author.id == self.table.turn_holder().id()
    }
}

#[async_trait]
impl<R: GameRules> Session for Game<R> {
    fn kind(&self) -> &'static str {
        R::KIND
    }

    /// Messages in the game channel, plus every direct message; the latter
    /// are narrowed down to the turn holder in `handle_event`.
    fn routes(key: &SessionKey, event: &InboundEvent) -> bool {
        let InboundEvent::MessageReceived(message) = event else {
            return false;
        };
        message.is_direct || *key == SessionKey::Channel(message.channel_id)
    }

    async fn handle_event(&mut self, event: &InboundEvent) -> Result<SessionFlow> {
        let InboundEvent::MessageReceived(message) = event else {
            return Ok(SessionFlow::Continue);
        };
        if !self.is_turn_message(message) {
            debug!(
                kind = R::KIND,
                channel = %self.table.channel,
                author = %message.author.id,
                phase = ?self.table.phase,
                "ignored message"
            );
            return Ok(SessionFlow::Continue);
        }
        let flow = self.rules.on_turn_message(&mut self.table, message).await?;
        if flow == SessionFlow::End {
            self.finish().await?;
        }
        Ok(flow)
    }

    async fn on_end(&mut self) -> Result<()> {
        self.finish().await
    }

    fn render_state(&self) -> String {
        self.rules.render_state(&self.table)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        gamehall_channels::RecordingOutbound,
        gamehall_common::MessageId,
    };

    const TABLE: ChannelId = ChannelId(100);

    #[derive(Default)]
    struct Counting {
        shuffled: bool,
        turn_starts: u32,
        moves: Vec<String>,
        ends: u32,
    }

    #[async_trait]
    impl GameRules for Counting {
        const KIND: &'static str = "counting";

        async fn setup(&mut self, _table: &mut Table) -> Result<()> {
            self.shuffled = true;
            Ok(())
        }

        async fn on_turn_start(&mut self, _table: &mut Table) -> Result<()> {
            self.turn_starts += 1;
            Ok(())
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
            self.moves.push(message.content.clone());
            table.announce(&format!("{} played", message.author)).await?;
            Ok(if message.content == "win" {
                SessionFlow::End
            } else {
                SessionFlow::Continue
            })
        }

        async fn on_end(&mut self, table: &mut Table) -> Result<()> {
            self.ends += 1;
            table.announce("game over").await
        }

        fn render_state(&self, table: &Table) -> String {
            format!("turn {} holder {}", table.turn(), table.turn_holder().user)
        }
    }

    fn players() -> Vec<Player> {
        ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, name)| Player::from(UserRef::new(i as u64 + 1, *name)))
            .collect()
    }

    fn game() -> (Game<Counting>, Arc<RecordingOutbound>) {
        let outbound = Arc::new(RecordingOutbound::new());
        let game = Game::new(TABLE, players(), outbound.clone(), Counting::default()).unwrap();
        (game, outbound)
    }

    fn msg(author: u64, channel: u64, is_direct: bool, content: &str) -> InboundEvent {
        InboundEvent::MessageReceived(InboundMessage {
            id: MessageId(900),
            channel_id: ChannelId(channel),
            guild_id: None,
            author: UserRef::new(author, "someone"),
            content: content.into(),
            is_direct,
            roles: Vec::new(),
        })
    }

    #[test]
    fn no_players_no_game() {
        let outbound = Arc::new(RecordingOutbound::new());
        let result = Game::new(TABLE, Vec::new(), outbound, Counting::default());
        assert!(matches!(result, Err(Error::EmptyTurnOrder)));
    }

    #[tokio::test]
    async fn setup_then_start_resets_to_head() {
        let (mut game, _) = game();
        assert_eq!(game.phase(), Phase::Setup);
        game.setup().await.unwrap();
        assert!(game.rules().shuffled);

        game.start().await.unwrap();
        assert_eq!(game.phase(), Phase::StartOfTurn);
        assert_eq!(game.turn(), 0);
        assert_eq!(game.turn_holder().id(), UserId(1));
        assert_eq!(game.rules().turn_starts, 1);

        assert!(matches!(
            game.setup().await,
            Err(Error::InvalidTransition { phase: Phase::StartOfTurn, .. })
        ));
    }

    #[tokio::test]
    async fn advance_moves_exactly_one_seat() {
        let (mut game, _) = game();
        game.start().await.unwrap();
        for expected in [2, 3, 1, 2] {
            game.enter_phase(Phase::EndPhase).unwrap();
            game.advance_turn().await.unwrap();
            assert_eq!(game.turn_holder().id(), UserId(expected));
            assert_eq!(game.phase(), Phase::StartOfTurn);
        }
        assert_eq!(game.turn(), 4);
        assert_eq!(game.rules().turn_starts, 5);
    }

    #[tokio::test]
    async fn phase_changes_need_a_running_turn() {
        let (mut game, _) = game();
        assert!(game.enter_phase(Phase::MainPhase).is_err());
        assert!(game.advance_turn().await.is_err());

        game.start().await.unwrap();
        assert!(game.enter_phase(Phase::Setup).is_err());
        game.enter_phase(Phase::SpecialPhase).unwrap();
        assert_eq!(game.phase(), Phase::SpecialPhase);
    }

    #[tokio::test]
    async fn filters_by_holder_phase_and_route() {
        let (mut game, outbound) = game();
        game.start().await.unwrap();

        // StartOfTurn takes no messages.
        game.handle_event(&msg(1, 555, true, "early")).await.unwrap();

        game.enter_phase(Phase::MainPhase).unwrap();
        // Not the holder.
        game.handle_event(&msg(2, 555, true, "b")).await.unwrap();
        // Holder, but public during a direct-message phase.
        game.handle_event(&msg(1, TABLE.get(), false, "public")).await.unwrap();
        assert!(game.rules().moves.is_empty());
        assert!(outbound.actions().is_empty());

        game.handle_event(&msg(1, 555, true, "dm")).await.unwrap();
        assert_eq!(game.rules().moves, vec!["dm"]);

        game.enter_phase(Phase::SpecialPhase).unwrap();
        // Public phase only listens on the game's own channel.
        game.handle_event(&msg(1, 101, false, "other room")).await.unwrap();
        game.handle_event(&msg(1, TABLE.get(), false, "here")).await.unwrap();
        assert_eq!(game.rules().moves, vec!["dm", "here"]);
        assert_eq!(outbound.texts_in(TABLE).len(), 2);
    }

    #[tokio::test]
    async fn winning_move_ends_the_game() {
        let (mut game, _) = game();
        game.start().await.unwrap();
        game.enter_phase(Phase::SpecialPhase).unwrap();

        let flow = game
            .handle_event(&msg(1, TABLE.get(), false, "win"))
            .await
            .unwrap();
        assert_eq!(flow, SessionFlow::End);
        assert_eq!(game.phase(), Phase::Ended);
        assert!(game.advance_turn().await.is_err());
    }

    #[tokio::test]
    async fn both_terminal_paths_run_the_end_hook_once() {
        let (mut won, outbound) = game();
        won.start().await.unwrap();
        won.enter_phase(Phase::SpecialPhase).unwrap();
        won.handle_event(&msg(1, TABLE.get(), false, "win"))
            .await
            .unwrap();
        assert_eq!(won.rules().ends, 1);
        assert_eq!(outbound.texts_in(TABLE).last().unwrap(), "game over");
        won.on_end().await.unwrap();
        assert_eq!(won.rules().ends, 1);

        let (mut stopped, _) = game();
        stopped.start().await.unwrap();
        stopped.on_end().await.unwrap();
        assert_eq!(stopped.rules().ends, 1);
        assert_eq!(stopped.phase(), Phase::Ended);
    }

    #[tokio::test]
    async fn render_is_read_only() {
        let (mut game, outbound) = game();
        game.start().await.unwrap();
        let before = game.render_state();
        assert_eq!(before, "turn 0 holder a");
        assert_eq!(game.render_state(), before);
        assert_eq!(game.phase(), Phase::StartOfTurn);
        assert!(outbound.actions().is_empty());
    }

    #[test]
    fn routes_dms_and_own_channel_only() {
        let key = SessionKey::Channel(TABLE);
        assert!(Game::<Counting>::routes(&key, &msg(1, 555, true, "x")));
        assert!(Game::<Counting>::routes(&key, &msg(1, TABLE.get(), false, "x")));
        assert!(!Game::<Counting>::routes(&key, &msg(1, 101, false, "x")));
    }
}
