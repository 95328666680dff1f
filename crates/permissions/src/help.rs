//! Help listings and the reaction-driven paginated help display.

use std::{collections::BTreeMap, sync::Arc};

use {
    async_trait::async_trait,
    gamehall_channels::{ChannelOutbound, InboundEvent, Reaction},
    gamehall_common::{ChannelId, MessageId, UserId},
    gamehall_sessions::{Session, SessionFlow, SessionKey},
    tracing::{debug, warn},
};

use crate::catalog::CommandInfo;

pub const FIRST: &str = "⏮";
pub const BACK: &str = "◀";
pub const NEXT: &str = "▶";
pub const LAST: &str = "⏭";
pub const DELETE: &str = "🛑";

/// Control reactions in the order they are added to the message.
pub const CONTROLS: [&str; 5] = [FIRST, BACK, NEXT, LAST, DELETE];

/// Single-message listing grouped by module.
pub fn plain_listing(commands: &[&CommandInfo]) -> String {
    let mut by_module: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for command in commands {
        let names = by_module.entry(command.module.as_str()).or_default();
        if !names.contains(&command.name.as_str()) {
            names.push(&command.name);
        }
    }
    let mut out = String::from("You can use the following commands:\n");
    for (module, names) in by_module {
        out.push_str(&format!("{module}:\n\t`{}`\n", names.join("`, `")));
    }
    out.push_str("\nYou can use `help <command>` for more information on that command.");
    out
}

/// Split `commands` into pages of at most `page_size` entries.
pub fn pages(commands: &[&CommandInfo], page_size: usize) -> Vec<String> {
    let page_size = page_size.max(1);
    let chunks: Vec<_> = commands.chunks(page_size).collect();
    let total = chunks.len().max(1);
    if chunks.is_empty() {
        return vec![format!("No commands available.\n\nPage 1/{total}")];
    }
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut page = String::new();
            for command in *chunk {
                page.push_str(&format!("**{}** ({})", command.name, command.module));
                if !command.summary.is_empty() {
                    page.push_str(&format!(": {}", command.summary));
                }
                page.push('\n');
            }
            page.push_str(&format!("\nPage {}/{total}", i + 1));
            page
        })
        .collect()
}

/// Where the display currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePhase {
    First,
    Middle,
    Last,
}

/// A help message the requester pages through with reactions.
///
/// Keyed by the message it renders into. Reactions from the bot itself are
/// ignored; reactions from anyone but the requester are stripped. Deleting
/// the message, or the 🛑 control, ends the session.
pub struct HelpPagination {
    channel: ChannelId,
    message: MessageId,
    requester: UserId,
    bot_user: Option<UserId>,
    pages: Vec<String>,
    index: usize,
    outbound: Arc<dyn ChannelOutbound>,
}

impl HelpPagination {
    /// Post the first page and add the control reactions.
    pub async fn open(
        outbound: Arc<dyn ChannelOutbound>,
        channel: ChannelId,
        requester: UserId,
        bot_user: Option<UserId>,
        mut pages: Vec<String>,
    ) -> gamehall_sessions::Result<Self> {
        if pages.is_empty() {
            pages.push("No commands available.".into());
        }
        let message = outbound.send_text(channel, &pages[0]).await?;
        for emoji in CONTROLS {
            outbound.add_reaction(channel, message, emoji).await?;
        }
        Ok(Self {
            channel,
            message,
            requester,
            bot_user,
            pages,
            index: 0,
            outbound,
        })
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::Message(self.message)
    }

    pub fn message(&self) -> MessageId {
        self.message
    }

    pub fn page(&self) -> usize {
        self.index
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn phase(&self) -> PagePhase {
        if self.index == 0 {
            PagePhase::First
        } else if self.index + 1 == self.pages.len() {
            PagePhase::Last
        } else {
            PagePhase::Middle
        }
    }

    async fn show(&mut self, index: usize) -> gamehall_sessions::Result<()> {
        if index == self.index {
            return Ok(());
        }
        self.outbound
            .edit_text(self.channel, self.message, &self.pages[index])
            .await?;
        self.index = index;
        Ok(())
    }

    async fn on_reaction(&mut self, reaction: &Reaction) -> gamehall_sessions::Result<SessionFlow> {
        if Some(reaction.user_id) == self.bot_user {
            return Ok(SessionFlow::Continue);
        }
        if reaction.user_id != self.requester {
            debug!(message = %self.message, user = %reaction.user_id, "stripping foreign help reaction");
            if let Err(e) = self
                .outbound
                .remove_reaction(self.channel, self.message, reaction.user_id, &reaction.emoji)
                .await
            {
                warn!(message = %self.message, error = %e, "failed to remove reaction");
            }
            return Ok(SessionFlow::Continue);
        }

        let last = self.pages.len() - 1;
        match reaction.emoji.as_str() {
            FIRST => self.show(0).await?,
            BACK if self.phase() != PagePhase::First => self.show(self.index - 1).await?,
            NEXT if self.phase() != PagePhase::Last => self.show(self.index + 1).await?,
            LAST => self.show(last).await?,
            DELETE => {
                self.outbound
                    .delete_message(self.channel, self.message)
                    .await?;
                return Ok(SessionFlow::End);
            },
            _ => {},
        }
        Ok(SessionFlow::Continue)
    }
}

#[async_trait]
impl Session for HelpPagination {
    fn kind(&self) -> &'static str {
        "help"
    }

    async fn handle_event(&mut self, event: &InboundEvent) -> gamehall_sessions::Result<SessionFlow> {
        match event {
            InboundEvent::ReactionAdded(reaction) => self.on_reaction(reaction).await,
            InboundEvent::MessageDeleted { message_id, .. } if *message_id == self.message => {
                Ok(SessionFlow::End)
            },
            _ => Ok(SessionFlow::Continue),
        }
    }

    fn render_state(&self) -> String {
        format!("page {}/{}", self.index + 1, self.pages.len())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::level::MinimumPermission,
        gamehall_channels::{OutboundAction, RecordingOutbound},
    };

    const CHAN: ChannelId = ChannelId(5);
    const ASKER: UserId = UserId(7);
    const BOT: UserId = UserId(1);

    async fn open(pages: usize) -> (HelpPagination, Arc<RecordingOutbound>) {
        let outbound = Arc::new(RecordingOutbound::starting_at(MessageId(40)));
        let pages = (1..=pages).map(|i| format!("page {i}")).collect();
        let help = HelpPagination::open(outbound.clone(), CHAN, ASKER, Some(BOT), pages)
            .await
            .unwrap();
        (help, outbound)
    }

    fn react(user: UserId, emoji: &str) -> InboundEvent {
        InboundEvent::ReactionAdded(Reaction {
            message_id: MessageId(40),
            channel_id: CHAN,
            user_id: user,
            emoji: emoji.into(),
        })
    }

    #[tokio::test]
    async fn open_posts_first_page_and_controls() {
        let (help, outbound) = open(3).await;
        assert_eq!(help.key(), SessionKey::Message(MessageId(40)));
        assert_eq!(help.phase(), PagePhase::First);
        let actions = outbound.actions();
        assert_eq!(actions.len(), 1 + CONTROLS.len());
        assert!(matches!(&actions[0], OutboundAction::Sent { text, .. } if text == "page 1"));
    }

    #[tokio::test]
    async fn requester_navigates_within_bounds() {
        let (mut help, _) = open(3).await;
        help.handle_event(&react(ASKER, BACK)).await.unwrap();
        assert_eq!(help.page(), 0);

        help.handle_event(&react(ASKER, NEXT)).await.unwrap();
        assert_eq!(help.phase(), PagePhase::Middle);
        help.handle_event(&react(ASKER, LAST)).await.unwrap();
        assert_eq!(help.phase(), PagePhase::Last);
        help.handle_event(&react(ASKER, NEXT)).await.unwrap();
        assert_eq!(help.page(), 2);
        help.handle_event(&react(ASKER, FIRST)).await.unwrap();
        assert_eq!(help.render_state(), "page 1/3");
    }

    #[tokio::test]
    async fn foreign_reactions_are_stripped_and_bot_ignored() {
        let (mut help, outbound) = open(2).await;
        let before = outbound.actions().len();

        help.handle_event(&react(BOT, NEXT)).await.unwrap();
        assert_eq!(outbound.actions().len(), before);

        help.handle_event(&react(UserId(8), NEXT)).await.unwrap();
        assert_eq!(help.page(), 0);
        assert_eq!(
            outbound.actions().last().unwrap(),
            &OutboundAction::ReactionRemoved {
                message: MessageId(40),
                user: UserId(8),
                emoji: NEXT.into(),
            }
        );
    }

    #[tokio::test]
    async fn stop_control_deletes_and_ends() {
        let (mut help, outbound) = open(2).await;
        let flow = help.handle_event(&react(ASKER, DELETE)).await.unwrap();
        assert_eq!(flow, SessionFlow::End);
        assert!(matches!(
            outbound.actions().last().unwrap(),
            OutboundAction::Deleted { .. }
        ));
    }

    #[tokio::test]
    async fn deleted_message_ends_session() {
        let (mut help, _) = open(2).await;
        let flow = help
            .handle_event(&InboundEvent::MessageDeleted {
                channel_id: CHAN,
                message_id: MessageId(40),
            })
            .await
            .unwrap();
        assert_eq!(flow, SessionFlow::End);
    }

    #[test]
    fn pagination_and_listing() {
        let commands: Vec<CommandInfo> = (0..5)
            .map(|i| {
                CommandInfo::new(format!("c{i}"), "Games", MinimumPermission::Everyone)
                    .summary("does things")
            })
            .collect();
        let refs: Vec<&CommandInfo> = commands.iter().collect();
        let pages = pages(&refs, 2);
        assert_eq!(pages.len(), 3);
        assert!(pages[2].ends_with("Page 3/3"));

        let listing = plain_listing(&refs);
        assert!(listing.contains("Games:\n\t`c0`, `c1`, `c2`, `c3`, `c4`"));
    }

    #[test]
    fn empty_listing_still_has_a_page() {
        assert_eq!(pages(&[], 10).len(), 1);
    }
}
