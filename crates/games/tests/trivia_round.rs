#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::sync::Arc;

use {
    gamehall_channels::{EventBus, InboundEvent, InboundMessage, RecordingOutbound},
    gamehall_common::{ChannelId, MessageId, UserRef},
    gamehall_config::TriviaConfig,
    gamehall_games::{TriviaData, TriviaService},
};

const CHAN: ChannelId = ChannelId(44);

fn answer(content: &str, is_direct: bool) -> InboundEvent {
    InboundEvent::MessageReceived(InboundMessage {
        id: MessageId(1),
        channel_id: if is_direct { ChannelId(999) } else { CHAN },
        guild_id: None,
        author: UserRef::new(3, "quinn"),
        content: content.into(),
        is_direct,
        roles: Vec::new(),
    })
}

#[tokio::test]
async fn round_runs_to_completion_over_the_bus() {
    let bus = EventBus::new();
    let outbound = Arc::new(RecordingOutbound::new());
    // Every question shares the answer so the shuffle order does not matter.
    let data: TriviaData = (1..=5)
        .map(|i| (format!("question {i}"), vec!["yes".to_string()]))
        .collect();
    let service = TriviaService::new(
        data,
        TriviaConfig {
            questions_per_round: 3,
        },
        bus.clone(),
        outbound.clone(),
    );

    service.start(CHAN).await.unwrap();
    assert_eq!(bus.subscriber_count(), 1);

    // Direct messages never count.
    bus.publish(&answer("yes", true)).await;
    assert!(service.scoreboard(CHAN).await.unwrap().starts_with("Question 1/3"));

    for _ in 0..3 {
        bus.publish(&answer("YES", false)).await;
    }
    assert!(!service.is_running(CHAN));
    assert_eq!(bus.subscriber_count(), 0);

    let texts = outbound.texts_in(CHAN);
    assert_eq!(texts.iter().filter(|t| t.starts_with("Question")).count(), 3);
    assert!(texts.last().unwrap().ends_with("quinn: 3"));

    // The channel is free again.
    service.start(CHAN).await.unwrap();
}
