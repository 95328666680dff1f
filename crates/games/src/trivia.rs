//! Trivia rounds, one per channel.
//!
//! A round asks questions in shuffled order in its channel. The first public
//! message matching one of the accepted answers (ignoring case and
//! surrounding whitespace) scores a point and moves to the next question.
//! The round ends after the configured number of questions, when the
//! questions run out, or when stopped.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use {
    async_trait::async_trait,
    gamehall_channels::{ChannelOutbound, EventBus, InboundEvent, InboundMessage},
    gamehall_common::{ChannelId, UserId},
    gamehall_config::TriviaConfig,
    gamehall_sessions::{Session, SessionFlow, SessionKey, SessionRegistry},
    rand::seq::SliceRandom,
    tracing::{debug, info},
};

use crate::{Error, Result, error::Context};

/// Question → accepted answers.
pub type TriviaData = BTreeMap<String, Vec<String>>;

/// Read a JSON object mapping each question to its accepted answers.
pub fn load_questions(path: &Path) -> Result<TriviaData> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trivia questions from {}", path.display()))?;
    Ok(serde_json::from_str(&raw)?)
}

#[derive(Debug, Clone)]
struct Question {
    text: String,
    answers: Vec<String>,
}

impl Question {
    fn is_answered_by(&self, guess: &str) -> bool {
        let guess = guess.trim().to_lowercase();
        self.answers
            .iter()
            .any(|answer| answer.trim().to_lowercase() == guess)
    }
}

#[derive(Debug, Clone, Default)]
struct Score {
    name: String,
    points: u32,
}

pub struct TriviaSession {
    channel: ChannelId,
    questions: Vec<Question>,
    asked: usize,
    current: Option<usize>,
    scores: BTreeMap<UserId, Score>,
    outbound: Arc<dyn ChannelOutbound>,
}

impl TriviaSession {
    /// Shuffle `data` and keep at most `limit` questions.
    pub fn new(
        channel: ChannelId,
        data: &TriviaData,
        limit: usize,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Self {
        let mut questions: Vec<Question> = data
            .iter()
            .map(|(text, answers)| Question {
                text: text.clone(),
                answers: answers.clone(),
            })
            .collect();
        questions.shuffle(&mut rand::rng());
        questions.truncate(limit.max(1));
        Self {
            channel,
            questions,
            asked: 0,
            current: None,
            scores: BTreeMap::new(),
            outbound,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn asked(&self) -> usize {
        self.asked
    }

    pub fn round_length(&self) -> usize {
        self.questions.len()
    }

    /// Text of the question waiting for an answer.
    pub fn current_question(&self) -> Option<&str> {
        self.current.map(|i| self.questions[i].text.as_str())
    }

    pub fn points(&self, user: UserId) -> u32 {
        self.scores.get(&user).map_or(0, |s| s.points)
    }

    /// Post the next question. Returns false when none are left.
    pub async fn ask_next(&mut self) -> gamehall_sessions::Result<bool> {
        if self.asked >= self.questions.len() {
            self.current = None;
            return Ok(false);
        }
        let index = self.asked;
        self.asked += 1;
        self.current = Some(index);
        let text = format!(
            "Question {}/{}: {}",
            self.asked,
            self.questions.len(),
            self.questions[index].text
        );
        self.outbound.send_text(self.channel, &text).await?;
        Ok(true)
    }

    fn scoreboard(&self) -> String {
        if self.scores.is_empty() {
            return "Nobody scored.".into();
        }
        let mut ranked: Vec<&Score> = self.scores.values().collect();
        ranked.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.name.cmp(&b.name)));
        ranked
            .iter()
            .map(|s| format!("{}: {}", s.name, s.points))
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn finish(&mut self) -> gamehall_sessions::Result<()> {
        self.current = None;
        let text = format!("Trivia is over. Final scores:\n{}", self.scoreboard());
        self.outbound.send_text(self.channel, &text).await?;
        Ok(())
    }

    async fn on_message(&mut self, message: &InboundMessage) -> gamehall_sessions::Result<SessionFlow> {
        let Some(index) = self.current else {
            return Ok(SessionFlow::Continue);
        };
        if message.is_direct || !self.questions[index].is_answered_by(&message.content) {
            return Ok(SessionFlow::Continue);
        }

        let score = self.scores.entry(message.author.id).or_default();
        score.name = message.author.name.clone();
        score.points += 1;
        debug!(channel = %self.channel, user = %message.author.id, "trivia answer accepted");
        self.outbound
            .send_text(self.channel, &format!("{} is correct!", message.author.name))
            .await?;

        if self.ask_next().await? {
            Ok(SessionFlow::Continue)
        } else {
            self.finish().await?;
            Ok(SessionFlow::End)
        }
    }
}

#[async_trait]
impl Session for TriviaSession {
    fn kind(&self) -> &'static str {
        "trivia"
    }

    async fn handle_event(&mut self, event: &InboundEvent) -> gamehall_sessions::Result<SessionFlow> {
        match event {
            InboundEvent::MessageReceived(message) => self.on_message(message).await,
            _ => Ok(SessionFlow::Continue),
        }
    }

    async fn on_end(&mut self) -> gamehall_sessions::Result<()> {
        self.finish().await
    }

    fn render_state(&self) -> String {
        format!(
            "Question {}/{}\n{}",
            self.asked,
            self.questions.len(),
            self.scoreboard()
        )
    }
}

/// Runs trivia rounds, at most one per channel.
pub struct TriviaService {
    data: Arc<TriviaData>,
    config: TriviaConfig,
    outbound: Arc<dyn ChannelOutbound>,
    rounds: SessionRegistry<TriviaSession>,
}

impl TriviaService {
    pub fn new(
        data: TriviaData,
        config: TriviaConfig,
        bus: EventBus,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Self {
        info!(questions = data.len(), "trivia service created");
        Self {
            data: Arc::new(data),
            config,
            outbound,
            rounds: SessionRegistry::new("trivia", bus),
        }
    }

    pub fn data(&self) -> &TriviaData {
        &self.data
    }

    pub fn rounds(&self) -> &SessionRegistry<TriviaSession> {
        &self.rounds
    }

    /// Start a round in `channel` and ask its first question.
    ///
    /// Fails if the channel already has a round running.
    pub async fn start(&self, channel: ChannelId) -> Result<()> {
        if self.data.is_empty() {
            return Err(Error::NoQuestions);
        }
        let key = SessionKey::Channel(channel);
        let session = TriviaSession::new(
            channel,
            &self.data,
            self.config.questions_per_round,
            Arc::clone(&self.outbound),
        );
        self.rounds.register(key, session)?;

        let Some(mut round) = self.rounds.lock(&key).await else {
            return Ok(());
        };
        if let Err(e) = round.ask_next().await {
            round.complete();
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop the round in `channel`, posting the final scores.
    pub async fn stop(&self, channel: ChannelId) -> Result<bool> {
        Ok(self.rounds.end(&SessionKey::Channel(channel)).await?)
    }

    pub fn is_running(&self, channel: ChannelId) -> bool {
        self.rounds.contains(&SessionKey::Channel(channel))
    }

    pub async fn scoreboard(&self, channel: ChannelId) -> Option<String> {
        self.rounds.render(&SessionKey::Channel(channel)).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        gamehall_channels::RecordingOutbound,
        gamehall_common::{MessageId, UserRef},
    };

    const CHAN: ChannelId = ChannelId(30);

    fn data() -> TriviaData {
        TriviaData::from([
            ("Capital of France?".into(), vec!["Paris".into()]),
            ("2 + 2?".into(), vec!["4".into(), "four".into()]),
            ("Color of the sky?".into(), vec!["blue".into()]),
        ])
    }

    fn answer_for(question: &str) -> &'static str {
        match question {
            "Capital of France?" => "  paris ",
            "2 + 2?" => "FOUR",
            _ => "Blue",
        }
    }

    fn said(author: u64, content: &str) -> InboundEvent {
        InboundEvent::MessageReceived(InboundMessage {
            id: MessageId(author),
            channel_id: CHAN,
            guild_id: None,
            author: UserRef::new(author, format!("p{author}")),
            content: content.into(),
            is_direct: false,
            roles: Vec::new(),
        })
    }

    #[test]
    fn answers_ignore_case_beyond_ascii() {
        let question = Question {
            text: "Largest Swiss city?".into(),
            answers: vec!["Zürich".into()],
        };
        assert!(question.is_answered_by("zürich"));
        assert!(question.is_answered_by(" ZÜRICH "));
        assert!(!question.is_answered_by("Zurich"));
    }

    #[tokio::test]
    async fn wrong_answers_do_not_advance() {
        let outbound = Arc::new(RecordingOutbound::new());
        let mut round = TriviaSession::new(CHAN, &data(), 3, outbound);
        round.ask_next().await.unwrap();
        let before = round.current_question().unwrap().to_string();

        round.handle_event(&said(1, "no idea")).await.unwrap();
        assert_eq!(round.current_question().unwrap(), before);
        assert_eq!(round.points(UserId(1)), 0);
    }

    #[tokio::test]
    async fn round_scores_and_ends_after_limit() {
        let outbound = Arc::new(RecordingOutbound::new());
        let mut round = TriviaSession::new(CHAN, &data(), 2, outbound.clone());
        assert_eq!(round.round_length(), 2);
        round.ask_next().await.unwrap();

        let first = answer_for(round.current_question().unwrap());
        assert_eq!(
            round.handle_event(&said(1, first)).await.unwrap(),
            SessionFlow::Continue
        );
        let second = answer_for(round.current_question().unwrap());
        assert_eq!(
            round.handle_event(&said(2, second)).await.unwrap(),
            SessionFlow::End
        );
        assert_eq!(round.points(UserId(1)), 1);
        assert_eq!(round.points(UserId(2)), 1);
        assert!(
            outbound
                .texts_in(CHAN)
                .last()
                .unwrap()
                .starts_with("Trivia is over.")
        );
    }

    #[tokio::test]
    async fn service_holds_one_round_per_channel() {
        let bus = EventBus::new();
        let outbound = Arc::new(RecordingOutbound::new());
        let service = TriviaService::new(data(), TriviaConfig::default(), bus.clone(), outbound.clone());

        service.start(CHAN).await.unwrap();
        assert!(service.is_running(CHAN));
        assert!(service.start(CHAN).await.unwrap_err().is_already_active());

        assert!(service.stop(CHAN).await.unwrap());
        assert!(!service.is_running(CHAN));
        assert_eq!(bus.subscriber_count(), 0);
        service.start(CHAN).await.unwrap();
    }

    #[tokio::test]
    async fn empty_data_refuses_to_start() {
        let service = TriviaService::new(
            TriviaData::new(),
            TriviaConfig::default(),
            EventBus::new(),
            Arc::new(RecordingOutbound::new()),
        );
        assert!(matches!(service.start(CHAN).await, Err(Error::NoQuestions)));
    }

    #[test]
    fn loads_question_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trivia.json");
        std::fs::write(&path, r#"{"Q?": ["a", "b"]}"#).unwrap();
        let data = load_questions(&path).unwrap();
        assert_eq!(data["Q?"], vec!["a", "b"]);

        let missing = load_questions(&dir.path().join("nope.json")).unwrap_err();
        assert!(missing.to_string().contains("failed to read trivia questions"));
    }
}
