//! Dispatch scheduling: turns a streaming LLM reply into a totally
//! ordered sequence of speak commands with first/last framing.
//!
//! One turn runs as a single logical task. The only suspension points
//! are waiting for the next reply chunk and the settle delay inside the
//! readiness gate, so dispatched utterances always follow left-to-right
//! text order: the buffer is only appended to, and only a contiguous
//! prefix is ever cut.

use crate::avatar::{self, AvatarEngine, Utterance};
use crate::config::MiraConfig;
use crate::error::Result;
use crate::history::{ConversationLog, Role};
use crate::segment::Segmenter;
use crate::ssml::SsmlFormatter;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Dispatch state across one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    /// No utterance dispatched yet; the next one carries `is_first`.
    AwaitingFirst,
    /// At least one content utterance dispatched.
    Streaming,
    /// Sentinel emitted; the turn is complete.
    Drained,
}

/// Schedules speak commands for streaming replies.
///
/// One relay drives one avatar. Turns are strictly serialized:
/// [`SpeechRelay::run_turn`] takes `&mut self`, so a second turn cannot
/// start while one is in flight.
pub struct SpeechRelay {
    config: MiraConfig,
    avatar: Arc<dyn AvatarEngine>,
    segmenter: Segmenter,
    log: ConversationLog,
    partial_tx: Option<watch::Sender<String>>,
}

impl SpeechRelay {
    /// Create a relay for the given avatar.
    #[must_use]
    pub fn new(config: MiraConfig, avatar: Arc<dyn AvatarEngine>) -> Self {
        let segmenter = Segmenter::new(&config.segmenter);
        Self {
            config,
            avatar,
            segmenter,
            log: ConversationLog::new(),
            partial_tx: None,
        }
    }

    /// Publish the accumulating partial reply to `tx` while streaming.
    ///
    /// The published value is reset to the empty string when a turn
    /// completes or fails, so observers never display a stale reply.
    #[must_use]
    pub fn with_partial_updates(mut self, tx: watch::Sender<String>) -> Self {
        self.partial_tx = Some(tx);
        self
    }

    /// The conversation recorded so far.
    #[must_use]
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Run one turn: record the user message, gate on avatar readiness,
    /// then stream `chunks` out to the avatar as bounded utterances.
    ///
    /// Returns the full assistant reply. Empty user input or a
    /// disconnected avatar is a silent no-op returning an empty string,
    /// with nothing recorded.
    ///
    /// # Errors
    ///
    /// Propagates reply stream failures. On failure no sentinel is
    /// dispatched and no assistant turn is recorded; utterances already
    /// sent to the avatar are not retracted — the avatar may have
    /// partially spoken a truncated reply.
    pub async fn run_turn<S>(&mut self, user_text: &str, chunks: S) -> Result<String>
    where
        S: Stream<Item = Result<String>>,
    {
        let user_text = user_text.trim();
        if user_text.is_empty() || !self.avatar.connected() {
            return Ok(String::new());
        }

        info!("turn started: {user_text}");
        self.log.append(Role::User, user_text);
        self.publish_partial("");

        match self.drive(chunks).await {
            Ok(full_reply) => {
                self.log.append(Role::Assistant, full_reply.clone());
                self.publish_partial("");
                Ok(full_reply)
            }
            Err(e) => {
                warn!("reply stream failed mid-turn: {e}");
                self.publish_partial("");
                Err(e)
            }
        }
    }

    /// Consume the chunk stream and dispatch utterances in cut order.
    async fn drive<S>(&mut self, chunks: S) -> Result<String>
    where
        S: Stream<Item = Result<String>>,
    {
        let settle = Duration::from_millis(self.config.avatar.interrupt_settle_ms);
        avatar::ensure_ready(self.avatar.as_ref(), settle).await;

        let formatter = SsmlFormatter::new(&self.config.avatar, &self.config.llm.language);
        let mut state = TurnState::AwaitingFirst;
        let mut buffer = String::new();
        let mut full_reply = String::new();
        let mut dispatched = 0usize;

        tokio::pin!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            buffer.push_str(&chunk);
            full_reply.push_str(&chunk);
            self.publish_partial(&full_reply);

            // Take every cut the segmenter can find before waiting for
            // the next chunk.
            while let Some(cut) = self.segmenter.next_cut(&buffer) {
                let content: String = buffer.drain(..cut).collect();
                self.dispatch(
                    &formatter,
                    &Utterance {
                        content,
                        is_first: state == TurnState::AwaitingFirst,
                        is_last: false,
                    },
                );
                state = TurnState::Streaming;
                dispatched += 1;
            }
        }

        // Trailing fragment that never reached a cut point.
        if !buffer.is_empty() {
            self.dispatch(
                &formatter,
                &Utterance {
                    content: std::mem::take(&mut buffer),
                    is_first: state == TurnState::AwaitingFirst,
                    is_last: false,
                },
            );
            state = TurnState::Streaming;
            dispatched += 1;
        }

        // Sentinel: tells the engine the turn is over.
        self.dispatch(
            &formatter,
            &Utterance {
                content: String::new(),
                is_first: false,
                is_last: true,
            },
        );
        state = TurnState::Drained;

        info!(state = ?state, "reply drained, {dispatched} content utterances dispatched");
        Ok(full_reply)
    }

    fn dispatch(&self, formatter: &SsmlFormatter, utterance: &Utterance) {
        let markup = formatter.format(&utterance.content);
        debug!(
            is_first = utterance.is_first,
            is_last = utterance.is_last,
            "speak: {}",
            utterance.content
        );
        self.avatar.speak(&markup, utterance.is_first, utterance.is_last);
    }

    fn publish_partial(&self, text: &str) {
        if let Some(tx) = &self.partial_tx {
            let _ = tx.send(text.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::avatar::AvatarState;
    use crate::error::RelayError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingAvatar {
        calls: Mutex<Vec<(String, bool, bool)>>,
        state: Mutex<Option<AvatarState>>,
        interrupts: AtomicUsize,
        disconnected: bool,
    }

    impl RecordingAvatar {
        fn speaking() -> Self {
            Self {
                state: Mutex::new(Some(AvatarState::Speaking)),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, bool, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AvatarEngine for RecordingAvatar {
        fn speak(&self, markup: &str, is_first: bool, is_last: bool) {
            self.calls
                .lock()
                .unwrap()
                .push((markup.to_owned(), is_first, is_last));
        }

        fn interrupt(&self) {
            self.interrupts.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = Some(AvatarState::Idle);
        }

        fn state(&self) -> AvatarState {
            self.state.lock().unwrap().unwrap_or_default()
        }

        fn connected(&self) -> bool {
            !self.disconnected
        }
    }

    fn relay_with(avatar: Arc<RecordingAvatar>) -> SpeechRelay {
        let mut config = MiraConfig::default();
        config.llm.language = "zh".to_owned();
        SpeechRelay::new(config, avatar)
    }

    fn chunk_stream(
        chunks: Vec<Result<String>>,
    ) -> impl Stream<Item = Result<String>> {
        tokio_stream::iter(chunks)
    }

    fn ok_chunks(chunks: &[&str]) -> Vec<Result<String>> {
        chunks.iter().map(|c| Ok((*c).to_owned())).collect()
    }

    #[tokio::test]
    async fn turn_framing_first_middle_sentinel() {
        let avatar = Arc::new(RecordingAvatar::default());
        let mut relay = relay_with(avatar.clone());

        // Three chunks forming two natural sentences.
        let reply = relay
            .run_turn(
                "打个招呼",
                chunk_stream(ok_chunks(&["你好。今", "天天气", "很不错"])),
            )
            .await
            .unwrap();

        assert_eq!(reply, "你好。今天天气很不错");

        let calls = avatar.calls();
        assert_eq!(calls.len(), 3);
        // First cut segment.
        assert!(calls[0].0.contains("你好。"));
        assert!(calls[0].1 && !calls[0].2);
        // Trailing fragment flushed at stream end.
        assert!(calls[1].0.contains("今天天气很不错"));
        assert!(!calls[1].1 && !calls[1].2);
        // Empty sentinel closes the turn.
        assert!(calls[2].0.contains("<speak"));
        assert!(!calls[2].1 && calls[2].2);

        // One user and one assistant entry; assistant equals the
        // concatenation of all chunks.
        let turns = relay.log().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "你好。今天天气很不错");
    }

    #[tokio::test]
    async fn single_segment_turn_carries_is_first_on_flush() {
        let avatar = Arc::new(RecordingAvatar::default());
        let mut relay = relay_with(avatar.clone());

        relay
            .run_turn("hi", chunk_stream(ok_chunks(&["Hi there"])))
            .await
            .unwrap();

        let calls = avatar.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].1 && !calls[0].2);
        assert!(!calls[1].1 && calls[1].2);
    }

    #[tokio::test]
    async fn multiple_cuts_within_one_chunk() {
        let avatar = Arc::new(RecordingAvatar::default());
        let mut relay = relay_with(avatar.clone());

        relay
            .run_turn(
                "说两句",
                chunk_stream(ok_chunks(&["第一句话。第二句话。再来一点"])),
            )
            .await
            .unwrap();

        let calls = avatar.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].0.contains("第一句话。"));
        assert!(calls[1].0.contains("第二句话。"));
        assert!(calls[2].0.contains("再来一点"));
        assert!(calls[3].2);
        // Only the very first utterance carries is_first.
        assert!(calls[0].1);
        assert!(!calls[1].1 && !calls[2].1 && !calls[3].1);
    }

    #[tokio::test]
    async fn failure_mid_stream_keeps_dispatched_utterances() {
        let avatar = Arc::new(RecordingAvatar::default());
        let mut relay = relay_with(avatar.clone());

        let chunks = vec![
            Ok("你好。今天".to_owned()),
            Err(RelayError::Llm("connection reset".to_owned())),
        ];
        let result = relay.run_turn("打个招呼", chunk_stream(chunks)).await;
        assert!(matches!(result, Err(RelayError::Llm(_))));

        // The cut dispatched before the failure is not retracted, and
        // no sentinel follows it.
        let calls = avatar.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.contains("你好。"));
        assert!(!calls[0].2);

        // The turn stays user-only.
        let turns = relay.log().turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let avatar = Arc::new(RecordingAvatar::default());
        let mut relay = relay_with(avatar.clone());

        let reply = relay
            .run_turn("   ", chunk_stream(ok_chunks(&["ignored"])))
            .await
            .unwrap();

        assert!(reply.is_empty());
        assert!(avatar.calls().is_empty());
        assert!(relay.log().is_empty());
    }

    #[tokio::test]
    async fn disconnected_avatar_is_a_no_op() {
        let avatar = Arc::new(RecordingAvatar {
            disconnected: true,
            ..RecordingAvatar::default()
        });
        let mut relay = relay_with(avatar.clone());

        let reply = relay
            .run_turn("hello", chunk_stream(ok_chunks(&["ignored"])))
            .await
            .unwrap();

        assert!(reply.is_empty());
        assert!(avatar.calls().is_empty());
        assert!(relay.log().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn speaking_avatar_is_interrupted_before_first_utterance() {
        let avatar = Arc::new(RecordingAvatar::speaking());
        let mut relay = relay_with(avatar.clone());

        relay
            .run_turn("打断一下", chunk_stream(ok_chunks(&["好的。"])))
            .await
            .unwrap();

        assert_eq!(avatar.interrupts.load(Ordering::SeqCst), 1);
        // Dispatch still happened after the settle delay.
        assert!(!avatar.calls().is_empty());
    }

    #[tokio::test]
    async fn idle_avatar_is_not_interrupted() {
        let avatar = Arc::new(RecordingAvatar::default());
        let mut relay = relay_with(avatar.clone());

        relay
            .run_turn("你好", chunk_stream(ok_chunks(&["好的。"])))
            .await
            .unwrap();

        assert_eq!(avatar.interrupts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_reply_is_published_and_cleared() {
        let avatar = Arc::new(RecordingAvatar::default());
        let (tx, rx) = watch::channel(String::new());
        let mut relay = relay_with(avatar).with_partial_updates(tx);

        relay
            .run_turn("hi", chunk_stream(ok_chunks(&["Hello there"])))
            .await
            .unwrap();

        // Cleared once the turn completes.
        assert_eq!(*rx.borrow(), "");
    }

    #[tokio::test]
    async fn partial_reply_cleared_on_failure() {
        let avatar = Arc::new(RecordingAvatar::default());
        let (tx, rx) = watch::channel(String::new());
        let mut relay = relay_with(avatar).with_partial_updates(tx);

        let chunks = vec![
            Ok("partial text".to_owned()),
            Err(RelayError::Llm("boom".to_owned())),
        ];
        let _ = relay.run_turn("hi", chunk_stream(chunks)).await;

        assert_eq!(*rx.borrow(), "");
    }

    #[tokio::test]
    async fn empty_stream_still_emits_sentinel() {
        let avatar = Arc::new(RecordingAvatar::default());
        let mut relay = relay_with(avatar.clone());

        let reply = relay
            .run_turn("hello", chunk_stream(Vec::new()))
            .await
            .unwrap();

        assert!(reply.is_empty());
        let calls = avatar.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].1 && calls[0].2);
        // The assistant entry is recorded even when empty: the stream
        // drained successfully.
        assert_eq!(relay.log().len(), 2);
    }
}
