//! Avatar engine boundary: animation state, the speak/interrupt
//! surface, and the readiness gate that serializes new speech against
//! an avatar that may still be mid-utterance.

use std::time::Duration;
use tracing::info;

/// Animation state reported by the external avatar engine.
///
/// The engine owns this value; the relay only reads it and may request
/// a transition via [`AvatarEngine::interrupt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvatarState {
    /// Standing by, not animating speech.
    #[default]
    Idle,
    /// Playing the "thinking" animation.
    Thinking,
    /// Mid-utterance.
    Speaking,
    /// Any state the SDK reports that the relay does not model.
    Other,
}

impl AvatarState {
    /// Map the SDK's state-change string onto the modeled states.
    #[must_use]
    pub fn from_sdk(state: &str) -> Self {
        match state {
            "idle" => Self::Idle,
            "think" => Self::Thinking,
            "speak" => Self::Speaking,
            _ => Self::Other,
        }
    }
}

/// One bounded utterance dispatched to the avatar for synthesis.
///
/// Exactly one utterance per turn carries `is_first`, and the turn is
/// closed by a single empty-content sentinel carrying `is_last`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Raw segment text before markup. Empty for the sentinel.
    pub content: String,
    /// True for the first utterance dispatched this turn.
    pub is_first: bool,
    /// True only for the sentinel that closes the turn.
    pub is_last: bool,
}

/// Narrow surface the relay needs from the external avatar engine.
///
/// `speak` is fire-and-forget: the engine provides no acknowledgement
/// channel, and the relay never waits for synthesis to finish.
pub trait AvatarEngine: Send + Sync {
    /// Dispatch one SSML utterance for synthesis, tagged with the turn
    /// framing flags the engine uses for turn-taking animation.
    fn speak(&self, markup: &str, is_first: bool, is_last: bool);

    /// Request that the current utterance stop and the avatar settle
    /// into a neutral pose. Takes effect asynchronously.
    fn interrupt(&self);

    /// Current animation state, readable at any time.
    fn state(&self) -> AvatarState;

    /// Whether an avatar session is connected.
    fn connected(&self) -> bool {
        true
    }
}

/// Wait until the avatar is ready to accept a new reply.
///
/// If the avatar is mid-utterance this requests an interrupt and then
/// sleeps for the settle delay. The engine never confirms that the
/// interrupt completed, so the delay approximates the stop-speaking
/// transition; speech dispatched after it may still overlap the tail of
/// the interrupted utterance if the engine settles slowly. Any other
/// state returns immediately with no side effect.
pub async fn ensure_ready(avatar: &dyn AvatarEngine, settle: Duration) {
    if avatar.state() == AvatarState::Speaking {
        info!("avatar still speaking, requesting interrupt before new turn");
        avatar.interrupt();
        tokio::time::sleep(settle).await;
    }
}
