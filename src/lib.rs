//! Mira: streaming avatar speech relay.
//!
//! Converts a growing LLM reply stream into a sequence of bounded,
//! speakable utterances dispatched to an external avatar rendering
//! engine:
//! Token stream → segmentation → SSML → `speak` commands
//!
//! # Architecture
//!
//! The relay drives one turn at a time through independent pieces:
//! - **Segmentation**: incremental sentence-boundary cuts over the
//!   unconsumed buffer (`segment`)
//! - **Dispatch**: ordered speak commands with first/last turn framing
//!   (`relay`)
//! - **Readiness**: interrupt + settle delay when the avatar is still
//!   mid-utterance (`avatar`)
//! - **Transport**: streaming chat backend client (`llm`)
//! - **History**: append-only conversation record (`history`)

pub mod avatar;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod relay;
pub mod segment;
pub mod ssml;

pub use avatar::{AvatarEngine, AvatarState, Utterance};
pub use config::MiraConfig;
pub use error::{RelayError, Result};
pub use history::{ConversationLog, ConversationTurn, Role};
pub use relay::SpeechRelay;
pub use segment::Segmenter;
pub use ssml::SsmlFormatter;
