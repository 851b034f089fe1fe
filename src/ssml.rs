//! SSML wrapping for avatar speech synthesis.

use crate::config::AvatarConfig;

/// Formats raw text segments into the SSML payload the avatar engine's
/// synthesis path expects. Language and voice are configuration inputs.
#[derive(Debug, Clone)]
pub struct SsmlFormatter {
    language: String,
    voice: String,
}

impl SsmlFormatter {
    /// Create a formatter for the given avatar settings and language code.
    #[must_use]
    pub fn new(config: &AvatarConfig, language: &str) -> Self {
        Self {
            language: language.to_owned(),
            voice: config.voice.clone(),
        }
    }

    /// Wrap a text segment in SSML markup.
    ///
    /// The empty string is valid input: the end-of-turn sentinel is an
    /// empty utterance, and the engine keys off its `is_last` flag
    /// rather than the markup content.
    #[must_use]
    pub fn format(&self, text: &str) -> String {
        let escaped = escape_xml(text);
        if self.voice.is_empty() {
            format!("<speak xml:lang=\"{}\">{escaped}</speak>", self.language)
        } else {
            format!(
                "<speak xml:lang=\"{}\"><voice name=\"{}\">{escaped}</voice></speak>",
                self.language, self.voice
            )
        }
    }
}

/// Escape characters with meaning in XML so model output cannot break
/// the markup.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
