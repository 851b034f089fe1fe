//! Incremental sentence segmentation for streaming speech dispatch.
//!
//! The relay buffers the LLM reply as it streams in and repeatedly asks
//! the segmenter for the next cut. Cuts land at natural punctuation once
//! a minimum amount of content has accumulated; failing that, a cut is
//! forced after a maximum number of units so utterance latency and the
//! synthesis payload stay bounded.

use crate::config::SegmenterConfig;

/// CJK punctuation that ends a speakable segment on its own.
const CJK_PUNCTUATION: [char; 9] = ['、', '，', '：', '；', '。', '？', '！', '…', '\n'];

/// Latin punctuation that ends a segment only when followed by a space
/// or end of buffer, so decimals and abbreviations stay intact.
const LATIN_PUNCTUATION: [char; 6] = [',', ':', ';', '.', '?', '!'];

/// Decides where a growing text buffer can be cut into a speakable segment.
#[derive(Debug, Clone)]
pub struct Segmenter {
    min_units: usize,
    max_units: usize,
}

impl Segmenter {
    /// Create a segmenter with the configured thresholds.
    #[must_use]
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            min_units: config.min_split_units,
            max_units: config.max_split_units,
        }
    }

    /// Return the byte index of the next cut, or `None` if the buffer
    /// should keep accumulating.
    ///
    /// `text[..cut]` is a complete speakable segment and `text[cut..]`
    /// the remainder; the index always falls on a char boundary. At most
    /// one cut is decided per call — callers re-invoke on the remainder
    /// to find further cuts.
    ///
    /// Content is counted in units: one CJK ideograph, one ASCII digit,
    /// or one contiguous run of ASCII letters each count as a single
    /// unit. Punctuation and everything else count as zero, so a single
    /// unbroken Latin word is never force-broken no matter how long it
    /// grows.
    #[must_use]
    pub fn next_cut(&self, text: &str) -> Option<usize> {
        let mut count = 0usize;
        let mut punct_cut: Option<usize> = None;
        let mut forced_cut: Option<usize> = None;

        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if count >= self.max_units {
                break;
            }

            if is_cjk_ideograph(c) || c.is_ascii_digit() {
                count += 1;
                if count == self.max_units {
                    forced_cut = Some(i + c.len_utf8());
                }
            } else if c.is_ascii_alphabetic() {
                // Consume the whole Latin word as one unit.
                let mut end = i + c.len_utf8();
                while let Some(&(j, d)) = chars.peek() {
                    if !d.is_ascii_alphabetic() {
                        break;
                    }
                    end = j + d.len_utf8();
                    chars.next();
                }
                count += 1;
                if count == self.max_units {
                    forced_cut = Some(end);
                }
            } else if CJK_PUNCTUATION.contains(&c) {
                if count >= self.min_units && punct_cut.is_none() {
                    punct_cut = Some(i + c.len_utf8());
                }
            } else if LATIN_PUNCTUATION.contains(&c) {
                let followed_by_space = match chars.peek() {
                    Some(&(_, d)) => d == ' ',
                    None => true,
                };
                if followed_by_space && count >= self.min_units && punct_cut.is_none() {
                    punct_cut = Some(i + c.len_utf8());
                }
            }
            // Anything else (spaces, symbols, emoji) is skipped uncounted.
        }

        // A punctuation boundary past the minimum beats the forced break.
        let cut = punct_cut.or(forced_cut)?;
        if cut == 0 || cut >= text.len() {
            return None;
        }
        Some(cut)
    }
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}
