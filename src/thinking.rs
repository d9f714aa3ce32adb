//! In-band thinking-tag extraction.
//!
//! Some backends have no native reasoning channel and instead wrap
//! intermediate reasoning in literal `<thinking>...</thinking>` tags inside
//! ordinary content tokens. Tag boundaries can be split arbitrarily across
//! chunks, so the parser keeps a carry-over buffer holding at most a partial
//! tag between chunks.
//!
//! The partition is split-point independent: for any chunking of the same
//! byte sequence, the concatenated `Content` outputs and the concatenated
//! `Thinking` outputs are identical to a single-pass run over the whole
//! string.

const OPEN_TAG: &str = "<thinking>";
const CLOSE_TAG: &str = "</thinking>";

/// Which side of the tag boundary the parser is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagMode {
    InContent,
    InThinking,
}

/// Output of one parser step: visible text or reasoning text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    Content(String),
    Thinking(String),
}

/// Incremental `<thinking>` tag parser. Created fresh per stream, fed
/// chunk-by-chunk, flushed once at stream end. Never persisted.
#[derive(Debug)]
pub struct TagParser {
    mode: TagMode,
    carry: String,
}

impl Default for TagParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TagParser {
    pub fn new() -> Self {
        Self {
            mode: TagMode::InContent,
            carry: String::new(),
        }
    }

    fn active_tag(&self) -> &'static str {
        match self.mode {
            TagMode::InContent => OPEN_TAG,
            TagMode::InThinking => CLOSE_TAG,
        }
    }

    fn wrap(&self, text: String) -> TagEvent {
        match self.mode {
            TagMode::InContent => TagEvent::Content(text),
            TagMode::InThinking => TagEvent::Thinking(text),
        }
    }

    /// Feed one chunk, returning the events it completes.
    pub fn push(&mut self, chunk: &str) -> Vec<TagEvent> {
        self.carry.push_str(chunk);
        let mut events = Vec::new();

        loop {
            let tag = self.active_tag();
            if let Some(idx) = self.carry.find(tag) {
                if idx > 0 {
                    let before: String = self.carry.drain(..idx).collect();
                    events.push(self.wrap(before));
                    self.carry.drain(..tag.len());
                } else {
                    self.carry.drain(..tag.len());
                }
                self.mode = match self.mode {
                    TagMode::InContent => TagMode::InThinking,
                    TagMode::InThinking => TagMode::InContent,
                };
                continue;
            }

            // No full tag in the buffer. Keep the longest buffer tail that is
            // a proper prefix of the tag (a possibly split tag) and emit the
            // rest.
            let keep = split_tag_tail(&self.carry, tag);
            let emit_len = self.carry.len() - keep;
            if emit_len > 0 {
                let text: String = self.carry.drain(..emit_len).collect();
                events.push(self.wrap(text));
            }
            break;
        }

        events
    }

    /// Flush at stream end. A held partial tag is emitted as literal text in
    /// the current mode, matching what a single pass over the concatenated
    /// stream would produce.
    pub fn finish(&mut self) -> Vec<TagEvent> {
        if self.carry.is_empty() {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.carry);
        vec![self.wrap(rest)]
    }
}

/// Length of the longest proper prefix of `tag` that the buffer ends with.
/// Tags are ASCII, so the returned length always falls on a char boundary.
fn split_tag_tail(buf: &str, tag: &str) -> usize {
    let max = tag.len().saturating_sub(1).min(buf.len());
    for k in (1..=max).rev() {
        if buf.ends_with(&tag[..k]) {
            return k;
        }
    }
    0
}
