//! Rolling transcript log
//!
//! Merges partial transcription events from both directions into a single
//! newest-first text buffer under a fixed character budget.

/// Which side of the conversation produced a transcript fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The local user's speech, transcribed by the service
    User,
    /// The synthesized voice, transcribed by the service
    Bot,
}

impl Speaker {
    const fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Bot => "Bot",
        }
    }
}

/// Bounded newest-first transcript buffer
///
/// Entries are prepended; once the budget is exceeded the oldest text is
/// silently truncated. The cap counts characters, not bytes, so truncation
/// never splits a multi-byte character.
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    text: String,
    cap: usize,
}

impl TranscriptLog {
    /// Create an empty log with the given character budget
    #[must_use]
    pub const fn new(cap: usize) -> Self {
        Self {
            text: String::new(),
            cap,
        }
    }

    /// Prepend one partial transcript fragment, trimming past the budget
    pub fn push(&mut self, speaker: Speaker, fragment: &str) {
        let mut next = String::with_capacity(self.text.len() + fragment.len() + 8);
        next.push_str(speaker.label());
        next.push_str(": ");
        next.push_str(fragment);
        next.push('\n');
        next.push_str(&self.text);
        if next.chars().count() > self.cap {
            next = next.chars().take(self.cap).collect();
        }
        self.text = next;
    }

    /// The merged transcript, newest entry first
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current length in characters
    #[must_use]
    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Discard all stored text
    pub fn clear(&mut self) {
        self.text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_prepended() {
        let mut log = TranscriptLog::new(500);
        log.push(Speaker::User, "hello there");
        log.push(Speaker::Bot, "hi!");

        assert!(log.text().starts_with("Bot: hi!\n"));
        assert!(log.text().contains("You: hello there\n"));
    }

    #[test]
    fn cap_is_exact_and_keeps_newest() {
        let mut log = TranscriptLog::new(500);
        for i in 0..40 {
            log.push(Speaker::Bot, &format!("fragment number {i} with some padding text"));
        }

        assert_eq!(log.len_chars(), 500);
        assert!(log.text().starts_with("Bot: fragment number 39"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut log = TranscriptLog::new(12);
        log.push(Speaker::Bot, "héllo wörld with ümlauts");

        assert_eq!(log.len_chars(), 12);
        assert!(log.text().starts_with("Bot: héllo"));
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = TranscriptLog::new(500);
        log.push(Speaker::User, "anything");
        log.clear();
        assert!(log.text().is_empty());
    }
}
