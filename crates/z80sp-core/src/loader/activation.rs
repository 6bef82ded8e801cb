//! Host request for a loader session

use heapless::Deque;

const PHRASE_LEN: usize = 26;

/// Sent by the host to start a session without pressing the mode button
pub const ACTIVATION_PHRASE: &[u8; PHRASE_LEN] = b"..helloTeachZ80FlashLoader";

/// Sliding-window matcher for [`ACTIVATION_PHRASE`]
#[derive(Debug, Default)]
pub struct ActivationMatcher {
    window: Deque<u8, PHRASE_LEN>,
}

impl ActivationMatcher {
    /// Create an empty matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns `true` when it completes the phrase
    pub fn update(&mut self, byte: u8) -> bool {
        if self.window.is_full() {
            self.window.pop_front();
        }
        // cannot fail, a slot was freed above
        let _ = self.window.push_back(byte);

        if self.window.iter().eq(ACTIVATION_PHRASE.iter()) {
            self.window.clear();
            return true;
        }
        false
    }

    /// Forget everything seen so far
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(input: &[u8]) -> usize {
        let mut matcher = ActivationMatcher::new();
        input.iter().filter(|&&b| matcher.update(b)).count()
    }

    #[test]
    fn test_phrase() {
        assert_eq!(matches(ACTIVATION_PHRASE), 1);
        assert_eq!(matches(b"xyz...helloTeachZ80FlashLoader\r\n"), 1);
        assert_eq!(matches(b"..helloTeachZ80FlashLoade"), 0);
        assert_eq!(matches(b"..hellOTeachZ80FlashLoader"), 0);
    }

    #[test]
    fn test_match_consumes_window() {
        let mut input = [0u8; 2 * PHRASE_LEN];
        input[..PHRASE_LEN].copy_from_slice(ACTIVATION_PHRASE);
        input[PHRASE_LEN..].copy_from_slice(ACTIVATION_PHRASE);
        assert_eq!(matches(&input), 2);
    }
}
