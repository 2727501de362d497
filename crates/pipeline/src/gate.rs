//! Transcription gate
//!
//! Decides whether a transcribed utterance is worth forwarding to the
//! chat backend. Cheap text heuristics, applied in a fixed order:
//! too-short and filler utterances are dropped, questions and direct
//! address always pass, everything else is sampled against a configured
//! acceptance probability.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Utterances shorter than this (trimmed chars) are rejected
    pub min_chars: usize,
    /// Length at which an utterance counts as "long"
    pub long_utterance_chars: usize,
    /// Acceptance probability for long utterances
    pub accept_long_prob: f64,
    /// Acceptance probability for everything else
    pub accept_short_prob: f64,
    /// Respond to everything, skipping all checks. Off by default;
    /// interactive-testing knob only.
    pub accept_all: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_chars: 3,
            long_utterance_chars: 20,
            accept_long_prob: 0.8,
            accept_short_prob: 0.4,
            accept_all: false,
        }
    }
}

static FILLER_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "um", "umm", "uh", "uhh", "er", "err", "hmm", "hm", "mm", "mhm", "ah", "oh", "ok", "okay",
        "yeah", "yep", "yes", "no", "nah", "huh", "sure", "right", "cool", "nice", "lol",
    ]
    .into_iter()
    .collect()
});

static ADDRESS_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["hey", "hi", "hello", "ai", "assistant", "bot"]
        .into_iter()
        .collect()
});

/// Two-word interrogative/modal openers, checked before single words.
const INTERROGATIVE_PHRASES: &[&str] = &["do you", "are you", "did you", "is it", "have you"];

const INTERROGATIVE_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could", "would", "will",
    "should", "does", "is", "are",
];

/// Outcome of a gate evaluation, with the rule that decided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// `accept_all` bypass is on
    Bypassed,
    /// Contains a question mark
    Question,
    /// Starts with an interrogative or modal word
    Interrogative,
    /// Contains a direct-address token
    DirectAddress,
    /// Passed the probabilistic policy
    Sampled,
    /// Below the minimum length
    TooShort,
    /// Exact filler-word match
    Filler,
    /// Failed the probabilistic policy
    SampledOut,
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(
            self,
            GateDecision::Bypassed
                | GateDecision::Question
                | GateDecision::Interrogative
                | GateDecision::DirectAddress
                | GateDecision::Sampled
        )
    }
}

/// Response-likelihood gate
pub struct TranscriptionGate {
    config: GateConfig,
}

impl TranscriptionGate {
    pub fn new(config: GateConfig) -> Self {
        if config.accept_all {
            tracing::warn!("transcription gate bypass is ON; responding to every utterance");
        }
        Self { config }
    }

    /// Evaluate an utterance against the gate policy.
    pub fn evaluate(&self, text: &str) -> GateDecision {
        if self.config.accept_all {
            return GateDecision::Bypassed;
        }

        let trimmed = text.trim();
        let folded = trimmed.to_lowercase();

        if trimmed.chars().count() < self.config.min_chars {
            return GateDecision::TooShort;
        }

        if FILLER_WORDS.contains(folded.as_str()) {
            return GateDecision::Filler;
        }

        if trimmed.contains('?') {
            return GateDecision::Question;
        }

        if Self::starts_interrogative(&folded) {
            return GateDecision::Interrogative;
        }

        if Self::addresses_the_bot(&folded) {
            return GateDecision::DirectAddress;
        }

        let probability = if folded.chars().count() >= self.config.long_utterance_chars {
            self.config.accept_long_prob
        } else {
            self.config.accept_short_prob
        };

        if rand::thread_rng().gen_bool(probability.clamp(0.0, 1.0)) {
            GateDecision::Sampled
        } else {
            GateDecision::SampledOut
        }
    }

    /// Should this utterance get a reply?
    pub fn should_respond(&self, text: &str) -> bool {
        let decision = self.evaluate(text);
        tracing::debug!(?decision, chars = text.trim().len(), "gate decision");
        decision.is_accept()
    }

    fn starts_interrogative(folded: &str) -> bool {
        if INTERROGATIVE_PHRASES
            .iter()
            .any(|phrase| folded.starts_with(phrase))
        {
            return true;
        }
        match folded.split_whitespace().next() {
            Some(first) => {
                // Leading alphanumeric prefix, so "what's" matches "what".
                let head: String = first.chars().take_while(|c| c.is_alphanumeric()).collect();
                INTERROGATIVE_WORDS.contains(&head.as_str())
            }
            None => false,
        }
    }

    fn addresses_the_bot(folded: &str) -> bool {
        folded
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
            .any(|word| ADDRESS_TOKENS.contains(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> TranscriptionGate {
        TranscriptionGate::new(GateConfig::default())
    }

    #[test]
    fn rejects_short_text() {
        assert_eq!(gate().evaluate("hi"), GateDecision::TooShort);
        assert_eq!(gate().evaluate("  a "), GateDecision::TooShort);
    }

    #[test]
    fn rejects_fillers() {
        assert_eq!(gate().evaluate("yeah"), GateDecision::Filler);
        assert_eq!(gate().evaluate("  Okay  "), GateDecision::Filler);
        assert_eq!(gate().evaluate("HMM"), GateDecision::Filler);
    }

    #[test]
    fn accepts_questions() {
        assert_eq!(gate().evaluate("so that's it then?"), GateDecision::Question);
    }

    #[test]
    fn accepts_interrogative_openers() {
        assert_eq!(gate().evaluate("what time is it"), GateDecision::Interrogative);
        assert_eq!(
            gate().evaluate("do you know the answer"),
            GateDecision::Interrogative
        );
        assert_eq!(
            gate().evaluate("could we maybe try again"),
            GateDecision::Interrogative
        );
        assert_eq!(
            gate().evaluate("what's the weather like"),
            GateDecision::Interrogative
        );
    }

    #[test]
    fn accepts_direct_address() {
        assert_eq!(
            gate().evaluate("bot, play the next one"),
            GateDecision::DirectAddress
        );
        assert_eq!(
            gate().evaluate("tell me something, assistant"),
            GateDecision::DirectAddress
        );
    }

    #[test]
    fn bypass_accepts_everything() {
        let gate = TranscriptionGate::new(GateConfig {
            accept_all: true,
            ..Default::default()
        });
        assert_eq!(gate.evaluate("um"), GateDecision::Bypassed);
        assert!(gate.should_respond(""));
    }

    #[test]
    fn long_declaratives_accepted_at_roughly_the_long_rate() {
        let gate = gate();
        // 50 chars, no question/address/interrogative trigger.
        let sentence = "the train left the station ten minutes behind plan";
        assert!(sentence.len() >= 20);

        let accepted = (0..1000)
            .filter(|_| gate.evaluate(sentence).is_accept())
            .count();

        // p = 0.8, n = 1000: allow generous sampling error.
        assert!(
            (740..=860).contains(&accepted),
            "acceptance rate off: {accepted}/1000"
        );
    }

    #[test]
    fn short_declaratives_accepted_at_roughly_the_short_rate() {
        let gate = gate();
        let sentence = "went home early";

        let accepted = (0..1000)
            .filter(|_| gate.evaluate(sentence).is_accept())
            .count();

        // p = 0.4, n = 1000.
        assert!(
            (340..=460).contains(&accepted),
            "acceptance rate off: {accepted}/1000"
        );
    }

    #[test]
    fn degenerate_probabilities_are_deterministic() {
        let always = TranscriptionGate::new(GateConfig {
            accept_long_prob: 1.0,
            accept_short_prob: 1.0,
            ..Default::default()
        });
        assert_eq!(always.evaluate("went home early"), GateDecision::Sampled);

        let never = TranscriptionGate::new(GateConfig {
            accept_long_prob: 0.0,
            accept_short_prob: 0.0,
            ..Default::default()
        });
        assert_eq!(never.evaluate("went home early"), GateDecision::SampledOut);
    }
}
