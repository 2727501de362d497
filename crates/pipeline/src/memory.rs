//! Conversation memory
//!
//! An ordered, bounded rolling history of user and assistant turns,
//! always prepended with the fixed persona instruction. The persona turn
//! is never evicted; everything else drops oldest-first once the cap is
//! exceeded.

use std::collections::VecDeque;

use parking_lot::RwLock;

use voice_relay_core::Turn;

/// Memory configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum stored turns, excluding the system persona turn
    pub history_cap: usize,
    /// Persona instruction pinned as the first turn
    pub persona: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_cap: 10,
            persona: "You are a friendly voice assistant sitting in a group voice channel. \
                      Messages are prefixed with the speaker's name. Reply conversationally, \
                      in two or three short sentences, with no markdown or lists."
                .to_string(),
        }
    }
}

/// Bounded conversation memory
pub struct ConversationMemory {
    system: Turn,
    history_cap: usize,
    turns: RwLock<VecDeque<Turn>>,
}

impl ConversationMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            system: Turn::system(config.persona),
            history_cap: config.history_cap,
            turns: RwLock::new(VecDeque::new()),
        }
    }

    /// Record a user utterance, prefixed with the speaker's name.
    ///
    /// No-op on empty or whitespace-only text.
    pub fn add_user(&self, name: &str, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let mut turns = self.turns.write();
        turns.push_back(Turn::user(format!("{name}: {text}")));
        Self::truncate(&mut turns, self.history_cap);
    }

    /// Record an assistant reply.
    pub fn add_assistant(&self, text: &str) {
        let mut turns = self.turns.write();
        turns.push_back(Turn::assistant(text));
        Self::truncate(&mut turns, self.history_cap);
    }

    fn truncate(turns: &mut VecDeque<Turn>, cap: usize) {
        while turns.len() > cap {
            turns.pop_front();
        }
    }

    /// Ordered history for the chat backend: persona first, then the
    /// rolling window in insertion order.
    pub fn snapshot(&self) -> Vec<Turn> {
        let turns = self.turns.read();
        let mut out = Vec::with_capacity(turns.len() + 1);
        out.push(self.system.clone());
        out.extend(turns.iter().cloned());
        out
    }

    /// Stored turn count, excluding the system persona turn.
    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.read().is_empty()
    }

    /// Drop everything except the persona turn.
    pub fn reset(&self) {
        self.turns.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_relay_core::TurnRole;

    fn memory_with_cap(cap: usize) -> ConversationMemory {
        ConversationMemory::new(MemoryConfig {
            history_cap: cap,
            ..Default::default()
        })
    }

    #[test]
    fn snapshot_starts_with_persona() {
        let memory = memory_with_cap(10);
        memory.add_user("alice", "hello there");

        let snapshot = memory.snapshot();
        assert_eq!(snapshot[0].role, TurnRole::System);
        assert_eq!(snapshot[1].role, TurnRole::User);
        assert_eq!(snapshot[1].content, "alice: hello there");
    }

    #[test]
    fn blank_user_text_is_ignored() {
        let memory = memory_with_cap(10);
        memory.add_user("alice", "   ");
        memory.add_user("alice", "");
        assert_eq!(memory.len(), 0);
    }

    #[test]
    fn evicts_oldest_first_keeping_system() {
        let memory = memory_with_cap(10);
        for i in 0..15 {
            memory.add_user("alice", &format!("message {i}"));
        }

        assert_eq!(memory.len(), 10);
        let snapshot = memory.snapshot();
        assert_eq!(snapshot.len(), 11);
        assert_eq!(snapshot[0].role, TurnRole::System);
        // Oldest five were dropped; the window holds messages 5..15.
        assert_eq!(snapshot[1].content, "alice: message 5");
        assert_eq!(snapshot[10].content, "alice: message 14");
    }

    #[test]
    fn assistant_turns_count_toward_cap() {
        let memory = memory_with_cap(4);
        for i in 0..4 {
            memory.add_user("alice", &format!("q{i}"));
            memory.add_assistant(&format!("a{i}"));
        }

        assert_eq!(memory.len(), 4);
        let snapshot = memory.snapshot();
        assert_eq!(snapshot[1].content, "alice: q2");
        assert_eq!(snapshot[4].content, "a3");
    }

    #[test]
    fn reset_retains_only_persona() {
        let memory = memory_with_cap(10);
        memory.add_user("alice", "hello");
        memory.add_assistant("hi alice");
        memory.reset();

        assert_eq!(memory.len(), 0);
        let snapshot = memory.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].role, TurnRole::System);
    }
}
