//! # Session Token Queues
//!
//! Each session carries an ordered queue of currently-valid tokens, oldest
//! first. Appends go to the tail; a successful match removes the matched
//! token *and everything older than it*, which bounds queue growth and makes
//! accepted tokens unreplayable while still tolerating several in-flight tabs
//! holding different not-yet-used tokens.
//!
//! The queue lives in whatever session infrastructure the host application
//! already has; [`SessionStore`] is the narrow accessor the engine goes
//! through. [`MemoryStore`] is the bundled single-process implementation used
//! by default and in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use subtle::ConstantTimeEq;

/// Ordered sequence of valid tokens for one session, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenQueue(Vec<String>);

impl TokenQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a freshly issued token at the tail.
    pub fn push(&mut self, token: String) {
        self.0.push(token);
    }

    /// Scans oldest-to-newest for `token`; on the first match, removes the
    /// match and every older entry and returns `true`. Without a match the
    /// queue is left untouched and `false` is returned.
    ///
    /// Token comparison is constant-time per entry.
    pub fn consume(&mut self, token: &str) -> bool {
        let hit = self
            .0
            .iter()
            .position(|t| t.as_bytes().ct_eq(token.as_bytes()).unwrap_u8() == 1);
        match hit {
            Some(idx) => {
                // Everything at or before the match is presumed used.
                self.0.drain(..=idx);
                true
            }
            None => false,
        }
    }

    /// Discards every token. Used when the session slot held something that
    /// was not a valid queue and has to be reset.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Number of still-valid tokens.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no token is currently valid.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for TokenQueue {
    fn from(tokens: Vec<String>) -> Self {
        Self(tokens)
    }
}

/// Accessor for the per-session token queue.
///
/// The store never creates or destroys sessions; it only reads and writes the
/// one slot the engine owns. `load` returning `None` means no queue exists
/// yet (no token issued, or no session). Implementations over serialized
/// session backends must map an undecodable slot to `None` and reset it on
/// the next [`store`](SessionStore::store), never panic.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the queue for `session_id`, if one exists.
    fn load(&self, session_id: &str) -> Option<TokenQueue>;

    /// Replaces the queue for `session_id`, creating the slot if absent.
    fn store(&self, session_id: &str, queue: TokenQueue);

    /// Removes the slot for `session_id` entirely.
    fn clear(&self, session_id: &str);
}

/// In-process [`SessionStore`] backed by a mutex-guarded map.
///
/// Suitable for single-process hosts and tests. Hosts with external session
/// backends implement [`SessionStore`] over their own infrastructure instead.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, TokenQueue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, session_id: &str) -> Option<TokenQueue> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(session_id)
            .cloned()
    }

    fn store(&self, session_id: &str, queue: TokenQueue) {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(session_id.to_string(), queue);
    }

    fn clear(&self, session_id: &str) {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id);
    }
}
