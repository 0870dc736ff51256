//! The turn log of the session on screen.

use crate::types::Turn;

/// Ordered turns for at most one session.
///
/// Every [`ConversationView::replace`] or [`ConversationView::clear`] starts a
/// new generation, even when the session stays the same.  A writer captures
/// [`ConversationView::generation`] when it starts and appends through
/// [`ConversationView::append`], which refuses turns once the log it was
/// started against has been replaced.
#[derive(Debug, Default, Clone)]
pub struct ConversationView {
    session_id: Option<String>,
    generation: u64,
    turns: Vec<Turn>,
}

impl ConversationView {
    /// Creates an empty view bound to no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// The session whose turns this view holds.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Identifies the current contents; changes on every reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The turns, in arrival order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns held.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if no turns are held.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Discards everything and binds the view to `session_id` with `turns`.
    pub fn replace(&mut self, session_id: Option<String>, turns: Vec<Turn>) {
        self.session_id = session_id;
        self.generation = self.generation.wrapping_add(1);
        self.turns = turns;
    }

    /// Appends a turn if the view is still at `generation`.
    ///
    /// Returns false, leaving the view untouched, when it is not.
    pub fn append(&mut self, generation: u64, turn: Turn) -> bool {
        if self.generation != generation {
            return false;
        }
        self.turns.push(turn);
        true
    }

    /// Unbinds the view and drops all turns.
    pub fn clear(&mut self) {
        self.replace(None, Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Part, Role};

    #[test]
    fn append_requires_current_generation() {
        let mut view = ConversationView::new();
        view.replace(Some("a".to_string()), Vec::new());
        let generation = view.generation();
        assert!(view.append(generation, Turn::new(Role::User, vec![Part::text("1")])));
        assert!(view.append(generation, Turn::new(Role::Agent, vec![Part::text("2")])));
        assert!(!view.append(generation + 1, Turn::notice("stale")));
        assert_eq!(view.len(), 2);
        assert_eq!(view.turns()[0].parts, vec![Part::text("1")]);
        assert_eq!(view.turns()[1].parts, vec![Part::text("2")]);
    }

    #[test]
    fn reloading_the_same_session_starts_a_new_generation() {
        let mut view = ConversationView::new();
        view.replace(Some("a".to_string()), Vec::new());
        let first = view.generation();
        view.replace(Some("b".to_string()), Vec::new());
        view.replace(Some("a".to_string()), vec![Turn::notice("history")]);
        assert_ne!(view.generation(), first);
        assert!(!view.append(first, Turn::notice("late")));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn replace_is_a_hard_reset() {
        let mut view = ConversationView::new();
        view.replace(Some("a".to_string()), vec![Turn::notice("old")]);
        view.replace(Some("b".to_string()), vec![Turn::notice("new")]);
        assert_eq!(view.session_id(), Some("b"));
        assert_eq!(view.turns().len(), 1);
        assert_eq!(view.turns()[0].parts, vec![Part::text("new")]);

        let before = view.generation();
        view.clear();
        assert_eq!(view.session_id(), None);
        assert!(view.is_empty());
        assert_ne!(view.generation(), before);
    }
}
