//! User column customization
//!
//! The user's visible/hidden and ordered column list lives independently of
//! the fetched column list and is reconciled, never recreated, when a fresh
//! fetch changes the schema.

use tracing::debug;

/// One column in the user's ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnEntry {
    pub name: String,
    pub hidden: bool,
}

/// Ordered, user-customizable projection of the fetched column set
///
/// Invariant: the visible projection is always a subsequence of the full
/// order; hidden columns keep their slot so toggling them back does not
/// reorder the table.
#[derive(Debug, Clone, Default)]
pub struct ColumnView {
    entries: Vec<ColumnEntry>,
}

impl ColumnView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile against a freshly fetched column set
    ///
    /// Survivors keep their position and hidden flag, vanished names are
    /// dropped, and newly-seen names are appended visible at the end in the
    /// order the server listed them. Idempotent for a fixed column set.
    pub fn reconcile(&mut self, columns: &[String]) {
        let before = self.entries.len();
        self.entries
            .retain(|entry| columns.iter().any(|c| c == &entry.name));
        let dropped = before - self.entries.len();

        for name in columns {
            if !self.entries.iter().any(|entry| &entry.name == name) {
                self.entries.push(ColumnEntry {
                    name: name.clone(),
                    hidden: false,
                });
            }
        }

        if dropped > 0 {
            debug!(dropped, "pruned columns no longer present in fetch result");
        }
    }

    /// Move `name` to sit immediately before `before`, or to the end
    ///
    /// Returns false if `name` is unknown or `before` names a missing column.
    pub fn move_before(&mut self, name: &str, before: Option<&str>) -> bool {
        let Some(from) = self.entries.iter().position(|e| e.name == name) else {
            return false;
        };
        let entry = self.entries.remove(from);

        let to = match before {
            Some(target) => match self.entries.iter().position(|e| e.name == target) {
                Some(idx) => idx,
                None => {
                    // Put it back where it was; the target vanished
                    self.entries.insert(from, entry);
                    return false;
                }
            },
            None => self.entries.len(),
        };

        self.entries.insert(to, entry);
        true
    }

    /// Flip the hidden flag, returning the new visibility
    pub fn toggle_visible(&mut self, name: &str) -> Option<bool> {
        self.entries.iter_mut().find(|e| e.name == name).map(|e| {
            e.hidden = !e.hidden;
            !e.hidden
        })
    }

    /// The names the table should render, in user order
    pub fn visible_columns(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.hidden)
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn entries(&self) -> &[ColumnEntry] {
        &self.entries
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.name == name && e.hidden)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_appends_new_columns_visible() {
        let mut view = ColumnView::new();
        view.reconcile(&cols(&["a", "b"]));
        view.reconcile(&cols(&["a", "b", "c"]));

        assert_eq!(view.visible_columns(), ["a", "b", "c"]);
    }

    #[test]
    fn test_reconcile_preserves_order_and_hidden_flags() {
        let mut view = ColumnView::new();
        view.reconcile(&cols(&["a", "b", "c"]));
        view.move_before("c", Some("a"));
        view.toggle_visible("b");

        // "b" vanishes server-side, "d" appears
        view.reconcile(&cols(&["a", "c", "d"]));

        let names: Vec<&str> = view.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "d"]);
        assert_eq!(view.visible_columns(), ["c", "a", "d"]);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut view = ColumnView::new();
        view.reconcile(&cols(&["a", "b", "c"]));
        view.toggle_visible("b");
        view.move_before("a", None);

        let once = view.clone();
        view.reconcile(&cols(&["a", "b", "c"]));

        assert_eq!(view.entries(), once.entries());
    }

    #[test]
    fn test_move_before_and_to_end() {
        let mut view = ColumnView::new();
        view.reconcile(&cols(&["a", "b", "c"]));

        assert!(view.move_before("c", Some("a")));
        assert_eq!(view.visible_columns(), ["c", "a", "b"]);

        assert!(view.move_before("c", None));
        assert_eq!(view.visible_columns(), ["a", "b", "c"]);

        assert!(!view.move_before("x", None));
        assert!(!view.move_before("a", Some("x")));
        assert_eq!(view.visible_columns(), ["a", "b", "c"]);
    }

    #[test]
    fn test_hidden_column_keeps_its_slot() {
        let mut view = ColumnView::new();
        view.reconcile(&cols(&["a", "b", "c"]));

        view.toggle_visible("b");
        assert_eq!(view.visible_columns(), ["a", "c"]);

        view.toggle_visible("b");
        assert_eq!(view.visible_columns(), ["a", "b", "c"]);
    }

    #[test]
    fn test_visible_is_subsequence_of_full_order() {
        let mut view = ColumnView::new();
        view.reconcile(&cols(&["a", "b", "c", "d"]));
        view.toggle_visible("b");
        view.move_before("d", Some("a"));

        let full: Vec<&str> = view.entries().iter().map(|e| e.name.as_str()).collect();
        let visible = view.visible_columns();

        let mut cursor = 0;
        for name in &visible {
            let pos = full[cursor..]
                .iter()
                .position(|f| f == name)
                .expect("visible column missing from full order");
            cursor += pos + 1;
        }
    }
}
