//! The navigator: a configuration-fixed read cursor factory.
//!
//! A navigator binds to a view and fixes, at build time, what traversal
//! can see: entry kinds, the effective reader principals or a custom
//! access predicate, empty-category suppression, and an optional
//! category scope. Expand/collapse state and the selection set are the
//! only mutable parts; traversal itself is stateless between calls.

use crate::cursor::{ChildDocuments, Entries, KeyMatcher, RangeMatcher};
use canopy_core::{Error, Result, Value};
use canopy_view::{Entry, EntryId, EntryKind, EntrySnapshot, Position, ViewTree, VirtualView};
use hashbrown::HashSet;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A custom access predicate, overriding the reader-list check.
///
/// Called once per entry during filtered traversal; must be a pure,
/// side-effect-free function of its inputs.
pub type AccessCheck = Arc<dyn Fn(&Navigator, &EntrySnapshot) -> bool + Send + Sync>;

/// Base expansion policy, refined by per-category exceptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExpandBase {
    All,
    None,
    /// Categories at `level <= n` are expanded.
    ToLevel(usize),
}

/// Expand/collapse state, keyed by category value path so it survives
/// sibling renumbering and prune/recreate cycles.
#[derive(Clone, Debug)]
pub(crate) struct ExpandState {
    base: ExpandBase,
    exceptions: HashSet<Vec<Value>>,
}

impl ExpandState {
    fn collapsed() -> Self {
        Self {
            base: ExpandBase::None,
            exceptions: HashSet::new(),
        }
    }

    pub(crate) fn is_expanded(&self, level: usize, path: &[Value]) -> bool {
        let base = match self.base {
            ExpandBase::All => true,
            ExpandBase::None => false,
            ExpandBase::ToLevel(n) => level <= n,
        };
        if self.exceptions.contains(path) {
            !base
        } else {
            base
        }
    }
}

/// A read-oriented cursor factory bound to one view.
pub struct Navigator {
    view: Arc<VirtualView>,
    include_categories: bool,
    include_documents: bool,
    principals: Option<BTreeSet<String>>,
    access_check: Option<AccessCheck>,
    hide_empty_categories: bool,
    /// Category value path scoping traversal to one subtree.
    scope: Option<Vec<Value>>,
    expansion: ExpandState,
    /// Selected documents as (origin name, row id) pairs.
    selection: HashSet<(String, u64)>,
}

impl Navigator {
    /// Starts building a navigator over the given view.
    pub fn builder(view: Arc<VirtualView>) -> NavigatorBuilder {
        NavigatorBuilder {
            view,
            include_categories: true,
            include_documents: true,
            principals: None,
            access_check: None,
            hide_empty_categories: false,
            scope: None,
        }
    }

    /// Returns the view this navigator reads.
    pub fn view(&self) -> &Arc<VirtualView> {
        &self.view
    }

    /// Returns the effective reader principals, if access filtering is
    /// configured.
    pub fn principals(&self) -> Option<&BTreeSet<String>> {
        self.principals.as_ref()
    }

    // -- expand/collapse ---------------------------------------------------

    /// Expands every category.
    pub fn expand_all(&mut self) {
        self.expansion = ExpandState {
            base: ExpandBase::All,
            exceptions: HashSet::new(),
        };
    }

    /// Collapses every category.
    pub fn collapse_all(&mut self) {
        self.expansion = ExpandState::collapsed();
    }

    /// Expands categories down to the given level (level 1 is the top).
    pub fn expand_to_level(&mut self, level: usize) {
        self.expansion = ExpandState {
            base: ExpandBase::ToLevel(level),
            exceptions: HashSet::new(),
        };
    }

    /// Expands the category at a position. Returns false if the
    /// position does not name a category.
    pub fn expand(&mut self, position: &Position) -> bool {
        self.set_expanded(position, true)
    }

    /// Collapses the category at a position. Returns false if the
    /// position does not name a category.
    pub fn collapse(&mut self, position: &Position) -> bool {
        self.set_expanded(position, false)
    }

    fn set_expanded(&mut self, position: &Position, expanded: bool) -> bool {
        let Some((level, path)) = ({
            let tree = self.view.read();
            tree.entry_at(position).and_then(|id| {
                let cat = tree.entry(id)?.as_category()?;
                Some((cat.level(), tree.category_path(id)))
            })
        }) else {
            return false;
        };
        let base = self.expansion.is_expanded(level, &path)
            != self.expansion.exceptions.contains(&path);
        // `base` is what the policy says without the exception entry
        if base == expanded {
            self.expansion.exceptions.remove(&path);
        } else {
            self.expansion.exceptions.insert(path);
        }
        true
    }

    pub(crate) fn expansion(&self) -> &ExpandState {
        &self.expansion
    }

    // -- selection ---------------------------------------------------------

    /// Adds a document to the selection set.
    pub fn select(&mut self, origin: impl Into<String>, row_id: u64) {
        self.selection.insert((origin.into(), row_id));
    }

    /// Removes a document from the selection set.
    pub fn deselect(&mut self, origin: &str, row_id: u64) {
        self.selection.remove(&(origin.to_string(), row_id));
    }

    /// Replaces the selection set.
    pub fn set_selection(&mut self, selected: impl IntoIterator<Item = (String, u64)>) {
        self.selection = selected.into_iter().collect();
    }

    /// Clears the selection set.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Returns the number of selected documents.
    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    // -- traversal ---------------------------------------------------------

    /// Returns a lazy forward sequence of visible entries in tumbler
    /// order, starting at the traversal root.
    pub fn entries_forward(&self, selected_only: bool) -> Entries<'_> {
        Entries::forward(self, None, selected_only)
    }

    /// Returns a lazy forward sequence starting at a position. A
    /// position outside the configured scope yields an empty sequence.
    pub fn entries_forward_from(&self, position: &Position, selected_only: bool) -> Entries<'_> {
        Entries::forward(self, Some(position.clone()), selected_only)
    }

    /// Returns a lazy backward sequence of visible entries in reverse
    /// tumbler order.
    pub fn entries_backward(&self, selected_only: bool) -> Entries<'_> {
        Entries::backward(self, None, selected_only)
    }

    /// Returns a lazy backward sequence starting at a position.
    pub fn entries_backward_from(&self, position: &Position, selected_only: bool) -> Entries<'_> {
        Entries::backward(self, Some(position.clone()), selected_only)
    }

    /// Looks up a category's document children by sort key.
    ///
    /// With `exact` false, string key components match by prefix. The
    /// returned sequence starts at the first match in sort order.
    pub fn child_documents_by_key(
        &self,
        parent: &EntrySnapshot,
        key: &[Value],
        exact: bool,
        case_sensitive: bool,
    ) -> ChildDocuments<'_> {
        ChildDocuments::by_key(
            self,
            parent,
            KeyMatcher::new(key.to_vec(), exact, case_sensitive),
        )
    }

    /// Scans a category's document children whose leading sort-column
    /// value lies between `start` and `end`.
    ///
    /// The start bound is inclusive; `inclusive` controls the end bound.
    pub fn child_documents_between(
        &self,
        parent: &EntrySnapshot,
        start: &Value,
        end: &Value,
        inclusive: bool,
    ) -> ChildDocuments<'_> {
        ChildDocuments::by_range(
            self,
            parent,
            RangeMatcher::new(start.clone(), end.clone(), inclusive),
        )
    }

    // -- visibility --------------------------------------------------------

    pub(crate) fn include_categories(&self) -> bool {
        self.include_categories
    }

    pub(crate) fn include_documents(&self) -> bool {
        self.include_documents
    }

    pub(crate) fn hide_empty_categories(&self) -> bool {
        self.hide_empty_categories
    }

    pub(crate) fn scope(&self) -> Option<&[Value]> {
        self.scope.as_deref()
    }

    pub(crate) fn is_selected(&self, origin: &str, row_id: u64) -> bool {
        self.selection.contains(&(origin.to_string(), row_id))
    }

    /// Decides whether a document entry is visible to this navigator's
    /// accessor.
    pub(crate) fn document_visible(&self, tree: &ViewTree, id: EntryId) -> bool {
        if let Some(check) = &self.access_check {
            let Some(snapshot) = tree.snapshot(id) else {
                return false;
            };
            return check(self, &snapshot);
        }
        let Some(doc) = tree.entry(id).and_then(Entry::as_document) else {
            return false;
        };
        match &self.principals {
            None => true,
            Some(principals) => doc.visible_to(principals),
        }
    }

    /// Decides whether a category would show anything to this
    /// navigator's accessor.
    ///
    /// Without a custom predicate this is answered from the category's
    /// per-origin reader accumulation without descending; with one, the
    /// aggregation cannot model the predicate and the subtree is walked.
    pub(crate) fn category_has_visible_docs(&self, tree: &ViewTree, id: EntryId) -> bool {
        let Some(cat) = tree.entry(id).and_then(Entry::as_category) else {
            return false;
        };
        if cat.descendant_docs() == 0 {
            return false;
        }
        if self.access_check.is_some() {
            return self.any_visible_descendant(tree, id);
        }
        match &self.principals {
            None => true,
            Some(principals) => cat.readers().visible_to(principals),
        }
    }

    fn any_visible_descendant(&self, tree: &ViewTree, id: EntryId) -> bool {
        let mut stack = vec![id];
        while let Some(cursor) = stack.pop() {
            for &child in tree.children_of(cursor) {
                match tree.entry(child).map(Entry::kind) {
                    Some(EntryKind::Document(_)) => {
                        if self.document_visible(tree, child) {
                            return true;
                        }
                    }
                    Some(EntryKind::Category(_)) => stack.push(child),
                    None => {}
                }
            }
        }
        false
    }
}

/// Builder for `Navigator`; configuration is fixed at `build`.
pub struct NavigatorBuilder {
    view: Arc<VirtualView>,
    include_categories: bool,
    include_documents: bool,
    principals: Option<BTreeSet<String>>,
    access_check: Option<AccessCheck>,
    hide_empty_categories: bool,
    scope: Option<Vec<Value>>,
}

impl NavigatorBuilder {
    /// Sets whether category entries are produced.
    pub fn with_categories(mut self, include: bool) -> Self {
        self.include_categories = include;
        self
    }

    /// Sets whether document entries are produced.
    pub fn with_documents(mut self, include: bool) -> Self {
        self.include_documents = include;
        self
    }

    /// Filters entries for an effective user and their groups.
    pub fn as_user(mut self, name: impl Into<String>, groups: &[&str]) -> Self {
        let mut principals: BTreeSet<String> =
            groups.iter().map(|g| (*g).to_string()).collect();
        principals.insert(name.into());
        self.principals = Some(principals);
        self
    }

    /// Filters entries against an explicit reader principal set.
    pub fn with_readers(mut self, principals: impl IntoIterator<Item = String>) -> Self {
        self.principals = Some(principals.into_iter().collect());
        self
    }

    /// Overrides the reader-list check with a custom predicate.
    pub fn access_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Navigator, &EntrySnapshot) -> bool + Send + Sync + 'static,
    {
        self.access_check = Some(Arc::new(check));
        self
    }

    /// Hides categories with no visible descendant documents.
    pub fn hide_empty_categories(mut self, hide: bool) -> Self {
        self.hide_empty_categories = hide;
        self
    }

    /// Scopes traversal to the subtree of a top-level category.
    pub fn from_category(self, value: impl Into<Value>) -> Self {
        self.from_category_path(vec![value.into()])
    }

    /// Scopes traversal to the subtree of a nested category.
    pub fn from_category_path(mut self, path: Vec<Value>) -> Self {
        self.scope = Some(path);
        self
    }

    /// Validates the configuration and builds the navigator.
    ///
    /// Navigators start fully collapsed.
    pub fn build(self) -> Result<Navigator> {
        if !self.include_categories && !self.include_documents {
            return Err(Error::invalid_config(
                "navigator excludes both categories and documents",
            ));
        }
        if let Some(scope) = &self.scope {
            let depth = self
                .view
                .columns()
                .iter()
                .filter(|c| c.is_category())
                .count();
            if scope.is_empty() || scope.len() > depth {
                return Err(Error::invalid_config(format!(
                    "category scope depth {} does not fit a view with {} category levels",
                    scope.len(),
                    depth
                )));
            }
        }
        Ok(Navigator {
            view: self.view,
            include_categories: self.include_categories,
            include_documents: self.include_documents,
            principals: self.principals,
            access_check: self.access_check,
            hide_empty_categories: self.hide_empty_categories,
            scope: self.scope,
            expansion: ExpandState::collapsed(),
            selection: HashSet::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::{RowSummary, ViewColumn};
    use canopy_view::{ChangeBatch, RowChange};

    fn sample_view() -> Arc<VirtualView> {
        let view = VirtualView::builder("people")
            .column(ViewColumn::new("Lastname").category())
            .column(ViewColumn::new("Firstname").ascending())
            .build()
            .unwrap();
        let mut batch = ChangeBatch::new("o1");
        for (id, last, first) in [(1, "Abbott", "Ed"), (2, "Abbott", "Al"), (3, "Zeller", "Jo")] {
            batch.add(RowChange::new(
                id,
                format!("u{id}"),
                RowSummary::new().with("Lastname", last).with("Firstname", first),
            ));
        }
        view.apply_changes(&batch);
        Arc::new(view)
    }

    #[test]
    fn test_builder_validation() {
        let view = sample_view();
        let bad = Navigator::builder(view.clone())
            .with_categories(false)
            .with_documents(false)
            .build();
        assert!(bad.is_err());

        let too_deep = Navigator::builder(view.clone())
            .from_category_path(vec!["A".into(), "B".into()])
            .build();
        assert!(too_deep.is_err());

        assert!(Navigator::builder(view).build().is_ok());
    }

    #[test]
    fn test_expand_collapse_by_position() {
        let view = sample_view();
        let mut nav = Navigator::builder(view).build().unwrap();
        let abbott = Position::parse("1").unwrap();

        // Starts collapsed
        assert!(nav.expand(&abbott));
        assert!(nav
            .expansion()
            .is_expanded(1, &[Value::String("Abbott".into())]));

        assert!(nav.collapse(&abbott));
        assert!(!nav
            .expansion()
            .is_expanded(1, &[Value::String("Abbott".into())]));

        // A document position is not expandable
        nav.expand_all();
        assert!(!nav.expand(&Position::parse("1.1").unwrap()));
    }

    #[test]
    fn test_expand_exceptions_survive_base_flip() {
        let view = sample_view();
        let mut nav = Navigator::builder(view).build().unwrap();
        let path = [Value::String("Abbott".into())];

        nav.expand_all();
        assert!(nav.expansion().is_expanded(1, &path));

        nav.collapse(&Position::parse("1").unwrap());
        assert!(!nav.expansion().is_expanded(1, &path));
        // Other categories stay expanded
        assert!(nav.expansion().is_expanded(1, &[Value::String("Zeller".into())]));
    }

    #[test]
    fn test_expand_to_level() {
        let view = sample_view();
        let mut nav = Navigator::builder(view).build().unwrap();
        nav.expand_to_level(1);
        assert!(nav.expansion().is_expanded(1, &[Value::String("Abbott".into())]));
        assert!(!nav.expansion().is_expanded(2, &[
            Value::String("Abbott".into()),
            Value::String("X".into())
        ]));
    }

    #[test]
    fn test_selection() {
        let view = sample_view();
        let mut nav = Navigator::builder(view).build().unwrap();
        nav.select("o1", 1);
        nav.select("o1", 2);
        assert_eq!(nav.selection_len(), 2);
        assert!(nav.is_selected("o1", 1));

        nav.deselect("o1", 1);
        assert!(!nav.is_selected("o1", 1));

        nav.set_selection([("o1".to_string(), 3)]);
        assert_eq!(nav.selection_len(), 1);
        nav.clear_selection();
        assert_eq!(nav.selection_len(), 0);
    }
}
