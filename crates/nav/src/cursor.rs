//! Lazy traversal cursors.
//!
//! Cursors are pull-based and keyed by tumbler position: each `next()`
//! takes the view's shared lock for exactly one step, resolves the
//! current frontier position against the live tree, applies the
//! navigator's filters and releases the lock before handing out the
//! snapshot. Abandoning a cursor needs no cleanup.

use crate::navigator::Navigator;
use canopy_core::Value;
use canopy_view::{Entry, EntryId, EntryKind, EntrySnapshot, Position, ViewTree, ROOT};
use core::cmp::Ordering;

/// Traversal direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// A lazy, finite, one-shot sequence of visible entry snapshots.
///
/// Produced by `Navigator::entries_forward` and friends; restart by
/// calling the producing method again.
pub struct Entries<'a> {
    nav: &'a Navigator,
    direction: Direction,
    selected_only: bool,
    /// Explicit seed position, consumed on the first step.
    seed: Option<Position>,
    frontier: Option<Position>,
    started: bool,
    done: bool,
}

impl<'a> Entries<'a> {
    pub(crate) fn forward(nav: &'a Navigator, seed: Option<Position>, selected_only: bool) -> Self {
        Self {
            nav,
            direction: Direction::Forward,
            selected_only,
            seed,
            frontier: None,
            started: false,
            done: false,
        }
    }

    pub(crate) fn backward(nav: &'a Navigator, seed: Option<Position>, selected_only: bool) -> Self {
        Self {
            nav,
            direction: Direction::Backward,
            selected_only,
            seed,
            frontier: None,
            started: false,
            done: false,
        }
    }

    /// Resolves the navigator's scope against the live tree. Returns
    /// the scope position, or None when the scope category is gone.
    /// An unscoped navigator scopes to the root.
    fn resolve_scope(&self, tree: &ViewTree) -> Option<Position> {
        match self.nav.scope() {
            None => Some(Position::root()),
            Some(path) => {
                let id = tree.find_category(path)?;
                tree.position_of(id)
            }
        }
    }

    fn start_frontier(&self, scope: &Position) -> Option<Position> {
        match (&self.seed, self.direction) {
            (Some(seed), Direction::Forward) => {
                if seed == scope {
                    Some(scope.child(1))
                } else if seed.starts_with(scope) {
                    Some(seed.clone())
                } else {
                    // Out-of-scope seeds yield an empty sequence
                    None
                }
            }
            (Some(seed), Direction::Backward) => {
                if seed.starts_with(scope) && seed != scope {
                    Some(seed.clone())
                } else {
                    None
                }
            }
            (None, Direction::Forward) => Some(scope.child(1)),
            // Seek past the last child; the resolver clamps onto the
            // deepest trailing descendant.
            (None, Direction::Backward) => Some(scope.child(u32::MAX)),
        }
    }
}

impl Iterator for Entries<'_> {
    type Item = EntrySnapshot;

    fn next(&mut self) -> Option<EntrySnapshot> {
        if self.done {
            return None;
        }
        let view = self.nav.view().clone();
        let tree = view.read();

        let Some(scope) = self.resolve_scope(&tree) else {
            self.done = true;
            return None;
        };
        if !self.started {
            self.started = true;
            self.frontier = self.start_frontier(&scope);
        }

        loop {
            let Some(frontier) = self.frontier.clone() else {
                self.done = true;
                return None;
            };
            let resolved = match self.direction {
                Direction::Forward => first_at_or_after(&tree, &frontier),
                Direction::Backward => last_at_or_before(&tree, &frontier),
            };
            let Some((id, pos)) = resolved else {
                self.done = true;
                return None;
            };

            // Lift entries hidden under a collapsed ancestor up to that
            // ancestor (only seeds and clamped resolutions hit this).
            let (id, pos) = clamp_to_expansion(&tree, self.nav, scope.depth(), id, pos);

            // Scope containment: the scope category itself is excluded.
            if pos == scope {
                match self.direction {
                    Direction::Forward => {
                        self.frontier = Some(pos.child(1));
                        if self.frontier == Some(frontier) {
                            // No progress possible
                            self.done = true;
                            return None;
                        }
                        continue;
                    }
                    Direction::Backward => {
                        self.done = true;
                        return None;
                    }
                }
            }
            if !pos.starts_with(&scope) {
                self.done = true;
                return None;
            }

            let Some(entry) = tree.entry(id) else {
                self.done = true;
                return None;
            };

            match entry.kind() {
                EntryKind::Category(cat) => {
                    let has_visible = self.nav.category_has_visible_docs(&tree, id);
                    if self.nav.hide_empty_categories() && !has_visible {
                        // Nothing to show below: skip the whole subtree
                        self.frontier = match self.direction {
                            Direction::Forward => pos.next_sibling(),
                            Direction::Backward => backward_step(&tree, self.nav, &pos),
                        };
                        continue;
                    }
                    let path = tree.category_path(id);
                    let expanded = self.nav.expansion().is_expanded(cat.level(), &path);
                    self.frontier = match self.direction {
                        Direction::Forward if expanded => Some(pos.child(1)),
                        Direction::Forward => pos.next_sibling(),
                        Direction::Backward => backward_step(&tree, self.nav, &pos),
                    };
                    if self.nav.include_categories() {
                        if let Some(snapshot) = tree.snapshot(id) {
                            return Some(snapshot);
                        }
                    }
                }
                EntryKind::Document(doc) => {
                    self.frontier = match self.direction {
                        Direction::Forward => pos.next_sibling(),
                        Direction::Backward => backward_step(&tree, self.nav, &pos),
                    };
                    if !self.nav.include_documents() {
                        continue;
                    }
                    if self.selected_only {
                        let origin = tree.origin_name(doc.origin()).unwrap_or_default();
                        if !self.nav.is_selected(origin, doc.row_id()) {
                            continue;
                        }
                    }
                    if !self.nav.document_visible(&tree, id) {
                        continue;
                    }
                    if let Some(snapshot) = tree.snapshot(id) {
                        return Some(snapshot);
                    }
                }
            }
        }
    }
}

/// Resolves the first existing entry at or after `pos` in tumbler
/// order, normalizing positions that point past pruned branches.
fn first_at_or_after(tree: &ViewTree, pos: &Position) -> Option<(EntryId, Position)> {
    let comps = pos.components();
    let mut cur = ROOT;
    let mut depth = 0;
    while depth < comps.len() {
        let children = tree.children_of(cur);
        let index = comps[depth] as usize - 1;
        if index < children.len() {
            cur = children[index];
            depth += 1;
        } else {
            // Past the last child of `cur`: climb until a next sibling
            // exists.
            let mut prefix = comps[..depth].to_vec();
            loop {
                let last = prefix.pop()?;
                let parent_pos = Position::new(prefix.clone())?;
                let parent_id = tree.entry_at(&parent_pos)?;
                let siblings = tree.children_of(parent_id);
                if (last as usize) < siblings.len() {
                    let mut next = prefix.clone();
                    next.push(last + 1);
                    return Some((siblings[last as usize], Position::new(next)?));
                }
            }
        }
    }
    Some((cur, pos.clone()))
}

/// Resolves the last existing entry at or before `pos` in tumbler
/// order.
fn last_at_or_before(tree: &ViewTree, pos: &Position) -> Option<(EntryId, Position)> {
    let comps = pos.components();
    let mut cur = ROOT;
    let mut prefix: Vec<u32> = Vec::new();
    let mut depth = 0;
    while depth < comps.len() {
        let children = tree.children_of(cur);
        let index = comps[depth] as usize - 1;
        if index < children.len() {
            cur = children[index];
            prefix.push(comps[depth]);
            depth += 1;
        } else if !children.is_empty() {
            // Clamp onto the last child, then its deepest trailing
            // descendant: everything under it precedes `pos`.
            cur = *children.last()?;
            prefix.push(children.len() as u32);
            loop {
                let grandchildren = tree.children_of(cur);
                if grandchildren.is_empty() {
                    break;
                }
                cur = *grandchildren.last()?;
                prefix.push(grandchildren.len() as u32);
            }
            return Some((cur, Position::new(prefix)?));
        } else {
            if prefix.is_empty() {
                return None;
            }
            return Some((cur, Position::new(prefix)?));
        }
    }
    Some((cur, pos.clone()))
}

/// Walks the ancestor chain below `start_depth` and returns the topmost
/// collapsed category above the entry, if any.
fn clamp_to_expansion(
    tree: &ViewTree,
    nav: &Navigator,
    start_depth: usize,
    id: EntryId,
    pos: Position,
) -> (EntryId, Position) {
    let comps = pos.components();
    if comps.len() <= start_depth + 1 {
        return (id, pos);
    }
    let mut cur = ROOT;
    let mut path: Vec<Value> = Vec::new();
    for (depth, &component) in comps.iter().enumerate() {
        let children = tree.children_of(cur);
        let Some(&child) = children.get(component as usize - 1) else {
            return (id, pos);
        };
        cur = child;
        let Some(cat) = tree.entry(cur).and_then(Entry::as_category) else {
            return (id, pos);
        };
        path.push(cat.value().clone());
        // Only ancestors strictly above the entry and below the scope
        // can hide it.
        if depth + 1 > start_depth
            && depth + 1 < comps.len()
            && !nav.expansion().is_expanded(cat.level(), &path)
        {
            let clamped = Position::new(comps[..=depth].to_vec());
            return match clamped {
                Some(position) => (cur, position),
                None => (id, pos),
            };
        }
    }
    (id, pos)
}

/// Computes the position preceding `pos` in visible traversal order:
/// the previous sibling's deepest expanded descendant, or the parent.
fn backward_step(tree: &ViewTree, nav: &Navigator, pos: &Position) -> Option<Position> {
    let last = pos.last()?;
    if last <= 1 {
        return pos.parent();
    }
    let mut components = pos.components().to_vec();
    *components.last_mut()? = last - 1;
    let mut cursor = Position::new(components)?;
    // Descend to the deepest trailing descendant, honoring expansion
    loop {
        let Some(id) = tree.entry_at(&cursor) else {
            return Some(cursor);
        };
        let Some(entry) = tree.entry(id) else {
            return Some(cursor);
        };
        let Some(cat) = entry.as_category() else {
            return Some(cursor);
        };
        if entry.children().is_empty() {
            return Some(cursor);
        }
        let path = tree.category_path(id);
        if !nav.expansion().is_expanded(cat.level(), &path) {
            return Some(cursor);
        }
        cursor = cursor.child(entry.children().len() as u32);
    }
}

// ---------------------------------------------------------------------------
// Child document lookups
// ---------------------------------------------------------------------------

/// Key matching rules for `child_documents_by_key`.
pub(crate) struct KeyMatcher {
    key: Vec<Value>,
    exact: bool,
    case_sensitive: bool,
}

impl KeyMatcher {
    pub(crate) fn new(key: Vec<Value>, exact: bool, case_sensitive: bool) -> Self {
        Self {
            key,
            exact,
            case_sensitive,
        }
    }

    /// Whether binary search can seed the scan (matching agrees with
    /// the sort order).
    fn supports_seek(&self) -> bool {
        self.exact && self.case_sensitive
    }

    fn matches(&self, sort_key: &[Value]) -> bool {
        self.key.iter().enumerate().all(|(i, probe)| {
            let Some(value) = sort_key.get(i) else {
                return false;
            };
            match (value, probe) {
                (Value::String(v), Value::String(p)) => match (self.exact, self.case_sensitive) {
                    (true, true) => v == p,
                    (true, false) => v.eq_ignore_ascii_case(p),
                    (false, true) => v.starts_with(p.as_str()),
                    (false, false) => {
                        v.to_lowercase().starts_with(&p.to_lowercase())
                    }
                },
                _ => value == probe,
            }
        })
    }
}

/// Range matching over the leading sort-column value.
pub(crate) struct RangeMatcher {
    start: Value,
    end: Value,
    inclusive: bool,
}

impl RangeMatcher {
    pub(crate) fn new(start: Value, end: Value, inclusive: bool) -> Self {
        Self {
            start,
            end,
            inclusive,
        }
    }

    fn matches(&self, sort_key: &[Value]) -> bool {
        let Some(value) = sort_key.first() else {
            return false;
        };
        if value.cmp(&self.start) == Ordering::Less {
            return false;
        }
        match value.cmp(&self.end) {
            Ordering::Less => true,
            Ordering::Equal => self.inclusive,
            Ordering::Greater => false,
        }
    }
}

enum Matcher {
    Key(KeyMatcher),
    Range(RangeMatcher),
}

impl Matcher {
    fn matches(&self, sort_key: &[Value]) -> bool {
        match self {
            Matcher::Key(m) => m.matches(sort_key),
            Matcher::Range(m) => m.matches(sort_key),
        }
    }
}

/// A lazy sequence of a category's matching document children.
pub struct ChildDocuments<'a> {
    nav: &'a Navigator,
    /// The parent category's value path (empty for the root).
    parent_path: Vec<Value>,
    matcher: Matcher,
    index: usize,
    started: bool,
    done: bool,
}

impl<'a> ChildDocuments<'a> {
    pub(crate) fn by_key(nav: &'a Navigator, parent: &EntrySnapshot, matcher: KeyMatcher) -> Self {
        Self::new(nav, parent, Matcher::Key(matcher))
    }

    pub(crate) fn by_range(
        nav: &'a Navigator,
        parent: &EntrySnapshot,
        matcher: RangeMatcher,
    ) -> Self {
        Self::new(nav, parent, Matcher::Range(matcher))
    }

    fn new(nav: &'a Navigator, parent: &EntrySnapshot, matcher: Matcher) -> Self {
        // Resolve the parent's category path once; later steps re-find
        // the category by value path so sibling shifts cannot misdirect
        // the scan.
        let (parent_path, done) = {
            let tree = nav.view().read();
            match tree.entry_at(parent.position()) {
                Some(id) if tree.entry(id).map(Entry::is_category).unwrap_or(false) => {
                    (tree.category_path(id), false)
                }
                _ => (Vec::new(), true),
            }
        };
        Self {
            nav,
            parent_path,
            matcher,
            index: 0,
            started: false,
            done,
        }
    }

    fn resolve_parent(&self, tree: &ViewTree) -> Option<EntryId> {
        if self.parent_path.is_empty() {
            Some(ROOT)
        } else {
            tree.find_category(&self.parent_path)
        }
    }
}

impl Iterator for ChildDocuments<'_> {
    type Item = EntrySnapshot;

    fn next(&mut self) -> Option<EntrySnapshot> {
        if self.done {
            return None;
        }
        let view = self.nav.view().clone();
        let tree = view.read();
        let Some(parent) = self.resolve_parent(&tree) else {
            self.done = true;
            return None;
        };

        if !self.started {
            self.started = true;
            // Exact case-sensitive key lookups agree with the sort
            // order, so binary search seeds the scan.
            if let Matcher::Key(matcher) = &self.matcher {
                if matcher.supports_seek() {
                    let cmp = tree.doc_comparator();
                    self.index = tree.children_of(parent).partition_point(|&cid| {
                        match tree.entry(cid).and_then(Entry::as_document) {
                            Some(doc) => {
                                cmp.compare_prefix(doc.sort_key(), &matcher.key)
                                    == Ordering::Less
                            }
                            None => true,
                        }
                    });
                }
            }
        }

        while let Some(&child) = tree.children_of(parent).get(self.index) {
            self.index += 1;
            let Some(doc) = tree.entry(child).and_then(Entry::as_document) else {
                continue;
            };
            if !self.matcher.matches(doc.sort_key()) {
                // Seeded scans stop at the first non-match past the run
                if let Matcher::Key(matcher) = &self.matcher {
                    if matcher.supports_seek() {
                        break;
                    }
                }
                continue;
            }
            if !self.nav.document_visible(&tree, child) {
                continue;
            }
            if let Some(snapshot) = tree.snapshot(child) {
                return Some(snapshot);
            }
        }
        self.done = true;
        None
    }
}
