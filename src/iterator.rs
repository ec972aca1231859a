//! Bounded range scans over a tree.
//!
//! The iterator keeps a stack of subtrees still to visit. Branch sort keys
//! separate their two subtrees, so a branch whose sort key lies outside the
//! requested range lets the scan skip one side without loading it.

use crate::{
    error::{Error, Result},
    node::{Node, NodeId, NodeKind},
    pool::NodeStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// No leaf has been looked for yet.
    NotStarted,
    /// Sitting on a leaf inside the range.
    Positioned,
    /// Every leaf of the range has been visited.
    Exhausted,
    /// The node store failed; see [`TreeIterator::error`].
    Errored,
}

/// Cursor over the leaves of a tree between two bounds.
///
/// Ascending scans cover `[start, end)`, or `[start, end]` when `inclusive` is
/// set. Descending scans start from `start` included and stop at `end`
/// excluded. Missing bounds are open.
///
/// Use [`TreeIterator::valid`], [`TreeIterator::key`], [`TreeIterator::value`]
/// and [`TreeIterator::advance`] to walk it as a cursor, or consume it as an
/// [`Iterator`] of `(key, value)` results.
pub struct TreeIterator<'a, S> {
    store: &'a S,
    start: Option<Vec<u8>>,
    end: Option<Vec<u8>>,
    inclusive: bool,
    ascending: bool,
    stack: Vec<NodeId>,
    current: Option<&'a Node>,
    state: IteratorState,
    error: Option<Error>,
    error_reported: bool,
}

impl<'a, S: NodeStore> TreeIterator<'a, S> {
    pub(crate) fn new(
        store: &'a S,
        root: Option<NodeId>,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
        inclusive: bool,
        ascending: bool,
    ) -> Self {
        Self {
            store,
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
            inclusive,
            ascending,
            stack: root.into_iter().collect(),
            current: None,
            state: IteratorState::NotStarted,
            error: None,
            error_reported: false,
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// Whether the iterator sits on a leaf. The first call positions it.
    pub fn valid(&mut self) -> bool {
        if self.state == IteratorState::NotStarted {
            self.step();
        }
        self.state == IteratorState::Positioned
    }

    /// Moves to the next leaf in scan order.
    pub fn advance(&mut self) {
        match self.state {
            IteratorState::NotStarted | IteratorState::Positioned => self.step(),
            IteratorState::Exhausted | IteratorState::Errored => {}
        }
    }

    /// Key of the current leaf, `None` unless positioned.
    pub fn key(&self) -> Option<&'a [u8]> {
        self.current.map(Node::key)
    }

    /// Value of the current leaf, `None` unless positioned.
    pub fn value(&self) -> Option<&'a [u8]> {
        self.current.and_then(Node::value)
    }

    /// The store failure that stopped the scan, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Stops the scan. Calling it again has no effect.
    pub fn close(&mut self) {
        self.stack.clear();
        self.current = None;
        if self.state != IteratorState::Errored {
            self.state = IteratorState::Exhausted;
        }
    }

    fn step(&mut self) {
        match self.seek() {
            Ok(Some(node)) => {
                self.current = Some(node);
                self.state = IteratorState::Positioned;
            }
            Ok(None) => {
                self.close();
            }
            Err(err) => {
                self.stack.clear();
                self.current = None;
                self.state = IteratorState::Errored;
                self.error = Some(err);
            }
        }
    }

    /// Pops subtrees until the next leaf inside the range.
    fn seek(&mut self) -> Result<Option<&'a Node>> {
        let store = self.store;

        while let Some(id) = self.stack.pop() {
            let node = store.load(id)?;

            match node.kind() {
                NodeKind::Branch {
                    sort_key,
                    left,
                    right,
                } => self.expand(sort_key, *left, *right),
                NodeKind::Leaf { .. } => {
                    if self.before_start(node.key()) {
                        continue;
                    }
                    if self.past_end(node.key()) {
                        return Ok(None);
                    }
                    return Ok(Some(node));
                }
            }
        }

        Ok(None)
    }

    /// Pushes the children of a branch that may hold keys in range, the one to
    /// visit first on top.
    fn expand(&mut self, sort_key: &[u8], left: NodeId, right: NodeId) {
        // keys of `left` are below `sort_key`, keys of `right` at or above it
        if self.ascending {
            let visit_right = match self.end.as_deref() {
                Some(end) if self.inclusive => sort_key <= end,
                Some(end) => sort_key < end,
                None => true,
            };
            let visit_left = self.start.as_deref().map_or(true, |start| start < sort_key);

            if visit_right {
                self.stack.push(right);
            }
            if visit_left {
                self.stack.push(left);
            }
        } else {
            let visit_left = self.end.as_deref().map_or(true, |end| end < sort_key);
            let visit_right = self.start.as_deref().map_or(true, |start| sort_key <= start);

            if visit_left {
                self.stack.push(left);
            }
            if visit_right {
                self.stack.push(right);
            }
        }
    }

    fn before_start(&self, key: &[u8]) -> bool {
        match self.start.as_deref() {
            Some(start) if self.ascending => key < start,
            Some(start) => key > start,
            None => false,
        }
    }

    fn past_end(&self, key: &[u8]) -> bool {
        match self.end.as_deref() {
            Some(end) if !self.ascending => key <= end,
            Some(end) if self.inclusive => key > end,
            Some(end) => key >= end,
            None => false,
        }
    }
}

impl<'a, S: NodeStore> Iterator for TreeIterator<'a, S> {
    type Item = Result<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.valid() {
            if self.state == IteratorState::Errored && !self.error_reported {
                self.error_reported = true;
                return self.error.clone().map(Err);
            }
            return None;
        }

        let item = self
            .current
            .map(|node| (node.key(), node.value().unwrap_or_default()));
        self.advance();
        item.map(Ok)
    }
}
