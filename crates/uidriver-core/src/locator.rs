//! Element locators: queries that map the current UI tree to element handles.
//!
//! A [`By`] locator re-runs its search against the live tree on every
//! [`locate`](By::locate) call. Nothing is memoized between calls; the tree
//! may have mutated, and stale answers are worse than slow ones. Locating
//! never fails: an empty result means "not found right now".

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::AutomationError;
use crate::path::{self, Matcher};
use crate::tree::{ElementHandle, NodeId, UiTree};

/// Delegate signature for caller-supplied element searches.
pub type LocateDelegate = dyn Fn(&dyn UiTree) -> Vec<ElementHandle> + Send + Sync;

enum Source {
    /// Compiled path search, optionally rooted at a prior handle's subtree.
    Path {
        root: Option<ElementHandle>,
        matchers: Vec<Matcher>,
    },
    /// Caller-supplied search; results are filtered to valid tree paths.
    Delegate(Arc<LocateDelegate>),
}

impl Clone for Source {
    fn clone(&self) -> Self {
        match self {
            Source::Path { root, matchers } => Source::Path {
                root: root.clone(),
                matchers: matchers.clone(),
            },
            Source::Delegate(f) => Source::Delegate(Arc::clone(f)),
        }
    }
}

/// A locator: maps a snapshot of the UI tree to zero or more elements.
#[derive(Clone)]
pub struct By {
    source: Source,
    debug: String,
}

impl By {
    /// Locates elements carrying the given explicit id, anywhere in the tree.
    ///
    /// A one-segment search probes every subtree from matcher index 0, which
    /// yields any-depth semantics.
    pub fn id(value: impl Into<String>) -> By {
        let value = value.into();
        let debug = format!("#{value}");
        By {
            source: Source::Path {
                root: None,
                matchers: vec![path::id_matcher(value)],
            },
            debug,
        }
    }

    /// Compiles a path locator. Fails on malformed paths.
    pub fn path(value: &str) -> Result<By, AutomationError> {
        Ok(By {
            source: Source::Path {
                root: None,
                matchers: path::compile(value)?,
            },
            debug: value.to_string(),
        })
    }

    /// Compiles a path locator restricted to the subtree below `root`.
    pub fn path_under(root: ElementHandle, value: &str) -> Result<By, AutomationError> {
        let debug = format!("{} :: {value}", root.debug_name());
        Ok(By {
            source: Source::Path {
                root: Some(root),
                matchers: path::compile(value)?,
            },
            debug,
        })
    }

    /// Wraps a caller-supplied search delegate.
    ///
    /// Results are filtered to handles whose id paths are still valid in the
    /// tree at locate time.
    pub fn delegate<F>(description: impl Into<String>, f: F) -> By
    where
        F: Fn(&dyn UiTree) -> Vec<ElementHandle> + Send + Sync + 'static,
    {
        By {
            source: Source::Delegate(Arc::new(f)),
            debug: description.into(),
        }
    }

    /// The locator's debug representation, used in logs and errors.
    pub fn debug_name(&self) -> &str {
        &self.debug
    }

    /// Runs the search against the current tree.
    ///
    /// Always synchronous, never cached, never errors: zero results signal
    /// "not found". Results are in traversal (document) order.
    pub fn locate(&self, tree: &dyn UiTree) -> Vec<ElementHandle> {
        let found = match &self.source {
            Source::Delegate(f) => f(tree)
                .into_iter()
                .filter(|handle| !handle.path().is_empty() && handle.is_valid(tree))
                .collect(),
            Source::Path { root, matchers } => search(tree, root.as_ref(), matchers),
        };
        trace!(locator = %self.debug, matches = found.len(), "locate");
        found
    }
}

impl fmt::Debug for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("By").field("locator", &self.debug).finish()
    }
}

impl fmt::Display for By {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug)
    }
}

/// One pending candidate in the backtracking search.
struct Candidate {
    /// Ids of the candidate's ancestors, root first.
    base: Vec<NodeId>,
    /// The node to test against `matchers[index]`.
    node: NodeId,
    index: usize,
}

/// Stack-based depth-first search with backtracking.
///
/// Each candidate node is tested against one matcher:
///
/// - on a match of the final matcher, the candidate is emitted and its
///   subtree is not descended further;
/// - on a match of a non-final matcher, the candidate's children become
///   candidates for the next matcher (direct-child semantics);
/// - on a mismatch below a `//` matcher, the children re-test the *same*
///   matcher, implementing any-descendant semantics;
/// - on any other mismatch, the children restart at matcher index 0, which
///   is what lets a single-segment path match at any depth. For longer paths
///   the restarted branch usually dies out on its own.
fn search(tree: &dyn UiTree, root: Option<&ElementHandle>, matchers: &[Matcher]) -> Vec<ElementHandle> {
    if matchers.is_empty() {
        return Vec::new();
    }

    let mut stack: Vec<Candidate> = Vec::new();
    let seed = |stack: &mut Vec<Candidate>, base: &[NodeId], nodes: Vec<NodeId>| {
        // Children are pushed in reverse so the LIFO stack visits them in
        // document order.
        for node in nodes.into_iter().rev() {
            stack.push(Candidate {
                base: base.to_vec(),
                node,
                index: 0,
            });
        }
    };

    match root {
        Some(handle) => {
            if !handle.is_valid(tree) {
                return Vec::new();
            }
            seed(&mut stack, handle.path(), tree.arrange_children(handle.node()));
        }
        None => seed(&mut stack, &[], tree.visible_roots()),
    }

    let last = matchers.len() - 1;
    let mut results: Vec<ElementHandle> = Vec::new();

    while let Some(candidate) = stack.pop() {
        let Candidate { base, node, index } = candidate;

        if matchers[index].matches(tree, node) {
            if index == last {
                let mut path = base;
                path.push(node);
                results.push(ElementHandle::new(path, tree.debug_label(node)));
                continue;
            }
            push_children(tree, &mut stack, base, node, index + 1);
        } else {
            let next_index = if index > 0 && matchers[index - 1].allow_relative_descendant() {
                index
            } else {
                0
            };
            push_children(tree, &mut stack, base, node, next_index);
        }
    }

    results
}

fn push_children(
    tree: &dyn UiTree,
    stack: &mut Vec<Candidate>,
    base: Vec<NodeId>,
    node: NodeId,
    index: usize,
) {
    let mut path = base;
    path.push(node);
    for child in tree.arrange_children(node).into_iter().rev() {
        stack.push(Candidate {
            base: path.clone(),
            node: child,
            index,
        });
    }
}
