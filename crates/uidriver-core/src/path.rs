//! Locator path compilation.
//!
//! A path string like `"#Suite//Piano/Key//<TextBlock>"` compiles into an
//! ordered list of [`Matcher`]s. Segment syntax:
//!
//! - `#Name` matches a node whose id metadata contains `Name`
//! - `<TypeName>` matches a node of that widget type
//! - bare text matches a node whose tag metadata contains it
//! - `/` between segments means "direct child"
//! - `//` means "any descendant of the previous matcher" and sets
//!   `allow_relative_descendant` on the *preceding* matcher
//!
//! Compilation happens once when a locator is constructed and fails loudly:
//! a malformed path is a programmer error, not a not-found condition.

use serde::{Deserialize, Serialize};

use crate::error::AutomationError;
use crate::tree::{MetadataKind, NodeId, UiTree};

/// What one compiled path segment matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatcherKind {
    /// Explicit id metadata (`#Name`).
    Id,
    /// Tag metadata (bare text).
    Tag,
    /// Widget type name (`<TypeName>`).
    Type,
}

/// One compiled segment of a locator path.
///
/// Built once at locator construction and immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    kind: MatcherKind,
    value: String,
    allow_relative_descendant: bool,
}

impl Matcher {
    pub fn kind(&self) -> MatcherKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the *next* matcher may match any descendant rather than only
    /// a direct child (the `//` marker).
    pub fn allow_relative_descendant(&self) -> bool {
        self.allow_relative_descendant
    }

    /// Whether `node` satisfies this matcher.
    pub fn matches(&self, tree: &dyn UiTree, node: NodeId) -> bool {
        match self.kind {
            MatcherKind::Id => tree
                .metadata(node, MetadataKind::Id)
                .iter()
                .any(|id| id == &self.value),
            MatcherKind::Tag => tree
                .metadata(node, MetadataKind::Tag)
                .iter()
                .any(|tag| tag == &self.value),
            MatcherKind::Type => tree.type_name(node).as_deref() == Some(self.value.as_str()),
        }
    }

    /// The segment's stable debug form (re-parses to an equal matcher).
    pub fn debug_form(&self) -> String {
        match self.kind {
            MatcherKind::Id => format!("#{}", self.value),
            MatcherKind::Tag => self.value.clone(),
            MatcherKind::Type => format!("<{}>", self.value),
        }
    }
}

/// Builds a single id matcher without going through path parsing, so the
/// value is taken literally even when it contains path metacharacters.
pub(crate) fn id_matcher(value: impl Into<String>) -> Matcher {
    Matcher {
        kind: MatcherKind::Id,
        value: value.into(),
        allow_relative_descendant: false,
    }
}

/// Re-serializes a matcher list back into path syntax.
///
/// Compiling the result yields a structurally identical matcher list.
pub fn debug_path(matchers: &[Matcher]) -> String {
    let mut out = String::new();
    for (i, m) in matchers.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&m.debug_form());
        if m.allow_relative_descendant {
            out.push('/');
        }
    }
    out
}

/// Compiles a path string into an ordered matcher list.
///
/// An empty path compiles to zero matchers (a locator that matches nothing).
/// Doubled descendant markers (`///`), a leading marker with no preceding
/// matcher, and a trailing marker with no following matcher are all
/// compile errors.
pub fn compile(path: &str) -> Result<Vec<Matcher>, AutomationError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let err = |reason: &str| AutomationError::PathCompile {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut matchers: Vec<Matcher> = Vec::new();
    let mut pending_descendant = false;

    for segment in path.split('/') {
        if segment.is_empty() {
            let previous = matchers
                .last_mut()
                .ok_or_else(|| err("descendant marker with no preceding matcher"))?;
            if pending_descendant {
                return Err(err("double descendant marker"));
            }
            previous.allow_relative_descendant = true;
            pending_descendant = true;
            continue;
        }
        pending_descendant = false;

        let matcher = if let Some(id) = segment.strip_prefix('#') {
            if id.is_empty() {
                return Err(err("empty id segment"));
            }
            Matcher {
                kind: MatcherKind::Id,
                value: id.to_string(),
                allow_relative_descendant: false,
            }
        } else if segment.starts_with('<') {
            let ty = segment
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
                .filter(|s| !s.is_empty())
                .ok_or_else(|| err("malformed type segment"))?;
            Matcher {
                kind: MatcherKind::Type,
                value: ty.to_string(),
                allow_relative_descendant: false,
            }
        } else {
            Matcher {
                kind: MatcherKind::Tag,
                value: segment.to_string(),
                allow_relative_descendant: false,
            }
        };
        matchers.push(matcher);
    }

    if pending_descendant {
        return Err(err("trailing descendant marker"));
    }

    Ok(matchers)
}
