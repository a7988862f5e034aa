//! Rule tree storage.

use core::ops::{Index, IndexMut};
use indextree::{Arena, Node, NodeId};

/// Stable handle to a rule inside a [`RuleTree`].
pub type RuleId = NodeId;

/// Classification of a rule, derived from its selector text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RuleType {
    /// A plain style rule (`selector { declarations }`).
    Style,
    /// An `@media` block.
    Media,
    /// An `@keyframes` block (vendor prefixes included).
    Keyframes,
    /// A custom-property block definition (`--name: { ... }`).
    MixinDefinition,
    /// The tree root and at-rules without special handling (`@supports`, `@font-face`, ...).
    #[default]
    Inert,
}

/// A node of the rule tree.
///
/// Offsets are byte offsets into [`RuleTree::source`]. `start` points just past
/// the opening brace and `end` just past the closing brace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
    pub start: usize,
    pub end: usize,
    /// False when the input ended before this rule's closing brace.
    pub explicitly_closed: bool,
    /// Current body text. Rewritten by resolution passes.
    pub css_text: String,
    /// Body text as parsed, never rewritten.
    pub parsed_css_text: String,
    /// Current selector text. Rewritten by resolution passes.
    pub selector: String,
    /// Normalized selector as parsed.
    pub parsed_selector: String,
    pub rule_type: RuleType,
    /// Animation name, set only for [`RuleType::Keyframes`].
    pub keyframes_name: Option<String>,
    /// True when the selector begins with `@`.
    pub at_rule: bool,
}

impl Rule {
    /// Body range inside the source, excluding the closing brace.
    #[inline]
    pub const fn body_end(&self) -> usize {
        if self.explicitly_closed {
            self.end.saturating_sub(1)
        } else {
            self.end
        }
    }
}

/// A parsed stylesheet: an arena of [`Rule`]s under a selector-less root.
#[derive(Clone, Debug)]
pub struct RuleTree {
    arena: Arena<Rule>,
    root: RuleId,
    source: String,
}

impl RuleTree {
    pub(crate) fn with_source(source: String) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(Rule {
            end: source.len(),
            ..Rule::default()
        });
        Self {
            arena,
            root,
            source,
        }
    }

    /// The root rule. It has no selector and no parent.
    #[inline]
    pub const fn root(&self) -> RuleId {
        self.root
    }

    /// Preprocessed text the offsets refer to.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn push_child(&mut self, parent: RuleId, rule: Rule) -> RuleId {
        let child = self.arena.new_node(rule);
        parent.append(child, &mut self.arena);
        child
    }

    #[inline]
    pub fn parent(&self, id: RuleId) -> Option<RuleId> {
        self.arena.get(id).and_then(Node::parent)
    }

    /// The sibling immediately before `id` in its parent's rule list.
    #[inline]
    pub fn previous(&self, id: RuleId) -> Option<RuleId> {
        self.arena.get(id).and_then(Node::previous_sibling)
    }

    /// Child rules in source order.
    #[inline]
    pub fn children(&self, id: RuleId) -> impl Iterator<Item = RuleId> + '_ {
        id.children(&self.arena)
    }

    #[inline]
    pub fn first_child(&self, id: RuleId) -> Option<RuleId> {
        self.arena.get(id).and_then(Node::first_child)
    }

    /// Every rule in document order, starting with `id` itself.
    #[inline]
    pub fn descendants(&self, id: RuleId) -> impl Iterator<Item = RuleId> + '_ {
        id.descendants(&self.arena)
    }

    /// Number of rules, root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.arena.count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Index<RuleId> for RuleTree {
    type Output = Rule;

    #[inline]
    fn index(&self, id: RuleId) -> &Rule {
        self.arena[id].get()
    }
}

impl IndexMut<RuleId> for RuleTree {
    #[inline]
    fn index_mut(&mut self, id: RuleId) -> &mut Rule {
        self.arena[id].get_mut()
    }
}
