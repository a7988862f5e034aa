//! The document the shim styles, seen as a black box.

use anyhow::Result;

/// A stable key for DOM nodes handed out by a [`StyleHost`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// The document node.
    pub const ROOT: Self = Self(0);
}

/// DOM operations the shim needs from its embedding environment.
///
/// Lookups on unknown nodes return `None` or empty results. Mutations on
/// unknown nodes return an error.
pub trait StyleHost {
    /// Concatenated text of the node's descendants.
    fn text_content(&self, node: NodeKey) -> Option<String>;

    /// Replace the node's children with a single text node.
    ///
    /// # Errors
    /// Returns an error when `node` is unknown.
    fn set_text_content(&mut self, node: NodeKey, text: &str) -> Result<()>;

    /// Lowercase tag name of an element.
    fn local_name(&self, node: NodeKey) -> Option<String>;

    fn attribute(&self, node: NodeKey, name: &str) -> Option<String>;

    /// Element children in order.
    fn children(&self, node: NodeKey) -> Vec<NodeKey>;

    fn shadow_root(&self, node: NodeKey) -> Option<NodeKey>;

    /// Content fragment of a `<template>`.
    fn template_content(&self, template: NodeKey) -> Option<NodeKey>;

    /// The first child of `node` when it is a comment, with the comment text.
    fn leading_comment(&self, node: NodeKey) -> Option<(NodeKey, String)>;

    /// Remove `node` and its subtree from the document.
    ///
    /// # Errors
    /// Returns an error when `node` is unknown.
    fn remove_node(&mut self, node: NodeKey) -> Result<()>;

    /// Create a detached `<style>` element holding `text`.
    ///
    /// # Errors
    /// Returns an error when the host cannot create elements.
    fn create_style(&mut self, text: &str) -> Result<NodeKey>;

    /// Insert `child` as the first child of `parent`.
    ///
    /// # Errors
    /// Returns an error when either node is unknown.
    fn insert_first(&mut self, parent: NodeKey, child: NodeKey) -> Result<()>;

    /// # Errors
    /// Returns an error when either node is unknown.
    fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<()>;

    fn head(&self) -> NodeKey;

    fn body(&self) -> NodeKey;

    /// Create an off-screen element in the head whose style is `all: initial`.
    ///
    /// # Errors
    /// Returns an error when the host cannot create elements.
    fn create_measure_probe(&mut self) -> Result<NodeKey>;

    /// Set (`Some`) or remove (`None`) an inline style property.
    ///
    /// # Errors
    /// Returns an error when `node` is unknown.
    fn set_inline_property(&mut self, node: NodeKey, name: &str, value: Option<&str>) -> Result<()>;

    /// Synchronous computed-style query.
    fn computed_property_value(&self, node: NodeKey, name: &str) -> Option<String>;

    /// Evaluate a media query list against the current environment.
    fn media_matches(&self, condition: &str) -> bool;

    /// Every descendant `<style>` element of `root`, in document order.
    fn descendant_styles(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let children = self.children(node);
            for child in children.iter().rev() {
                stack.push(*child);
            }
            if node != root && self.local_name(node).as_deref() == Some("style") {
                found.push(node);
            }
        }
        found
    }
}
