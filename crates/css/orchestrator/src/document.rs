//! Arena-backed document implementing [`StyleHost`].
//!
//! Shadow roots and template contents are separate arena roots. A shadow
//! root remembers its host so custom properties inherit across the boundary.
//! Computed values come from inline styles only; there is no cascade.

use crate::host::{NodeKey, StyleHost};
use anyhow::{Result, anyhow};
use css_media_queries::{ViewportMedia, evaluate_media_query_list};
use css_variables::{CustomProperties, extract_custom_properties, resolve_vars_in_value};
use indexmap::IndexMap;
use indextree::{Arena, Node, NodeId};
use log::trace;
use rustc_hash::FxHashMap;
use std::collections::HashMap;

const MEASURE_PROBE_TAG: &str = "apply-shim-measure";

const INHERITED_PROPERTIES: &[&str] = &[
    "color",
    "cursor",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "line-height",
    "visibility",
];

/// Initial values reported for properties that are neither declared nor
/// inherited.
fn initial_value(property: &str) -> Option<&'static str> {
    let value = match property {
        "color" => "rgb(0, 0, 0)",
        "background-color" | "border-color" => "rgba(0, 0, 0, 0)",
        "display" => "inline",
        "position" => "static",
        "visibility" => "visible",
        "cursor" | "width" | "height" | "top" | "left" | "right" | "bottom" => "auto",
        "font-size" => "16px",
        "font-style" => "normal",
        "font-weight" => "400",
        "line-height" => "normal",
        "opacity" => "1",
        "margin" | "margin-top" | "margin-right" | "margin-bottom" | "margin-left" | "padding"
        | "padding-top" | "padding-right" | "padding-bottom" | "padding-left" => "0px",
        "border-width" | "border-top-width" => "0px",
        _ => return None,
    };
    Some(value)
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
    /// A shadow root or template content. `host` is set for shadow roots.
    Fragment { host: Option<NodeId> },
}

#[derive(Clone, Debug, Default)]
pub struct ElementData {
    pub local_name: String,
    pub attributes: IndexMap<String, String>,
    pub inline_style: IndexMap<String, String>,
    pub shadow_root: Option<NodeId>,
    /// Content fragment of a `<template>`.
    pub content: Option<NodeId>,
}

/// A minimal DOM: document, `<html>`, `<head>` and `<body>`, plus whatever the
/// caller builds.
#[derive(Debug)]
pub struct InMemoryDocument {
    arena: Arena<NodeKind>,
    document: NodeId,
    head: NodeId,
    body: NodeId,
    keys: FxHashMap<NodeId, NodeKey>,
    nodes: FxHashMap<NodeKey, NodeId>,
    counter: u64,
    viewport: ViewportMedia,
}

impl Default for InMemoryDocument {
    #[inline]
    fn default() -> Self {
        Self::new(ViewportMedia::default())
    }
}

impl InMemoryDocument {
    pub fn new(viewport: ViewportMedia) -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeKind::Document);
        let html = arena.new_node(Self::element_kind("html"));
        let head = arena.new_node(Self::element_kind("head"));
        let body = arena.new_node(Self::element_kind("body"));
        document.append(html, &mut arena);
        html.append(head, &mut arena);
        html.append(body, &mut arena);

        let mut doc = Self {
            arena,
            document,
            head,
            body,
            keys: FxHashMap::default(),
            nodes: FxHashMap::default(),
            counter: 1,
            viewport,
        };
        doc.seed(document, NodeKey::ROOT);
        for id in [html, head, body] {
            doc.key_of(id);
        }
        doc
    }

    fn element_kind(local_name: &str) -> NodeKind {
        NodeKind::Element(ElementData {
            local_name: local_name.to_ascii_lowercase(),
            ..ElementData::default()
        })
    }

    fn seed(&mut self, id: NodeId, key: NodeKey) {
        self.keys.insert(id, key);
        self.nodes.insert(key, id);
    }

    /// Key for an arena node, minting one on first use.
    fn key_of(&mut self, id: NodeId) -> NodeKey {
        if let Some(&key) = self.keys.get(&id) {
            return key;
        }
        let key = NodeKey(self.counter);
        self.counter = self.counter.wrapping_add(1);
        self.seed(id, key);
        key
    }

    fn known_key(&self, id: NodeId) -> Option<NodeKey> {
        self.keys.get(&id).copied()
    }

    fn lookup(&self, key: NodeKey) -> Option<NodeId> {
        self.nodes.get(&key).copied()
    }

    fn resolve(&self, key: NodeKey) -> Result<NodeId> {
        self.lookup(key).ok_or_else(|| anyhow!("unknown node {key:?}"))
    }

    fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.arena.get(id).map(Node::get)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id)? {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.arena.get_mut(id)?.get_mut() {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    #[inline]
    pub fn document_element(&self) -> NodeKey {
        self.document
            .children(&self.arena)
            .next()
            .and_then(|html| self.known_key(html))
            .unwrap_or(NodeKey::ROOT)
    }

    /// Free `id`, its descendants, and any shadow roots or template contents
    /// they own. Their keys become unknown.
    fn discard(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let subtree: Vec<NodeId> = next.descendants(&self.arena).collect();
            for node in subtree {
                if let Some(element) = self.element(node) {
                    pending.extend(element.shadow_root);
                    pending.extend(element.content);
                }
                if let Some(key) = self.keys.remove(&node) {
                    self.nodes.remove(&key);
                }
            }
            next.remove_subtree(&mut self.arena);
        }
        trace!("discarded node {id:?}");
    }

    fn lookup_parent_key(&self, id: NodeId) -> Option<NodeKey> {
        self.arena
            .get(id)
            .and_then(Node::parent)
            .and_then(|parent| self.known_key(parent))
    }

    #[inline]
    pub fn viewport(&self) -> &ViewportMedia {
        &self.viewport
    }

    #[inline]
    pub fn set_viewport(&mut self, viewport: ViewportMedia) {
        self.viewport = viewport;
    }

    /// Create a detached element.
    pub fn create_element(&mut self, local_name: &str) -> NodeKey {
        let id = self.arena.new_node(Self::element_kind(local_name));
        self.key_of(id)
    }

    pub fn create_text(&mut self, text: &str) -> NodeKey {
        let id = self.arena.new_node(NodeKind::Text(text.to_owned()));
        self.key_of(id)
    }

    pub fn create_comment(&mut self, text: &str) -> NodeKey {
        let id = self.arena.new_node(NodeKind::Comment(text.to_owned()));
        self.key_of(id)
    }

    /// Create a detached `<template>` with an empty content fragment.
    pub fn create_template(&mut self) -> NodeKey {
        let content = self.arena.new_node(NodeKind::Fragment { host: None });
        let id = self.arena.new_node(NodeKind::Element(ElementData {
            local_name: "template".to_owned(),
            content: Some(content),
            ..ElementData::default()
        }));
        self.key_of(content);
        self.key_of(id)
    }

    /// # Errors
    /// Returns an error when `node` is not an element.
    pub fn set_attribute(&mut self, node: NodeKey, name: &str, value: &str) -> Result<()> {
        let id = self.resolve(node)?;
        let element = self
            .element_mut(id)
            .ok_or_else(|| anyhow!("{node:?} is not an element"))?;
        element
            .attributes
            .insert(name.to_ascii_lowercase(), value.to_owned());
        Ok(())
    }

    /// Attach a shadow root to `host`, or return the existing one.
    ///
    /// # Errors
    /// Returns an error when `host` is not an element.
    pub fn attach_shadow(&mut self, host: NodeKey) -> Result<NodeKey> {
        let host_id = self.resolve(host)?;
        let existing = self
            .element(host_id)
            .ok_or_else(|| anyhow!("{host:?} is not an element"))?
            .shadow_root;
        if let Some(root) = existing {
            return Ok(self.key_of(root));
        }
        let root = self.arena.new_node(NodeKind::Fragment { host: Some(host_id) });
        if let Some(element) = self.element_mut(host_id) {
            element.shadow_root = Some(root);
        }
        Ok(self.key_of(root))
    }

    /// Create a `<style>` holding `text` and append it to `parent`.
    ///
    /// # Errors
    /// Returns an error when `parent` is unknown.
    pub fn append_style(&mut self, parent: NodeKey, text: &str) -> Result<NodeKey> {
        let style = self.create_style(text)?;
        self.append_child(parent, style)?;
        Ok(style)
    }

    pub fn inline_property(&self, node: NodeKey, name: &str) -> Option<String> {
        let id = self.lookup(node)?;
        self.element(id)?.inline_style.get(name).cloned()
    }

    pub fn parent(&self, node: NodeKey) -> Option<NodeKey> {
        let id = self.lookup(node)?;
        self.lookup_parent_key(id)
    }

    /// Parent element, crossing from a shadow root to its host.
    fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = self.arena.get(id)?.parent()?;
        loop {
            match self.kind(cursor)? {
                NodeKind::Element(_) => return Some(cursor),
                NodeKind::Fragment { host } => cursor = (*host)?,
                NodeKind::Document | NodeKind::Text(_) | NodeKind::Comment(_) => return None,
            }
        }
    }

    /// Custom properties in effect on `id`, nearer declarations winning.
    fn custom_properties(&self, id: NodeId) -> CustomProperties {
        let mut chain = vec![id];
        let mut cursor = id;
        while let Some(parent) = self.parent_element(cursor) {
            chain.push(parent);
            cursor = parent;
        }
        let mut properties = CustomProperties::new();
        for element in chain.iter().rev().filter_map(|ancestor| self.element(*ancestor)) {
            let declared: HashMap<String, String> = element
                .inline_style
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            properties.extend(extract_custom_properties(&declared));
        }
        properties
    }

    fn computed(&self, id: NodeId, name: &str) -> Option<String> {
        let element = self.element(id)?;
        let custom = self.custom_properties(id);
        let empty = CustomProperties::new();
        if name.starts_with("--") {
            return custom
                .get(name)
                .map(|raw| resolve_vars_in_value(raw, &custom, &empty).trim().to_owned());
        }

        let declared = element
            .inline_style
            .get(name)
            .map(|raw| resolve_vars_in_value(raw, &custom, &empty).trim().to_owned())
            .filter(|value| !value.is_empty());
        if let Some(value) = declared {
            return match value.as_str() {
                "initial" => initial_value(name).map(str::to_owned),
                "inherit" => self
                    .parent_element(id)
                    .and_then(|parent| self.computed(parent, name))
                    .or_else(|| initial_value(name).map(str::to_owned)),
                _ => Some(value),
            };
        }
        if element.inline_style.get("all").is_some_and(|all| all == "initial") {
            return initial_value(name).map(str::to_owned);
        }
        if INHERITED_PROPERTIES.contains(&name)
            && let Some(parent) = self.parent_element(id)
        {
            return self.computed(parent, name);
        }
        initial_value(name).map(str::to_owned)
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for node in id.descendants(&self.arena) {
            if let Some(NodeKind::Text(text)) = self.kind(node) {
                out.push_str(text);
            }
        }
    }
}

impl StyleHost for InMemoryDocument {
    fn text_content(&self, node: NodeKey) -> Option<String> {
        let id = self.lookup(node)?;
        let mut text = String::new();
        self.collect_text(id, &mut text);
        Some(text)
    }

    fn set_text_content(&mut self, node: NodeKey, text: &str) -> Result<()> {
        let id = self.resolve(node)?;
        let children: Vec<NodeId> = id.children(&self.arena).collect();
        for child in children {
            self.discard(child);
        }
        if !text.is_empty() {
            let text_node = self.arena.new_node(NodeKind::Text(text.to_owned()));
            id.checked_append(text_node, &mut self.arena)
                .map_err(|err| anyhow!("setting text of {node:?}: {err:?}"))?;
        }
        Ok(())
    }

    fn local_name(&self, node: NodeKey) -> Option<String> {
        let id = self.lookup(node)?;
        self.element(id).map(|element| element.local_name.clone())
    }

    fn attribute(&self, node: NodeKey, name: &str) -> Option<String> {
        let id = self.lookup(node)?;
        self.element(id)?
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    fn children(&self, node: NodeKey) -> Vec<NodeKey> {
        let Some(id) = self.lookup(node) else {
            return Vec::new();
        };
        id.children(&self.arena)
            .filter(|child| self.element(*child).is_some())
            .filter_map(|child| self.known_key(child))
            .collect()
    }

    fn shadow_root(&self, node: NodeKey) -> Option<NodeKey> {
        let id = self.lookup(node)?;
        self.known_key(self.element(id)?.shadow_root?)
    }

    fn template_content(&self, template: NodeKey) -> Option<NodeKey> {
        let id = self.lookup(template)?;
        self.known_key(self.element(id)?.content?)
    }

    fn leading_comment(&self, node: NodeKey) -> Option<(NodeKey, String)> {
        let id = self.lookup(node)?;
        let first = self.arena.get(id)?.first_child()?;
        match self.kind(first)? {
            NodeKind::Comment(text) => Some((self.known_key(first)?, text.clone())),
            _ => None,
        }
    }

    fn remove_node(&mut self, node: NodeKey) -> Result<()> {
        let id = self.resolve(node)?;
        self.discard(id);
        Ok(())
    }

    fn create_style(&mut self, text: &str) -> Result<NodeKey> {
        let style = self.create_element("style");
        self.set_text_content(style, text)?;
        Ok(style)
    }

    fn insert_first(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        let child_id = self.resolve(child)?;
        child_id.detach(&mut self.arena);
        parent_id
            .checked_prepend(child_id, &mut self.arena)
            .map_err(|err| anyhow!("inserting {child:?} into {parent:?}: {err:?}"))
    }

    fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let parent_id = self.resolve(parent)?;
        let child_id = self.resolve(child)?;
        child_id.detach(&mut self.arena);
        parent_id
            .checked_append(child_id, &mut self.arena)
            .map_err(|err| anyhow!("appending {child:?} to {parent:?}: {err:?}"))
    }

    #[inline]
    fn head(&self) -> NodeKey {
        self.known_key(self.head).unwrap_or(NodeKey::ROOT)
    }

    #[inline]
    fn body(&self) -> NodeKey {
        self.known_key(self.body).unwrap_or(NodeKey::ROOT)
    }

    fn create_measure_probe(&mut self) -> Result<NodeKey> {
        let probe = self.create_element(MEASURE_PROBE_TAG);
        self.set_inline_property(probe, "all", Some("initial"))?;
        let head = self.head();
        self.append_child(head, probe)?;
        trace!("created measuring probe {probe:?}");
        Ok(probe)
    }

    fn set_inline_property(&mut self, node: NodeKey, name: &str, value: Option<&str>) -> Result<()> {
        let id = self.resolve(node)?;
        let element = self
            .element_mut(id)
            .ok_or_else(|| anyhow!("{node:?} is not an element"))?;
        match value {
            Some(value) => {
                element.inline_style.insert(name.to_owned(), value.to_owned());
            }
            None => {
                element.inline_style.shift_remove(name);
            }
        }
        Ok(())
    }

    fn computed_property_value(&self, node: NodeKey, name: &str) -> Option<String> {
        self.computed(self.lookup(node)?, name)
    }

    #[inline]
    fn media_matches(&self, condition: &str) -> bool {
        evaluate_media_query_list(condition, &self.viewport)
    }
}
