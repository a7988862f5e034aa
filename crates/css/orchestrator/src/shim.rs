//! The host-facing shim: caches rule trees per style owner and drives
//! resolution for templates, elements, and document-level custom styles.

use crate::host::{NodeKey, StyleHost};
use crate::probe::HostProbe;
use crate::settings::ShimSettings;
use core::mem;
use css_apply::{ResolutionContext, Resolver, TemplateState, detect_mixin_usage};
use css_syntax::{RuleId, RuleTree, parse, serialize};
use log::{debug, info, trace, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::info_span;

const CSS_BUILD_MARKER: &str = "css-build";
const SHADY_UNSCOPED: &str = "shady-unscoped";

/// Rule tree of a style owner plus the text the shim last wrote into it.
#[derive(Clone, Debug)]
struct CachedSheet {
    written_text: String,
    tree: RuleTree,
}

#[derive(Clone, Copy, Debug)]
enum SheetKind<'scope> {
    Scoped(Option<&'scope str>),
    Custom,
}

/// Resolves `@apply` mixins and custom-property blocks for the documents of
/// a [`StyleHost`].
pub struct ApplyShim<H: StyleHost> {
    host: H,
    settings: ShimSettings,
    context: ResolutionContext,
    probe: Option<NodeKey>,
    sheets: FxHashMap<NodeKey, CachedSheet>,
    /// Template -> the style gathered from its content, if it had any.
    gathered: FxHashMap<NodeKey, Option<NodeKey>>,
    css_builds: FxHashMap<NodeKey, String>,
    templates: FxHashMap<String, NodeKey>,
    hoisted: FxHashSet<String>,
    custom_styles: Vec<NodeKey>,
    pending_custom_styles: Vec<NodeKey>,
}

impl<H: StyleHost> ApplyShim<H> {
    pub fn new(host: H, settings: ShimSettings) -> Self {
        Self {
            host,
            settings,
            context: ResolutionContext::new(),
            probe: None,
            sheets: FxHashMap::default(),
            gathered: FxHashMap::default(),
            css_builds: FxHashMap::default(),
            templates: FxHashMap::default(),
            hoisted: FxHashSet::default(),
            custom_styles: Vec::new(),
            pending_custom_styles: Vec::new(),
        }
    }

    #[inline]
    pub fn host(&self) -> &H {
        &self.host
    }

    #[inline]
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[inline]
    pub fn into_host(self) -> H {
        self.host
    }

    #[inline]
    pub fn settings(&self) -> &ShimSettings {
        &self.settings
    }

    #[inline]
    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    /// Whether serialized output keeps custom properties and `@apply`.
    #[inline]
    pub fn preserve_custom_syntax(&self) -> bool {
        self.settings.effective_native_css()
    }

    /// True if `text` contains an `@apply` or a custom-property declaration.
    #[inline]
    pub fn detect_mixin(&self, text: &str) -> bool {
        detect_mixin_usage(text)
    }

    /// Install the callback invoked with a scope name whenever that scope's
    /// mixin usage becomes stale.
    pub fn set_invalidation_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.context.set_invalidation_hook(callback);
    }

    /// The host's computed value for `name`, trimmed, or `""`.
    pub fn computed_style_value(&self, node: NodeKey, name: &str) -> String {
        self.host
            .computed_property_value(node, name)
            .map(|value| value.trim().to_owned())
            .unwrap_or_default()
    }

    /// Parse (or reuse), resolve, and rewrite the text of `style`, recording
    /// `scope` as a dependent of every mixin it applies.
    ///
    /// Returns `None` when the owner has no text.
    pub fn transform_style(&mut self, style: NodeKey, scope: Option<&str>) -> Option<&RuleTree> {
        let _span = info_span!("apply_shim.transform_style").entered();
        self.transform_owner(style, SheetKind::Scoped(scope))
    }

    /// Like [`ApplyShim::transform_style`] for a document-level style:
    /// `:root` becomes `html` and no dependents are recorded.
    pub fn transform_custom_style(&mut self, style: NodeKey) -> Option<&RuleTree> {
        let _span = info_span!("apply_shim.transform_custom_style").entered();
        self.transform_owner(style, SheetKind::Custom)
    }

    /// Gather the styles of `template` into one style (once per template) and
    /// transform it for `scope`.
    pub fn transform_template(&mut self, template: NodeKey, scope: &str) -> Option<&RuleTree> {
        let _span = info_span!("apply_shim.transform_template").entered();
        let gathered = match self.gathered.get(&template) {
            Some(cached) => *cached,
            None => {
                let style = self.gather_styles(template);
                self.gathered.insert(template, style);
                style
            }
        };
        self.transform_owner(gathered?, SheetKind::Scoped(Some(scope)))
    }

    /// Register `template` under `scope` and transform it, unless it is
    /// prebuilt.
    pub fn prepare_template(&mut self, template: NodeKey, scope: &str) {
        if self.settings.disable_runtime {
            return;
        }
        self.flush_custom_styles();
        self.prepare_template_inner(template, scope);
    }

    /// Bring the shadow style of `element` up to date with its template.
    pub fn style_element(&mut self, element: NodeKey) {
        if self.settings.disable_runtime {
            return;
        }
        self.flush_custom_styles();
        self.style_element_inner(element);
    }

    /// Apply inline `properties` to `element`, then style it and everything
    /// below it, descending through shadow roots.
    ///
    /// A `None` value removes the property.
    pub fn style_subtree(&mut self, element: NodeKey, properties: &[(&str, Option<&str>)]) {
        if self.settings.disable_runtime {
            return;
        }
        self.flush_custom_styles();
        let _span = info_span!("apply_shim.style_subtree").entered();
        self.style_subtree_inner(element, properties);
    }

    /// [`ApplyShim::style_subtree`] starting at the document body.
    pub fn style_document(&mut self, properties: &[(&str, Option<&str>)]) {
        let body = self.host.body();
        self.style_subtree(body, properties);
    }

    /// Queue a document-level custom style for the next flush.
    pub fn add_custom_style(&mut self, style: NodeKey) {
        if !self.custom_styles.contains(&style) {
            self.custom_styles.push(style);
        }
        if !self.pending_custom_styles.contains(&style) {
            self.pending_custom_styles.push(style);
        }
    }

    /// Every custom style ever added, in insertion order.
    #[inline]
    pub fn custom_styles(&self) -> &[NodeKey] {
        &self.custom_styles
    }

    /// Transform every queued custom style.
    pub fn flush_custom_styles(&mut self) {
        if self.pending_custom_styles.is_empty() {
            return;
        }
        let _span = info_span!("apply_shim.flush_custom_styles").entered();
        let pending = mem::take(&mut self.pending_custom_styles);
        for style in &pending {
            if self.transform_custom_style(*style).is_none() {
                debug!("custom style {style:?} has no text");
            }
        }
        info!("flushed {} custom styles", pending.len());
    }

    /// The host's microtask checkpoint: run pending version settles.
    #[inline]
    pub fn run_microtasks(&mut self) -> usize {
        self.context.run_microtasks()
    }

    #[inline]
    pub fn template_state(&self, scope: &str) -> Option<TemplateState> {
        self.context.template_state(scope)
    }

    /// Cached rule tree of a style owner.
    pub fn sheet(&self, owner: NodeKey) -> Option<&RuleTree> {
        self.sheets.get(&owner).map(|cached| &cached.tree)
    }

    /// Rule tree prepared for the template registered under `scope`.
    pub fn template_sheet(&self, scope: &str) -> Option<&RuleTree> {
        let template = self.templates.get(scope)?;
        let style = (*self.gathered.get(template)?)?;
        self.sheet(style)
    }

    /// Style rules of `owner`'s cached tree whose `@media` conditions match
    /// the host.
    pub fn active_style_rules(&self, owner: NodeKey) -> Vec<RuleId> {
        let Some(cached) = self.sheets.get(&owner) else {
            return Vec::new();
        };
        let host = &self.host;
        let matcher = |condition: &str| host.media_matches(condition);
        cached.tree.style_rules(Some(&matcher))
    }

    fn transform_owner(&mut self, owner: NodeKey, kind: SheetKind<'_>) -> Option<&RuleTree> {
        let text = self.host.text_content(owner)?;
        let reuse = self
            .sheets
            .get(&owner)
            .is_some_and(|cached| cached.written_text == text);
        if !reuse {
            if text.trim().is_empty() {
                self.sheets.remove(&owner);
                return None;
            }
            trace!("parsing stylesheet {owner:?}");
            self.sheets.insert(
                owner,
                CachedSheet {
                    written_text: String::new(),
                    tree: parse(&text),
                },
            );
        }

        let preserve = self.preserve_custom_syntax();
        let cached = self.sheets.get_mut(&owner)?;
        {
            let mut probe = HostProbe::new(&mut self.host, &mut self.probe);
            let mut resolver = Resolver::new(&mut self.context, &mut probe);
            match kind {
                SheetKind::Scoped(scope) => resolver.transform_rules(&mut cached.tree, scope),
                SheetKind::Custom => {
                    for rule in cached.tree.style_rules(None) {
                        let node = &mut cached.tree[rule];
                        if node.selector == ":root" {
                            "html".clone_into(&mut node.selector);
                        }
                        resolver.transform_rule(&mut cached.tree, rule);
                    }
                }
            }
        }

        let output = serialize(&cached.tree, preserve);
        if let Err(err) = self.host.set_text_content(owner, &output) {
            warn!("could not write stylesheet {owner:?}: {err:#}");
        }
        info!(
            "transformed stylesheet {owner:?} ({} rules, {kind:?})",
            cached.tree.len()
        );
        cached.written_text = output;
        Some(&cached.tree)
    }

    /// Move the text of every scoped style in the template content into one
    /// style prepended to the content.
    fn gather_styles(&mut self, template: NodeKey) -> Option<NodeKey> {
        let content = self.host.template_content(template)?;
        let mut texts = Vec::new();
        for style in self.host.descendant_styles(content) {
            let text = self.host.text_content(style).unwrap_or_default();
            if self.host.attribute(style, SHADY_UNSCOPED).is_some() {
                if self.settings.native_shadow {
                    continue;
                }
                self.hoist_unscoped(&text);
            } else {
                texts.push(text);
            }
            if let Err(err) = self.host.remove_node(style) {
                warn!("could not remove template style {style:?}: {err:#}");
            }
        }

        let joined = texts.concat();
        let text = joined.trim();
        if text.is_empty() {
            return None;
        }
        let style = match self.host.create_style(text) {
            Ok(style) => style,
            Err(err) => {
                warn!("could not create gathered style: {err:#}");
                return None;
            }
        };
        if let Err(err) = self.host.insert_first(content, style) {
            warn!("could not insert gathered style: {err:#}");
        }
        debug!("gathered {} styles of template {template:?}", texts.len());
        Some(style)
    }

    /// Copy an unscoped style into the document head, once per distinct text.
    fn hoist_unscoped(&mut self, text: &str) {
        if !self.hoisted.insert(text.to_owned()) {
            return;
        }
        let head = self.host.head();
        let hoisted = self
            .host
            .create_style(text)
            .and_then(|style| self.host.append_child(head, style));
        if let Err(err) = hoisted {
            warn!("could not hoist unscoped style: {err:#}");
        }
    }

    /// The css-build marker of `template`: the global setting, the
    /// `css-build` attribute, or a leading `css-build:<name>` comment, which
    /// is removed once read.
    fn css_build(&mut self, template: NodeKey) -> String {
        if let Some(global) = self.settings.css_build() {
            return global.to_owned();
        }
        if let Some(cached) = self.css_builds.get(&template) {
            return cached.clone();
        }
        let build = match self.host.attribute(template, CSS_BUILD_MARKER) {
            Some(attribute) if !attribute.is_empty() => attribute,
            _ => self.css_build_comment(template),
        };
        self.css_builds.insert(template, build.clone());
        build
    }

    fn css_build_comment(&mut self, template: NodeKey) -> String {
        let container = if self.host.local_name(template).as_deref() == Some("template") {
            self.host.template_content(template)
        } else {
            Some(template)
        };
        let Some((comment, text)) = container.and_then(|node| self.host.leading_comment(node))
        else {
            return String::new();
        };
        let Some(build) = text
            .trim()
            .strip_prefix(CSS_BUILD_MARKER)
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|build| !build.is_empty())
            .map(str::to_owned)
        else {
            return String::new();
        };
        if let Err(err) = self.host.remove_node(comment) {
            warn!("could not remove css-build comment: {err:#}");
        }
        build
    }

    fn prepare_template_inner(&mut self, template: NodeKey, scope: &str) {
        let _span = info_span!("apply_shim.prepare_template").entered();
        let build = self.css_build(template);
        if !build.is_empty() {
            debug!("template for `{scope}` is prebuilt ({build}); skipping");
            return;
        }
        self.templates.insert(scope.to_owned(), template);
        self.context.register_template(scope);
        if self.transform_template(template, scope).is_none() {
            trace!("template for `{scope}` has no styles");
        }
    }

    /// Scope of an element: a custom element's tag name, else its `is`
    /// attribute.
    fn scope_of(&self, element: NodeKey) -> String {
        match self.host.local_name(element) {
            Some(name) if name.contains('-') => name,
            _ => self.host.attribute(element, "is").unwrap_or_default(),
        }
    }

    fn style_element_inner(&mut self, element: NodeKey) {
        let scope = self.scope_of(element);
        let Some(&template) = self.templates.get(&scope) else {
            return;
        };
        if !self.css_build(template).is_empty() {
            return;
        }
        let Some(versions) = self.context.template(&scope) else {
            return;
        };
        if versions.is_fresh() {
            return;
        }
        if versions.validating() != versions.next() {
            debug!("re-preparing stale template for `{scope}`");
            self.prepare_template_inner(template, &scope);
            self.context.begin_validation(&scope);
        }

        let Some(shadow) = self.host.shadow_root(element) else {
            return;
        };
        let Some(&style) = self.host.descendant_styles(shadow).first() else {
            return;
        };
        let Some(tree) = self.template_sheet(&scope).cloned() else {
            return;
        };
        let text = serialize(&tree, self.preserve_custom_syntax());
        if let Err(err) = self.host.set_text_content(style, &text) {
            warn!("could not restyle {element:?}: {err:#}");
            return;
        }
        self.sheets.insert(
            style,
            CachedSheet {
                written_text: text,
                tree,
            },
        );
    }

    fn style_subtree_inner(&mut self, element: NodeKey, properties: &[(&str, Option<&str>)]) {
        for &(name, value) in properties {
            if let Err(err) = self.host.set_inline_property(element, name, value) {
                warn!("could not set {name} on {element:?}: {err:#}");
            }
        }
        let children = if let Some(shadow) = self.host.shadow_root(element) {
            self.style_element_inner(element);
            self.host.children(shadow)
        } else {
            self.host.children(element)
        };
        for child in children {
            self.style_subtree_inner(child, &[]);
        }
    }
}
