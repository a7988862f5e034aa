//! Host-facing apply shim.
//!
//! [`ApplyShim`] owns the resolution context and a per-owner cache of rule
//! trees, and talks to the document only through the [`StyleHost`] trait.
//! [`InMemoryDocument`] is a small arena-backed host for tools and tests.

mod document;
mod host;
mod probe;
mod settings;
mod shim;

pub use css_apply::{ResolutionContext, Revision, TemplateState};
pub use css_syntax::{Rule, RuleId, RuleTree, RuleType};
pub use document::{ElementData, InMemoryDocument, NodeKind};
pub use host::{NodeKey, StyleHost};
pub use probe::HostProbe;
pub use settings::ShimSettings;
pub use shim::ApplyShim;
