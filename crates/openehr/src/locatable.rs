//! RM `LOCATABLE`: the base state every node of a composition tree carries.
//!
//! The reference model expresses this as a superclass. Here the composition, sections and
//! entries each embed a [`Locatable`] and call into it explicitly: for the archetype-root check
//! and for base path resolution.

use std::collections::BTreeSet;

use ehr_types::NonEmptyText;

use crate::archetyped::{Archetyped, FeederAudit, Link};
use crate::constants::{LINKS_ATTRIBUTE, ROOT_PATH};
use crate::data_types::DvText;
use crate::identification::HierObjectId;
use crate::path::{self, Item};
use crate::{OpenEhrError, ValidityError};

/// Identity, archetype metadata and links of a tree node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Locatable {
    uid: Option<HierObjectId>,
    archetype_node_id: NonEmptyText,
    name: DvText,
    archetype_details: Archetyped,
    feeder_audit: Option<FeederAudit>,
    links: Option<BTreeSet<Link>>,
}

/// What base path resolution found.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BaseMatch<'a> {
    /// The path addresses the node itself.
    Whole,
    /// The path addresses one of the node's links.
    Link(&'a Link),
}

impl Locatable {
    /// Creates the locatable base of a node.
    ///
    /// # Errors
    ///
    /// Returns [`ValidityError::EmptyLinks`] if `links` is present but empty. "No links" is
    /// expressed as `None`.
    pub fn new(
        uid: Option<HierObjectId>,
        archetype_node_id: NonEmptyText,
        name: DvText,
        archetype_details: Archetyped,
        feeder_audit: Option<FeederAudit>,
        links: Option<BTreeSet<Link>>,
    ) -> Result<Self, OpenEhrError> {
        if links.as_ref().is_some_and(BTreeSet::is_empty) {
            return Err(ValidityError::EmptyLinks.into());
        }

        Ok(Self {
            uid,
            archetype_node_id,
            name,
            archetype_details,
            feeder_audit,
            links,
        })
    }

    pub fn uid(&self) -> Option<&HierObjectId> {
        self.uid.as_ref()
    }

    pub fn archetype_node_id(&self) -> &str {
        self.archetype_node_id.as_str()
    }

    pub(crate) fn archetype_node_id_text(&self) -> &NonEmptyText {
        &self.archetype_node_id
    }

    pub fn name(&self) -> &DvText {
        &self.name
    }

    pub fn archetype_details(&self) -> &Archetyped {
        &self.archetype_details
    }

    pub fn feeder_audit(&self) -> Option<&FeederAudit> {
        self.feeder_audit.as_ref()
    }

    pub fn links(&self) -> Option<&BTreeSet<Link>> {
        self.links.as_ref()
    }

    pub(crate) fn links_iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().flatten()
    }

    /// Returns `true` if this node is the root of the archetype named in its details.
    pub fn is_archetype_root(&self) -> bool {
        self.archetype_details.marks_root(self.archetype_node_id())
    }

    /// Path of this node relative to itself: `/[<archetype_node_id>]`.
    pub fn whole(&self) -> String {
        format!("/[{}]", self.archetype_node_id)
    }

    /// Resolves a path against this node's own identity and links.
    ///
    /// `/` and [`Locatable::whole`] address the node itself; `/links[...]` addresses a single
    /// link by position or meaning. Anything else, including malformed paths, yields `None`
    /// so the owning node can continue with its own attributes.
    pub fn item_at_path(&self, path: &str) -> Option<BaseMatch<'_>> {
        let path = path::normalise(path).ok()?;
        if path == ROOT_PATH || path == self.whole() {
            return Some(BaseMatch::Whole);
        }

        let segments = path::parse_segments(path).ok()?;
        let [segment] = segments.as_slice() else {
            return None;
        };
        if segment.attribute != LINKS_ATTRIBUTE {
            return None;
        }

        let links: Vec<Item<'_>> = self.links_iter().map(Item::Link).collect();
        match path::select(&links, &segment.predicate, path).ok()? {
            Item::Link(link) => Some(BaseMatch::Link(link)),
            _ => None,
        }
    }
}
