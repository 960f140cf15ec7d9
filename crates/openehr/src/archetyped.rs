//! Archetype metadata, feeder audit and links carried by every locatable node.

use ehr_types::NonEmptyText;
use serde::{Deserialize, Serialize};

use crate::data_types::{ArchetypeId, DvEhrUri, DvText};
use crate::OpenEhrError;

/// RM `ARCHETYPED`: which archetype (and optionally template) constrains a subtree.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Archetyped {
    pub archetype_id: ArchetypeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<NonEmptyText>,

    /// Reference model release the data was created against (for example `1.1.0`).
    pub rm_version: NonEmptyText,
}

impl Archetyped {
    pub fn new(
        archetype_id: ArchetypeId,
        template_id: Option<NonEmptyText>,
        rm_version: NonEmptyText,
    ) -> Self {
        Self {
            archetype_id,
            template_id,
            rm_version,
        }
    }

    /// Returns `true` if a node with `archetype_node_id` is the root of the subtree these
    /// details describe.
    ///
    /// The root node of an archetype carries the archetype id itself as its node id.
    pub fn marks_root(&self, archetype_node_id: &str) -> bool {
        ArchetypeId::parse(archetype_node_id).is_ok_and(|id| id == self.archetype_id)
    }
}

/// RM `FEEDER_AUDIT` (reduced to the originating and feeder system identifiers).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeederAudit {
    pub originating_system_id: NonEmptyText,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeder_system_id: Option<NonEmptyText>,
}

/// RM `LINK`: a typed, non-owning reference from one locatable to another.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(deny_unknown_fields)]
pub struct Link {
    /// Clinical meaning of the relation (for example "follow-up to").
    pub meaning: DvText,

    /// Computable type of the relation (for example "problem").
    #[serde(rename = "type")]
    pub type_: DvText,

    pub target: DvEhrUri,
}

impl Link {
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidInput`] if any part is empty or the target is not an
    /// `ehr:` URI.
    pub fn new(
        meaning: impl AsRef<str>,
        type_: impl AsRef<str>,
        target: impl AsRef<str>,
    ) -> Result<Self, OpenEhrError> {
        Ok(Self {
            meaning: DvText::new(meaning)?,
            type_: DvText::new(type_)?,
            target: DvEhrUri::new(target)?,
        })
    }
}
