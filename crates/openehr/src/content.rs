//! Composition content: sections and entries.
//!
//! Only their role as addressable tree children is modelled. A section groups further content
//! items under its `items` attribute; an entry is a leaf carrying its clinical kind and
//! language.

use serde::{Deserialize, Serialize};

use crate::data_types::CodePhrase;
use crate::locatable::Locatable;
use crate::path::Item;
use crate::{OpenEhrError, ValidityError};

/// RM `SECTION`: a navigational heading grouping other content items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    locatable: Locatable,
    items: Option<Vec<ContentItem>>,
}

impl Section {
    /// # Errors
    ///
    /// Returns [`ValidityError::EmptySectionItems`] if `items` is present but empty.
    pub fn new(locatable: Locatable, items: Option<Vec<ContentItem>>) -> Result<Self, OpenEhrError> {
        if items.as_ref().is_some_and(Vec::is_empty) {
            return Err(ValidityError::EmptySectionItems.into());
        }
        Ok(Self { locatable, items })
    }

    pub fn locatable(&self) -> &Locatable {
        &self.locatable
    }

    pub fn items(&self) -> Option<&[ContentItem]> {
        self.items.as_deref()
    }

    pub fn archetype_node_id(&self) -> &str {
        self.locatable.archetype_node_id()
    }

    pub fn name(&self) -> &str {
        self.locatable.name().as_str()
    }
}

/// The clinical kind of an [`Entry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Observation,
    Evaluation,
    Instruction,
    Action,
    AdminEntry,
}

impl EntryKind {
    /// RM class name, as used in diagnostics and listings.
    pub fn rm_type_name(self) -> &'static str {
        match self {
            EntryKind::Observation => "OBSERVATION",
            EntryKind::Evaluation => "EVALUATION",
            EntryKind::Instruction => "INSTRUCTION",
            EntryKind::Action => "ACTION",
            EntryKind::AdminEntry => "ADMIN_ENTRY",
        }
    }
}

/// RM `ENTRY` (leaf content item).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    locatable: Locatable,
    kind: EntryKind,
    language: CodePhrase,
}

impl Entry {
    pub fn new(locatable: Locatable, kind: EntryKind, language: CodePhrase) -> Self {
        Self {
            locatable,
            kind,
            language,
        }
    }

    pub fn locatable(&self) -> &Locatable {
        &self.locatable
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn language(&self) -> &CodePhrase {
        &self.language
    }

    pub fn archetype_node_id(&self) -> &str {
        self.locatable.archetype_node_id()
    }

    pub fn name(&self) -> &str {
        self.locatable.name().as_str()
    }
}

/// RM `CONTENT_ITEM`: a value of a section's `items` attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentItem {
    Section(Section),
    Entry(Entry),
}

impl ContentItem {
    pub fn locatable(&self) -> &Locatable {
        match self {
            ContentItem::Section(section) => section.locatable(),
            ContentItem::Entry(entry) => entry.locatable(),
        }
    }

    /// Borrows the contained node as a path [`Item`].
    pub fn as_item(&self) -> Item<'_> {
        match self {
            ContentItem::Section(section) => Item::Section(section),
            ContentItem::Entry(entry) => Item::Entry(entry),
        }
    }
}

impl From<Section> for ContentItem {
    fn from(section: Section) -> Self {
        ContentItem::Section(section)
    }
}

impl From<Entry> for ContentItem {
    fn from(entry: Entry) -> Self {
        ContentItem::Entry(entry)
    }
}
