//! RM 1.1.0 `COMPOSITION` wire model and translation helpers.
//!
//! Responsibilities:
//! - Define a strict wire model ([`CompositionWire`]) for serialisation/deserialisation.
//! - Translate the wire model into a [`Composition`] through [`CompositionBuilder`], so that a
//!   document read from disk passes exactly the same construction rules as one built in code.
//! - Render a [`Composition`] back to the wire model.
//!
//! Notes:
//! - Mandatory composition fields are `Option` on the wire. A missing `category` is reported as
//!   [`ValidityError::MissingCategory`](crate::ValidityError::MissingCategory) rather than as a
//!   schema mismatch.
//! - A content item is a mapping with exactly one of `section` or `entry`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ehr_types::NonEmptyText;
use serde::{Deserialize, Serialize};

use crate::archetyped::{Archetyped, FeederAudit, Link};
use crate::category::PersistencePolicy;
use crate::composition::{Composition, CompositionBuilder};
use crate::content::{ContentItem, Entry, EntryKind, Section};
use crate::context::{EventContext, PartyIdentified, Participation};
use crate::data_types::{CodePhrase, DvCodedText, DvText};
use crate::identification::HierObjectId;
use crate::locatable::Locatable;
use crate::terminology::TerminologyService;
use crate::{OpenEhrError, OpenEhrResult};

/// RM 1.x-aligned wire representation of `COMPOSITION`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CompositionWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<HierObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype_node_id: Option<NonEmptyText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<DvText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype_details: Option<Archetyped>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeder_audit: Option<FeederAudit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DvCodedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territory: Option<CodePhrase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<EventContextWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<SectionWire>>,
}

/// RM `SECTION`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SectionWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<HierObjectId>,
    pub archetype_node_id: NonEmptyText,
    pub name: DvText,
    pub archetype_details: Archetyped,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeder_audit: Option<FeederAudit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ContentItemWire>>,
}

/// RM `ENTRY` subtypes, distinguished by `kind`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EntryWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<HierObjectId>,
    pub archetype_node_id: NonEmptyText,
    pub name: DvText,
    pub archetype_details: Archetyped,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeder_audit: Option<FeederAudit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    pub kind: EntryKind,
    pub language: CodePhrase,
}

/// A value of a section's `items`: exactly one of `section` or `entry`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContentItemWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<SectionWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryWire>,
}

/// RM `EVENT_CONTEXT`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EventContextWire {
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<NonEmptyText>,
    pub setting: DvCodedText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_care_facility: Option<PartyIdentified>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participations: Option<Vec<Participation>>,
}

impl CompositionWire {
    /// Runs the construction rules over the wire fields.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::StructuralValidity`] if a section, entry, context or the
    /// composition itself is invalid, or [`OpenEhrError::Translation`] if a content item is not
    /// exactly one of `section` or `entry`.
    pub fn into_composition(
        self,
        terminology: &dyn TerminologyService,
        policy: &dyn PersistencePolicy,
    ) -> OpenEhrResult<Composition> {
        let content = self
            .content
            .map(|sections| {
                sections
                    .into_iter()
                    .map(SectionWire::into_section)
                    .collect::<OpenEhrResult<Vec<_>>>()
            })
            .transpose()?;
        let context = self.context.map(EventContextWire::into_context).transpose()?;

        let mut builder = Composition::builder();
        builder = set(builder, self.uid, CompositionBuilder::uid);
        builder = set(builder, self.archetype_node_id, CompositionBuilder::archetype_node_id);
        builder = set(builder, self.name, CompositionBuilder::name);
        builder = set(builder, self.archetype_details, CompositionBuilder::archetype_details);
        builder = set(builder, self.feeder_audit, CompositionBuilder::feeder_audit);
        builder = set(builder, link_set(self.links)?, CompositionBuilder::links);
        builder = set(builder, content, CompositionBuilder::content);
        builder = set(builder, context, CompositionBuilder::context);
        builder = set(builder, self.category, CompositionBuilder::category);
        builder = set(builder, self.territory, CompositionBuilder::territory);

        builder.build(terminology, policy)
    }
}

fn set<T>(
    builder: CompositionBuilder,
    value: Option<T>,
    apply: fn(CompositionBuilder, T) -> CompositionBuilder,
) -> CompositionBuilder {
    match value {
        Some(value) => apply(builder, value),
        None => builder,
    }
}

/// Links are a set in the reference model; a repeated link is a translation error.
fn link_set(links: Option<Vec<Link>>) -> OpenEhrResult<Option<BTreeSet<Link>>> {
    let Some(links) = links else {
        return Ok(None);
    };
    let count = links.len();
    let set: BTreeSet<Link> = links.into_iter().collect();
    if set.len() < count {
        return Err(OpenEhrError::Translation(format!(
            "duplicate link in links ({} listed, {} distinct)",
            count,
            set.len()
        )));
    }
    Ok(Some(set))
}

fn link_list(locatable: &Locatable) -> Option<Vec<Link>> {
    locatable.links().map(|links| links.iter().cloned().collect())
}

impl SectionWire {
    fn into_section(self) -> OpenEhrResult<Section> {
        let locatable = Locatable::new(
            self.uid,
            self.archetype_node_id,
            self.name,
            self.archetype_details,
            self.feeder_audit,
            link_set(self.links)?,
        )?;
        let items = self
            .items
            .map(|items| {
                items
                    .into_iter()
                    .map(ContentItemWire::into_content_item)
                    .collect::<OpenEhrResult<Vec<_>>>()
            })
            .transpose()?;
        Section::new(locatable, items)
    }

    fn from_section(section: &Section) -> Self {
        let locatable = section.locatable();
        Self {
            uid: locatable.uid().cloned(),
            archetype_node_id: node_id(locatable),
            name: locatable.name().clone(),
            archetype_details: locatable.archetype_details().clone(),
            feeder_audit: locatable.feeder_audit().cloned(),
            links: link_list(locatable),
            items: section
                .items()
                .map(|items| items.iter().map(ContentItemWire::from_content_item).collect()),
        }
    }
}

impl EntryWire {
    fn into_entry(self) -> OpenEhrResult<Entry> {
        let locatable = Locatable::new(
            self.uid,
            self.archetype_node_id,
            self.name,
            self.archetype_details,
            self.feeder_audit,
            link_set(self.links)?,
        )?;
        Ok(Entry::new(locatable, self.kind, self.language))
    }

    fn from_entry(entry: &Entry) -> Self {
        let locatable = entry.locatable();
        Self {
            uid: locatable.uid().cloned(),
            archetype_node_id: node_id(locatable),
            name: locatable.name().clone(),
            archetype_details: locatable.archetype_details().clone(),
            feeder_audit: locatable.feeder_audit().cloned(),
            links: link_list(locatable),
            kind: entry.kind(),
            language: entry.language().clone(),
        }
    }
}

impl ContentItemWire {
    fn into_content_item(self) -> OpenEhrResult<ContentItem> {
        match (self.section, self.entry) {
            (Some(section), None) => Ok(section.into_section()?.into()),
            (None, Some(entry)) => Ok(entry.into_entry()?.into()),
            (Some(_), Some(_)) => Err(OpenEhrError::Translation(
                "content item has both 'section' and 'entry'".into(),
            )),
            (None, None) => Err(OpenEhrError::Translation(
                "content item has neither 'section' nor 'entry'".into(),
            )),
        }
    }

    fn from_content_item(item: &ContentItem) -> Self {
        match item {
            ContentItem::Section(section) => Self {
                section: Some(SectionWire::from_section(section)),
                entry: None,
            },
            ContentItem::Entry(entry) => Self {
                section: None,
                entry: Some(EntryWire::from_entry(entry)),
            },
        }
    }
}

impl EventContextWire {
    fn into_context(self) -> OpenEhrResult<EventContext> {
        EventContext::new(
            self.start_time,
            self.end_time,
            self.location,
            self.setting,
            self.health_care_facility,
            self.participations,
        )
    }

    fn from_context(context: &EventContext) -> Self {
        Self {
            start_time: context.start_time(),
            end_time: context.end_time(),
            location: context.location().and_then(|location| NonEmptyText::new(location).ok()),
            setting: context.setting().clone(),
            health_care_facility: context.health_care_facility().cloned(),
            participations: context.participations().map(<[Participation]>::to_vec),
        }
    }
}

impl From<&Composition> for CompositionWire {
    fn from(composition: &Composition) -> Self {
        let locatable = composition.locatable();
        Self {
            uid: locatable.uid().cloned(),
            archetype_node_id: Some(node_id(locatable)),
            name: Some(locatable.name().clone()),
            archetype_details: Some(locatable.archetype_details().clone()),
            feeder_audit: locatable.feeder_audit().cloned(),
            links: link_list(locatable),
            category: Some(composition.category().clone()),
            territory: Some(composition.territory().clone()),
            context: composition.context().map(EventContextWire::from_context),
            content: composition
                .content()
                .map(|sections| sections.iter().map(SectionWire::from_section).collect()),
        }
    }
}

fn node_id(locatable: &Locatable) -> NonEmptyText {
    locatable.archetype_node_id_text().clone()
}

/// Strictly parse an RM 1.1.0 `COMPOSITION` wire document from YAML text.
///
/// This uses `serde_path_to_error` to surface the path (e.g. `content[0].items[1].entry.kind`)
/// to the failing field when the YAML does not match the wire schema.
///
/// # Errors
///
/// Returns [`OpenEhrError::Translation`] if:
/// - the YAML does not represent a `COMPOSITION` mapping,
/// - any field has an unexpected type,
/// - any unknown keys are present (due to `#[serde(deny_unknown_fields)]`).
pub fn composition_wire_parse(yaml_text: &str) -> Result<CompositionWire, OpenEhrError> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    match serde_path_to_error::deserialize(deserializer) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(OpenEhrError::Translation(format!(
                "COMPOSITION schema mismatch at {path}: {source}"
            )))
        }
    }
}

/// Parse an RM 1.1.0 `COMPOSITION` from YAML and construct it under the full rule set.
///
/// # Errors
///
/// Returns [`OpenEhrError::Translation`] for schema mismatches and
/// [`OpenEhrError::StructuralValidity`] for documents that parse but break a construction rule.
pub fn composition_parse(
    yaml_text: &str,
    terminology: &dyn TerminologyService,
    policy: &dyn PersistencePolicy,
) -> Result<Composition, OpenEhrError> {
    composition_wire_parse(yaml_text)?.into_composition(terminology, policy)
}

/// Render a composition as RM 1.1.0 YAML.
///
/// # Errors
///
/// Returns [`OpenEhrError`] if serialisation fails.
pub fn composition_render(composition: &Composition) -> Result<String, OpenEhrError> {
    Ok(serde_yaml::to_string(&CompositionWire::from(composition))?)
}
