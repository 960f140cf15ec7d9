//! RM `COMPOSITION`: the unit of modification, transmission and attestation of the record.
//!
//! A [`Composition`] is immutable. It can only be obtained through [`Composition::new`] or
//! [`CompositionBuilder::build`], both of which run every construction rule before any field
//! is captured, so an invalid composition is never observable. A changed composition is a new
//! value: start from [`Composition::builder_from`] and build again.
//!
//! Rules, in the order they are checked (the first violation is reported):
//!
//! 1. `archetype_node_id`, `name` and `archetype_details` are present; `links`, if present, is
//!    not empty.
//! 2. The composition is the root of its archetype.
//! 3. `content`, if present, is not empty.
//! 4. A persistent category has no `context`.
//! 5. `category` is present.
//! 6. `territory` is present.
//! 7. `category` is coded in the openEHR terminology and is in its `composition category`
//!    group.
//! 8. `territory` is in the `countries` code set.

use std::collections::BTreeSet;

use ehr_types::NonEmptyText;

use crate::archetyped::{Archetyped, FeederAudit, Link};
use crate::category::PersistencePolicy;
use crate::constants::{
    COMPOSITION_CATEGORY_GROUP, COUNTRIES_CODE_SET, GROUP_LANGUAGE, OPENEHR_TERMINOLOGY_ID,
};
use crate::content::Section;
use crate::context::EventContext;
use crate::data_types::{CodePhrase, DvCodedText, DvText};
use crate::identification::HierObjectId;
use crate::locatable::{BaseMatch, Locatable};
use crate::path::{self, Item};
use crate::terminology::TerminologyService;
use crate::{OpenEhrError, OpenEhrResult, ValidityError};

/// An immutable, validated openEHR composition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Composition {
    locatable: Locatable,
    content: Option<Vec<Section>>,
    context: Option<EventContext>,
    category: DvCodedText,
    territory: CodePhrase,
    persistent: bool,
}

fn reject(rule: ValidityError) -> OpenEhrError {
    tracing::debug!(%rule, "composition rejected");
    OpenEhrError::StructuralValidity(rule)
}

impl Composition {
    /// Starts a builder with no fields set.
    pub fn builder() -> CompositionBuilder {
        CompositionBuilder::default()
    }

    /// Validates and captures a composition around an already constructed locatable base.
    ///
    /// `category` and `territory` are mandatory; passing `None` fails with
    /// [`ValidityError::MissingCategory`] / [`ValidityError::MissingTerritory`] at their place
    /// in the rule order.
    ///
    /// The terminology is consulted at most twice and only after every structural rule has
    /// passed.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::StructuralValidity`] carrying the first violated rule.
    pub fn new(
        locatable: Locatable,
        content: Option<Vec<Section>>,
        context: Option<EventContext>,
        category: Option<DvCodedText>,
        territory: Option<CodePhrase>,
        terminology: &dyn TerminologyService,
        policy: &dyn PersistencePolicy,
    ) -> OpenEhrResult<Self> {
        if !locatable.is_archetype_root() {
            return Err(reject(ValidityError::NotArchetypeRoot));
        }

        if content.as_ref().is_some_and(Vec::is_empty) {
            return Err(reject(ValidityError::EmptyContent));
        }

        let persistent = category
            .as_ref()
            .is_some_and(|category| policy.is_persistent(category));
        if persistent && context.is_some() {
            return Err(reject(ValidityError::PersistentWithContext));
        }

        let category = category.ok_or_else(|| reject(ValidityError::MissingCategory))?;
        let territory = territory.ok_or_else(|| reject(ValidityError::MissingTerritory))?;

        let code = &category.defining_code;
        if code.terminology_id.as_str() != OPENEHR_TERMINOLOGY_ID
            || !terminology.group_contains(code, COMPOSITION_CATEGORY_GROUP, GROUP_LANGUAGE)
        {
            return Err(reject(ValidityError::UnknownCategory(
                category.defining_code.clone(),
            )));
        }

        if !terminology.code_set_contains(COUNTRIES_CODE_SET, &territory) {
            return Err(reject(ValidityError::UnknownTerritory(territory)));
        }

        Ok(Self {
            locatable,
            content,
            context,
            category,
            territory,
            persistent,
        })
    }

    /// A builder pre-filled with the fields of `existing`.
    pub fn builder_from(existing: &Composition) -> CompositionBuilder {
        let locatable = &existing.locatable;
        CompositionBuilder {
            uid: locatable.uid().cloned(),
            archetype_node_id: Some(locatable.archetype_node_id_text().clone()),
            name: Some(locatable.name().clone()),
            archetype_details: Some(locatable.archetype_details().clone()),
            feeder_audit: locatable.feeder_audit().cloned(),
            links: locatable.links().cloned(),
            content: existing.content.clone(),
            context: existing.context.clone(),
            category: Some(existing.category.clone()),
            territory: Some(existing.territory.clone()),
        }
    }

    pub fn locatable(&self) -> &Locatable {
        &self.locatable
    }

    pub fn uid(&self) -> Option<&HierObjectId> {
        self.locatable.uid()
    }

    pub fn archetype_node_id(&self) -> &str {
        self.locatable.archetype_node_id()
    }

    pub fn name(&self) -> &DvText {
        self.locatable.name()
    }

    pub fn archetype_details(&self) -> &Archetyped {
        self.locatable.archetype_details()
    }

    pub fn feeder_audit(&self) -> Option<&FeederAudit> {
        self.locatable.feeder_audit()
    }

    pub fn links(&self) -> Option<&BTreeSet<Link>> {
        self.locatable.links()
    }

    /// The sections of the clinical session, or `None` if the composition has no content.
    pub fn content(&self) -> Option<&[Section]> {
        self.content.as_deref()
    }

    pub fn context(&self) -> Option<&EventContext> {
        self.context.as_ref()
    }

    pub fn category(&self) -> &DvCodedText {
        &self.category
    }

    pub fn territory(&self) -> &CodePhrase {
        &self.territory
    }

    /// Whether the category was classified as persistent when the composition was built.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Resolves `path` to the item it addresses.
    ///
    /// Base resolution (the composition itself, its whole-path, its links) is tried first and
    /// wins when it matches. Otherwise a leading whole-path prefix is stripped and the rest is
    /// followed through `content` and the sections' `items`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidPath`] if the path is malformed or does not address
    /// exactly one item.
    pub fn item_at_path(&self, path: &str) -> OpenEhrResult<Item<'_>> {
        match self.locatable.item_at_path(path) {
            Some(BaseMatch::Whole) => return Ok(Item::Composition(self)),
            Some(BaseMatch::Link(link)) => return Ok(Item::Link(link)),
            None => {}
        }

        let normalised = path::normalise(path)?;
        let whole = self.locatable.whole();
        let relative = normalised.strip_prefix(whole.as_str()).unwrap_or(normalised);
        let segments = path::parse_segments(relative)?;
        if segments.is_empty() {
            return Err(OpenEhrError::InvalidPath(format!("{path}: addresses nothing")));
        }

        path::walk(Item::Composition(self), &segments, path)
    }

    /// Returns `true` if [`Composition::item_at_path`] would succeed.
    pub fn valid_path(&self, path: &str) -> bool {
        self.item_at_path(path).is_ok()
    }

    /// Computes the canonical path of `item`, such that `item_at_path` returns it again.
    ///
    /// `item` is looked up by identity first (a reference obtained from this composition),
    /// then by equality, in depth-first order.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidPath`] if no item of this composition matches.
    pub fn path_of_item<'i>(&self, item: impl Into<Item<'i>>) -> OpenEhrResult<String> {
        let target = item.into();
        let items = self.items();

        items
            .iter()
            .find(|(_, candidate)| candidate.is_same(&target))
            .or_else(|| items.iter().find(|(_, candidate)| *candidate == target))
            .map(|(path, _)| path.clone())
            .ok_or_else(|| {
                OpenEhrError::InvalidPath(format!(
                    "{} '{}' is not part of this composition",
                    target.kind(),
                    target.name()
                ))
            })
    }

    /// Every addressable item with its canonical path, depth first, starting with the
    /// composition itself at `/`.
    pub fn items(&self) -> Vec<(String, Item<'_>)> {
        let root = Item::Composition(self);
        let mut items = vec![(path::root(), root)];
        path::collect(root, "", &mut items);
        items
    }

    /// Canonical paths of every addressable item, depth first.
    pub fn all_paths(&self) -> Vec<String> {
        self.items().into_iter().map(|(path, _)| path).collect()
    }
}

/// Collects composition fields, then validates them all at once in [`CompositionBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct CompositionBuilder {
    uid: Option<HierObjectId>,
    archetype_node_id: Option<NonEmptyText>,
    name: Option<DvText>,
    archetype_details: Option<Archetyped>,
    feeder_audit: Option<FeederAudit>,
    links: Option<BTreeSet<Link>>,
    content: Option<Vec<Section>>,
    context: Option<EventContext>,
    category: Option<DvCodedText>,
    territory: Option<CodePhrase>,
}

impl CompositionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uid(mut self, uid: HierObjectId) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn archetype_node_id(mut self, archetype_node_id: NonEmptyText) -> Self {
        self.archetype_node_id = Some(archetype_node_id);
        self
    }

    pub fn name(mut self, name: DvText) -> Self {
        self.name = Some(name);
        self
    }

    pub fn archetype_details(mut self, archetype_details: Archetyped) -> Self {
        self.archetype_details = Some(archetype_details);
        self
    }

    pub fn feeder_audit(mut self, feeder_audit: FeederAudit) -> Self {
        self.feeder_audit = Some(feeder_audit);
        self
    }

    /// Sets the links. An empty set is kept as given and rejected by `build`.
    pub fn links(mut self, links: BTreeSet<Link>) -> Self {
        self.links = Some(links);
        self
    }

    /// Sets the content. An empty list is kept as given and rejected by `build`.
    pub fn content(mut self, content: Vec<Section>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn context(mut self, context: EventContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn category(mut self, category: DvCodedText) -> Self {
        self.category = Some(category);
        self
    }

    pub fn territory(mut self, territory: CodePhrase) -> Self {
        self.territory = Some(territory);
        self
    }

    /// Drops the context, for example before re-classifying a composition as persistent.
    pub fn without_context(mut self) -> Self {
        self.context = None;
        self
    }

    /// Drops the content.
    pub fn without_content(mut self) -> Self {
        self.content = None;
        self
    }

    /// Runs every construction rule and returns the composition.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::StructuralValidity`] carrying the first violated rule.
    pub fn build(
        self,
        terminology: &dyn TerminologyService,
        policy: &dyn PersistencePolicy,
    ) -> OpenEhrResult<Composition> {
        let archetype_node_id = self
            .archetype_node_id
            .ok_or_else(|| reject(ValidityError::MissingArchetypeNodeId))?;
        let name = self
            .name
            .ok_or_else(|| reject(ValidityError::MissingName))?;
        let archetype_details = self
            .archetype_details
            .ok_or_else(|| reject(ValidityError::MissingArchetypeDetails))?;

        let locatable = Locatable::new(
            self.uid,
            archetype_node_id,
            name,
            archetype_details,
            self.feeder_audit,
            self.links,
        )
        .inspect_err(|err| tracing::debug!(%err, "composition rejected"))?;

        Composition::new(
            locatable,
            self.content,
            self.context,
            self.category,
            self.territory,
            terminology,
            policy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{NeverPersistent, PersistentCodes};
    use crate::constants::{CATEGORY_EVENT, CATEGORY_PERSISTENT, ISO_3166_1};
    use crate::content::{ContentItem, Entry, EntryKind};
    use crate::data_types::ArchetypeId;
    use crate::terminology::SimpleTerminologyService;
    use chrono::{DateTime, Utc};
    use std::cell::Cell;

    const COMPOSITION_ARCHETYPE: &str = "openEHR-EHR-COMPOSITION.encounter.v1";
    const SECTION_ARCHETYPE: &str = "openEHR-EHR-SECTION.adhoc.v1";

    fn text(value: &str) -> NonEmptyText {
        NonEmptyText::new(value).expect("non-empty")
    }

    fn details(archetype: &str) -> Archetyped {
        Archetyped::new(
            ArchetypeId::parse(archetype).expect("valid archetype id"),
            None,
            text("1.1.0"),
        )
    }

    fn locatable(node_id: &str, name: &str, archetype: &str) -> Locatable {
        Locatable::new(
            None,
            text(node_id),
            DvText::new(name).expect("non-empty"),
            details(archetype),
            None,
            None,
        )
        .expect("valid locatable")
    }

    fn entry(node_id: &str, name: &str) -> ContentItem {
        Entry::new(
            locatable(node_id, name, "openEHR-EHR-OBSERVATION.pulse.v1"),
            EntryKind::Observation,
            CodePhrase::new("ISO_639-1", "en").expect("valid code"),
        )
        .into()
    }

    fn section(name: &str, items: Option<Vec<ContentItem>>) -> Section {
        Section::new(locatable(SECTION_ARCHETYPE, name, SECTION_ARCHETYPE), items)
            .expect("valid section")
    }

    fn category(code: &str) -> DvCodedText {
        DvCodedText::new("event", CodePhrase::new("openehr", code).expect("valid code"))
            .expect("valid coded text")
    }

    fn territory(code: &str) -> CodePhrase {
        CodePhrase::new(ISO_3166_1, code).expect("valid code")
    }

    fn context() -> EventContext {
        EventContext::new(
            DateTime::parse_from_rfc3339("2026-01-12T10:14:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
            None,
            None,
            DvCodedText::new(
                "secondary medical care",
                CodePhrase::new("openehr", "232").expect("valid code"),
            )
            .expect("valid coded text"),
            None,
            None,
        )
        .expect("valid context")
    }

    fn valid_builder() -> CompositionBuilder {
        Composition::builder()
            .archetype_node_id(text(COMPOSITION_ARCHETYPE))
            .name(DvText::new("Encounter").expect("non-empty"))
            .archetype_details(details(COMPOSITION_ARCHETYPE))
            .content(vec![
                section("Section A", None),
                section(
                    "Section B",
                    Some(vec![entry("at0001", "Pulse"), entry("at0001", "Pulse rate")]),
                ),
            ])
            .context(context())
            .category(category(CATEGORY_EVENT))
            .territory(territory("SE"))
    }

    fn persistent_policy() -> PersistentCodes {
        PersistentCodes::openehr([CATEGORY_PERSISTENT])
    }

    fn build(builder: CompositionBuilder) -> OpenEhrResult<Composition> {
        builder.build(&SimpleTerminologyService::openehr_default(), &persistent_policy())
    }

    fn violation(result: OpenEhrResult<Composition>) -> ValidityError {
        match result.expect_err("construction should fail") {
            OpenEhrError::StructuralValidity(rule) => rule,
            other => panic!("expected StructuralValidity, got {other:?}"),
        }
    }

    fn valid() -> Composition {
        build(valid_builder()).expect("valid composition")
    }

    #[test]
    fn valid_inputs_are_captured_unchanged() {
        let composition = valid();

        assert_eq!(composition.archetype_node_id(), COMPOSITION_ARCHETYPE);
        assert_eq!(composition.name().as_str(), "Encounter");
        assert_eq!(composition.category(), &category(CATEGORY_EVENT));
        assert_eq!(composition.territory(), &territory("SE"));
        assert_eq!(composition.context(), Some(&context()));
        assert!(!composition.is_persistent());

        let content = composition.content().expect("content present");
        assert_eq!(content.len(), 2);
        assert_eq!(content[0].name(), "Section A");
        assert_eq!(content[1].name(), "Section B");
    }

    #[test]
    fn absent_content_is_valid() {
        let composition = build(valid_builder().without_content()).expect("valid");
        assert!(composition.content().is_none());
        assert_eq!(composition.all_paths(), ["/"]);
    }

    #[test]
    fn rule_base_fields_required() {
        let mut builder = valid_builder();
        builder.archetype_node_id = None;
        assert_eq!(violation(build(builder)), ValidityError::MissingArchetypeNodeId);

        let mut builder = valid_builder();
        builder.name = None;
        assert_eq!(violation(build(builder)), ValidityError::MissingName);

        let mut builder = valid_builder();
        builder.archetype_details = None;
        assert_eq!(violation(build(builder)), ValidityError::MissingArchetypeDetails);
    }

    #[test]
    fn rule_empty_links_rejected() {
        let builder = valid_builder().links(BTreeSet::new());
        assert_eq!(violation(build(builder)), ValidityError::EmptyLinks);
    }

    #[test]
    fn rule_archetype_root_required() {
        let builder = valid_builder().archetype_node_id(text("at0000"));
        assert_eq!(violation(build(builder)), ValidityError::NotArchetypeRoot);

        let builder = valid_builder().archetype_details(details("openEHR-EHR-COMPOSITION.report.v1"));
        assert_eq!(violation(build(builder)), ValidityError::NotArchetypeRoot);
    }

    #[test]
    fn rule_empty_content_rejected() {
        let builder = valid_builder().content(vec![]);
        assert_eq!(violation(build(builder)), ValidityError::EmptyContent);
    }

    #[test]
    fn rule_persistent_category_forbids_context() {
        let builder = valid_builder().category(category(CATEGORY_PERSISTENT));
        assert_eq!(violation(build(builder)), ValidityError::PersistentWithContext);

        let composition = build(
            valid_builder()
                .category(category(CATEGORY_PERSISTENT))
                .without_context(),
        )
        .expect("persistent without context is valid");
        assert!(composition.is_persistent());
        assert!(composition.context().is_none());
    }

    #[test]
    fn persistent_classification_comes_from_the_policy() {
        let composition = valid_builder()
            .category(category(CATEGORY_PERSISTENT))
            .build(&SimpleTerminologyService::openehr_default(), &NeverPersistent)
            .expect("policy says nothing is persistent");
        assert!(!composition.is_persistent());
        assert!(composition.context().is_some());
    }

    #[test]
    fn rule_category_required() {
        let mut builder = valid_builder();
        builder.category = None;
        assert_eq!(violation(build(builder)), ValidityError::MissingCategory);
    }

    #[test]
    fn rule_territory_required() {
        let mut builder = valid_builder();
        builder.territory = None;
        assert_eq!(violation(build(builder)), ValidityError::MissingTerritory);
    }

    #[test]
    fn rule_category_must_be_known() {
        let builder = valid_builder().category(category("999"));
        assert_eq!(
            violation(build(builder)),
            ValidityError::UnknownCategory(CodePhrase::new("openehr", "999").expect("valid"))
        );
    }

    #[test]
    fn rule_territory_must_be_known() {
        let builder = valid_builder().territory(territory("XX"));
        assert_eq!(
            violation(build(builder)),
            ValidityError::UnknownTerritory(territory("XX"))
        );
    }

    #[test]
    fn first_violated_rule_wins() {
        let builder = valid_builder()
            .archetype_node_id(text("at0000"))
            .content(vec![])
            .territory(territory("XX"));
        assert_eq!(violation(build(builder)), ValidityError::NotArchetypeRoot);

        let mut builder = valid_builder().category(category("999"));
        builder.territory = None;
        assert_eq!(violation(build(builder)), ValidityError::MissingTerritory);
    }

    struct CountingTerminology {
        inner: SimpleTerminologyService,
        lookups: Cell<usize>,
    }

    impl TerminologyService for CountingTerminology {
        fn group_contains(&self, code: &CodePhrase, group_name: &str, language: &str) -> bool {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.group_contains(code, group_name, language)
        }

        fn code_set_contains(&self, code_set_id: &str, code: &CodePhrase) -> bool {
            self.lookups.set(self.lookups.get() + 1);
            self.inner.code_set_contains(code_set_id, code)
        }
    }

    #[test]
    fn terminology_is_only_consulted_after_structural_rules() {
        let terminology = CountingTerminology {
            inner: SimpleTerminologyService::openehr_default(),
            lookups: Cell::new(0),
        };

        let err = valid_builder()
            .content(vec![])
            .build(&terminology, &persistent_policy())
            .expect_err("empty content");
        assert!(matches!(
            err,
            OpenEhrError::StructuralValidity(ValidityError::EmptyContent)
        ));
        assert_eq!(terminology.lookups.get(), 0);

        valid_builder()
            .build(&terminology, &persistent_policy())
            .expect("valid composition");
        assert_eq!(terminology.lookups.get(), 2);
    }

    #[test]
    fn builder_from_produces_an_equal_composition() {
        let composition = valid();
        let rebuilt = build(Composition::builder_from(&composition)).expect("rebuild");
        assert_eq!(rebuilt, composition);

        let changed = build(Composition::builder_from(&composition).territory(territory("GB")))
            .expect("change");
        assert_eq!(changed.territory(), &territory("GB"));
        assert_eq!(composition.territory(), &territory("SE"));
    }

    #[test]
    fn section_path_round_trips() {
        let composition = valid();
        let section_b = &composition.content().expect("content")[1];

        let path = composition.path_of_item(section_b).expect("path of section B");
        assert_eq!(path, format!("/content[{SECTION_ARCHETYPE}, 'Section B']"));

        let resolved = composition.item_at_path(&path).expect("resolves");
        assert!(resolved.is_same(&Item::Section(section_b)));
        assert_eq!(resolved, Item::Section(section_b));
    }

    #[test]
    fn every_reachable_item_round_trips() {
        let links: BTreeSet<Link> = [
            Link::new("follow-up to", "problem", "ehr:compositions/1").expect("valid link"),
            Link::new("see also", "reference", "ehr:compositions/2").expect("valid link"),
        ]
        .into_iter()
        .collect();
        let composition = build(valid_builder().links(links)).expect("valid");

        let items = composition.items();
        assert_eq!(items.len(), 7);
        for (path, item) in &items {
            assert_eq!(&composition.path_of_item(*item).expect("path"), path);
            let resolved = composition.item_at_path(path).expect("resolves");
            assert!(resolved.is_same(item), "{path}");
            assert!(composition.valid_path(path));
        }

        assert_eq!(
            composition.all_paths(),
            [
                "/".to_string(),
                "/links['follow-up to']".to_string(),
                "/links['see also']".to_string(),
                format!("/content[{SECTION_ARCHETYPE}, 'Section A']"),
                format!("/content[{SECTION_ARCHETYPE}, 'Section B']"),
                format!("/content[{SECTION_ARCHETYPE}, 'Section B']/items[at0001, 'Pulse']"),
                format!("/content[{SECTION_ARCHETYPE}, 'Section B']/items[at0001, 'Pulse rate']"),
            ]
        );
    }

    #[test]
    fn identical_siblings_fall_back_to_position() {
        let composition = build(
            valid_builder().content(vec![section("Notes", None), section("Notes", None)]),
        )
        .expect("valid");

        let content = composition.content().expect("content");
        let second = composition.path_of_item(&content[1]).expect("path");
        assert_eq!(second, "/content[2]");
        assert!(composition
            .item_at_path(&second)
            .expect("resolves")
            .is_same(&Item::Section(&content[1])));

        let ambiguous = format!("/content[{SECTION_ARCHETYPE}]");
        let err = composition.item_at_path(&ambiguous).expect_err("ambiguous");
        assert!(matches!(err, OpenEhrError::InvalidPath(msg) if msg.contains("several")));
    }

    #[test]
    fn whole_path_prefix_is_accepted() {
        let composition = valid();
        let prefixed = format!(
            "/[{COMPOSITION_ARCHETYPE}]/content[{SECTION_ARCHETYPE}, 'Section A']"
        );
        let item = composition.item_at_path(&prefixed).expect("resolves");
        assert_eq!(item.name(), "Section A");

        let whole = format!("/[{COMPOSITION_ARCHETYPE}]");
        assert!(composition
            .item_at_path(&whole)
            .expect("self")
            .is_same(&Item::Composition(&composition)));
        assert_eq!(composition.path_of_item(&composition).expect("root"), "/");
    }

    #[test]
    fn valid_path_matches_item_at_path() {
        let composition = valid();
        for path in [
            "/",
            "/content[2]",
            "/content[2]/items[2]",
            "/content[openEHR-EHR-SECTION.adhoc.v1, 'Section A']",
            "/content[3]",
            "/content[2]/items[at0001]",
            "/content[1]/items[1]",
            "/links[1]",
            "/context[1]",
            "content[1]",
            "",
        ] {
            assert_eq!(
                composition.valid_path(path),
                composition.item_at_path(path).is_ok(),
                "{path}"
            );
        }
        assert!(composition.valid_path("/content[2]/items[2]"));
        assert!(!composition.valid_path("/content[3]"));
        assert!(!composition.valid_path("/content[2]/items[at0001]"));
        assert!(!composition.valid_path("/context[1]"));
    }

    #[test]
    fn foreign_items_have_no_path() {
        let composition = valid();
        let stranger = section("Elsewhere", None);
        let err = composition.path_of_item(&stranger).expect_err("foreign");
        assert!(matches!(err, OpenEhrError::InvalidPath(msg) if msg.contains("Elsewhere")));

        let equal_copy = section("Section A", None);
        assert_eq!(
            composition.path_of_item(&equal_copy).expect("equal item"),
            format!("/content[{SECTION_ARCHETYPE}, 'Section A']")
        );
    }

    fn link(meaning: &str, target: &str) -> BTreeSet<Link> {
        BTreeSet::from([Link::new(meaning, "reference", target).expect("valid link")])
    }

    fn linked_entry(node_id: &str, name: &str, links: BTreeSet<Link>) -> ContentItem {
        let locatable = Locatable::new(
            None,
            text(node_id),
            DvText::new(name).expect("non-empty"),
            details("openEHR-EHR-OBSERVATION.pulse.v1"),
            None,
            Some(links),
        )
        .expect("valid locatable");
        Entry::new(
            locatable,
            EntryKind::Observation,
            CodePhrase::new("ISO_639-1", "en").expect("valid code"),
        )
        .into()
    }

    fn assert_round_trips(composition: &Composition) {
        for (path, item) in composition.items() {
            assert_eq!(composition.path_of_item(item).expect("path"), path);
            assert!(composition.item_at_path(&path).expect("resolves").is_same(&item), "{path}");
        }
    }

    #[test]
    fn unaddressable_node_ids_fall_back_to_position() {
        let items = vec![entry("2", "Second"), entry("at0001", "First"), entry("at0002 x", "Third")];
        let composition = build(valid_builder().content(vec![section("Odd", Some(items))]))
            .expect("valid");
        assert_round_trips(&composition);

        let section = format!("/content[{SECTION_ARCHETYPE}]");
        assert_eq!(
            composition.all_paths(),
            [
                "/".to_string(),
                section.clone(),
                format!("{section}/items[1]"),
                format!("{section}/items[at0001]"),
                format!("{section}/items[3]"),
            ]
        );
    }

    #[test]
    fn nested_sections_and_links_round_trip() {
        let inner_locatable = Locatable::new(
            None,
            text(SECTION_ARCHETYPE),
            DvText::new("Inner").expect("non-empty"),
            details(SECTION_ARCHETYPE),
            None,
            Some(link("see also", "ehr:compositions/2")),
        )
        .expect("valid locatable");
        let inner = Section::new(
            inner_locatable,
            Some(vec![linked_entry("at0001", "Deep", link("follow-up to", "ehr:compositions/1"))]),
        )
        .expect("valid section");
        let outer = section("Outer", Some(vec![inner.into(), entry("at0001", "Shallow")]));
        let composition = build(valid_builder().content(vec![outer])).expect("valid");

        assert_round_trips(&composition);

        let outer = format!("/content[{SECTION_ARCHETYPE}]");
        let inner = format!("{outer}/items[{SECTION_ARCHETYPE}]");
        assert_eq!(
            composition.all_paths(),
            [
                "/".to_string(),
                outer.clone(),
                inner.clone(),
                format!("{inner}/links['see also']"),
                format!("{inner}/items[at0001]"),
                format!("{inner}/items[at0001]/links['follow-up to']"),
                format!("{outer}/items[at0001]"),
            ]
        );

        let deep_link = format!("{inner}/items[at0001]/links['follow-up to']");
        let item = composition.item_at_path(&deep_link).expect("resolves");
        assert!(matches!(item, Item::Link(link) if link.target.as_str() == "ehr:compositions/1"));
    }

    #[test]
    fn category_from_another_terminology_is_rejected() {
        let terminology = SimpleTerminologyService::openehr_default().with_group(
            "local",
            COMPOSITION_CATEGORY_GROUP,
            GROUP_LANGUAGE,
            [CATEGORY_EVENT],
        );
        let local = CodePhrase::new("local", CATEGORY_EVENT).expect("valid code");
        let builder = valid_builder()
            .category(DvCodedText::new("event", local.clone()).expect("valid coded text"));

        let result = builder.build(&terminology, &persistent_policy());
        assert_eq!(violation(result), ValidityError::UnknownCategory(local));
    }
}
