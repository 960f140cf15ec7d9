//! openEHR `COMPOSITION` core: construction-time validity rules and path addressing.
//!
//! A [`Composition`] is the unit of modification, transmission and attestation in an EHR. This
//! crate is responsible for two things:
//!
//! - Refusing to construct a composition that could not be persisted (see
//!   [`CompositionBuilder::build`]). Terminology membership is checked through an injected
//!   [`TerminologyService`], and the "persistent category" classification through an injected
//!   [`PersistencePolicy`].
//! - Addressing any node of the composition tree by a string path ([`Composition::item_at_path`])
//!   and computing the canonical path of a node ([`Composition::path_of_item`]).
//!
//! Reading and writing compositions as YAML lives in [`rm_1_1_0::composition`]; the domain types
//! themselves expose no setters.

pub mod archetyped;
pub mod category;
pub mod composition;
pub mod constants;
pub mod content;
pub mod context;
pub mod data_types;
pub mod identification;
pub mod locatable;
pub mod path;
pub mod rm_1_1_0;
pub mod terminology;

pub use archetyped::{Archetyped, FeederAudit, Link};
pub use category::{NeverPersistent, PersistencePolicy, PersistentCodes};
pub use composition::{Composition, CompositionBuilder};
pub use content::{ContentItem, Entry, EntryKind, Section};
pub use context::{EventContext, PartyIdentified, Participation};
pub use data_types::{ArchetypeId, CodePhrase, DvCodedText, DvEhrUri, DvText};
pub use identification::HierObjectId;
pub use locatable::{BaseMatch, Locatable};
pub use path::Item;
pub use terminology::{SimpleTerminologyService, TerminologyService};

pub use ehr_types::NonEmptyText;

use thiserror::Error;

/// Errors returned by the `openehr` crate.
#[derive(Debug, Error)]
pub enum OpenEhrError {
    /// A structure could not be constructed because it breaks a reference model invariant.
    #[error("structural validity violated: {0}")]
    StructuralValidity(#[from] ValidityError),

    /// The path is malformed or does not address exactly one item.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid archetype ID: {0}")]
    InvalidArchetypeId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// The reference model rule a rejected structure violated.
///
/// Construction is fail-fast: the first violated rule is reported, in the order the rules are
/// checked.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidityError {
    #[error("archetype_node_id is required")]
    MissingArchetypeNodeId,

    #[error("name is required")]
    MissingName,

    #[error("archetype_details is required")]
    MissingArchetypeDetails,

    #[error("links must not be empty when present")]
    EmptyLinks,

    #[error("not archetype root")]
    NotArchetypeRoot,

    #[error("content must not be empty when present")]
    EmptyContent,

    #[error("a persistent composition must not have a context")]
    PersistentWithContext,

    #[error("category is required")]
    MissingCategory,

    #[error("territory is required")]
    MissingTerritory,

    #[error("unknown category: {0}")]
    UnknownCategory(CodePhrase),

    #[error("unknown territory: {0}")]
    UnknownTerritory(CodePhrase),

    #[error("section items must not be empty when present")]
    EmptySectionItems,

    #[error("participations must not be empty when present")]
    EmptyParticipations,

    #[error("context end_time is before start_time")]
    EndBeforeStart,
}

pub type OpenEhrResult<T> = std::result::Result<T, OpenEhrError>;

/// Read an RM 1.1.0 `COMPOSITION` from YAML, running the full set of construction rules.
pub fn read_composition_yaml(
    yaml: &str,
    terminology: &dyn TerminologyService,
    policy: &dyn PersistencePolicy,
) -> OpenEhrResult<Composition> {
    rm_1_1_0::composition::composition_parse(yaml, terminology, policy)
}

/// Write an RM 1.1.0 `COMPOSITION` to YAML.
pub fn write_composition_yaml(composition: &Composition) -> OpenEhrResult<String> {
    rm_1_1_0::composition::composition_render(composition)
}
