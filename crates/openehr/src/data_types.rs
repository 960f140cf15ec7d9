//! OpenEHR RM data types.
//!
//! This module provides representations of the openEHR Reference Model (RM) data values the
//! composition core needs: plain and coded text, code phrases, EHR URIs, and parsed archetype
//! identifiers.
//!
//! Key types:
//! - [`DvText`]: Simple text value wrapper for RM `DV_TEXT`.
//! - [`DvCodedText`]: Text with a defining [`CodePhrase`], as used for `category`.
//! - [`ArchetypeId`]: Parsed and validated openEHR archetype identifier.

use ehr_types::NonEmptyText;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::OpenEhrError;

/// Simplified representation of the openEHR `DV_TEXT` data type.
///
/// Only the `value` is carried; language, encoding, formatting and mappings are not modelled.
/// Names of every locatable node are `DV_TEXT`, and the path grammar uses `value` to
/// disambiguate siblings that share an archetype node id.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(deny_unknown_fields)]
pub struct DvText {
    /// The plain text content.
    pub value: NonEmptyText,
}

impl DvText {
    /// Creates a `DV_TEXT` from a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidInput`] if `value` is empty or whitespace.
    pub fn new(value: impl AsRef<str>) -> Result<Self, OpenEhrError> {
        Ok(Self {
            value: non_empty(value, "text value")?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.value.as_str()
    }
}

/// RM `CODE_PHRASE`: a code from a named terminology.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(deny_unknown_fields)]
pub struct CodePhrase {
    /// Identifier of the terminology the code belongs to (for example `openehr`, `ISO_3166-1`).
    pub terminology_id: NonEmptyText,

    /// The code itself.
    pub code_string: NonEmptyText,
}

impl CodePhrase {
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidInput`] if either part is empty.
    pub fn new(
        terminology_id: impl AsRef<str>,
        code_string: impl AsRef<str>,
    ) -> Result<Self, OpenEhrError> {
        Ok(Self {
            terminology_id: non_empty(terminology_id, "terminology_id")?,
            code_string: non_empty(code_string, "code_string")?,
        })
    }
}

impl fmt::Display for CodePhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.terminology_id, self.code_string)
    }
}

/// RM `DV_CODED_TEXT`: display text bound to a defining code.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(deny_unknown_fields)]
pub struct DvCodedText {
    pub value: NonEmptyText,
    pub defining_code: CodePhrase,
}

impl DvCodedText {
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidInput`] if `value` is empty.
    pub fn new(value: impl AsRef<str>, defining_code: CodePhrase) -> Result<Self, OpenEhrError> {
        Ok(Self {
            value: non_empty(value, "coded text value")?,
            defining_code,
        })
    }
}

/// RM `DV_EHR_URI`: a URI addressing an item inside an EHR.
///
/// Only the `ehr:` scheme is accepted. Used as the target of a [`crate::Link`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DvEhrUri(String);

impl DvEhrUri {
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidInput`] if the value does not use the `ehr:` scheme or
    /// has nothing after it.
    pub fn new(value: impl AsRef<str>) -> Result<Self, OpenEhrError> {
        let value = value.as_ref().trim();
        match value.strip_prefix("ehr:") {
            Some(rest) if !rest.is_empty() && !rest.contains(char::is_whitespace) => {
                Ok(Self(value.to_string()))
            }
            _ => Err(OpenEhrError::InvalidInput(format!(
                "EHR URI must be 'ehr:<location>' without whitespace, got '{value}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DvEhrUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DvEhrUri {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DvEhrUri {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Parsed and validated representation of an openEHR archetype identifier.
///
/// # Canonical Form
///
/// `<authority>-<rm_package>-<RM_CLASS>.<concept>[-<specialisation>...].v<version>`
///
/// Example: `openEHR-EHR-COMPOSITION.encounter.v1`
///
/// The archetype id is what marks a node as an archetype root: the root node of an archetyped
/// subtree carries the archetype id as its `archetype_node_id`, while inner nodes carry
/// at-codes such as `at0001`.
///
/// # Examples
///
/// ```rust
/// # use openehr::data_types::ArchetypeId;
/// let id = ArchetypeId::parse("openEHR-EHR-SECTION.adhoc-problem_list.v1")?;
/// assert!(id.is_section());
/// assert_eq!(id.concept, "adhoc-problem_list");
/// assert_eq!(id.specialisation(), Some("problem_list"));
/// assert_eq!(id.to_string(), "openEHR-EHR-SECTION.adhoc-problem_list.v1");
/// # Ok::<(), openehr::OpenEhrError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchetypeId {
    /// Archetype authority (e.g. "openEHR")
    pub authority: String,

    /// Reference Model package (e.g. "EHR")
    pub rm_package: String,

    /// Reference Model class (e.g. "COMPOSITION", "SECTION")
    pub rm_class: String,

    /// Archetype concept including any specialisations (e.g. "encounter", "adhoc-problem_list")
    pub concept: String,

    /// Archetype major version number (e.g. 1)
    pub version: u32,
}

impl ArchetypeId {
    /// Validates archetype ID components against the identifier grammar.
    ///
    /// - `authority` and `rm_package`: ASCII alphanumerics or `_`, non-empty.
    /// - `rm_class`: uppercase ASCII letters, digits or `_`, starting with a letter.
    /// - `concept`: ASCII alphanumerics or `_`, in one or more `-`-separated non-empty parts.
    fn validate_components(
        authority: &str,
        rm_package: &str,
        rm_class: &str,
        concept: &str,
    ) -> Result<(), OpenEhrError> {
        fn is_word(part: &str) -> bool {
            !part.is_empty()
                && part
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }

        if !is_word(authority) {
            return Err(OpenEhrError::InvalidArchetypeId(format!(
                "authority must be alphanumeric, got '{}'",
                authority
            )));
        }

        if !is_word(rm_package) {
            return Err(OpenEhrError::InvalidArchetypeId(format!(
                "rm_package must be alphanumeric, got '{}'",
                rm_package
            )));
        }

        let class_ok = rm_class
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_uppercase())
            && rm_class
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
        if !class_ok {
            return Err(OpenEhrError::InvalidArchetypeId(format!(
                "rm_class must be an upper-case RM class name, got '{}'",
                rm_class
            )));
        }

        if !concept.split('-').all(is_word) {
            return Err(OpenEhrError::InvalidArchetypeId(format!(
                "concept must be '-'-separated alphanumeric parts, got '{}'",
                concept
            )));
        }

        Ok(())
    }

    /// Creates a new `ArchetypeId` from individual components with validation.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidArchetypeId`] if any component breaks the grammar.
    pub fn new(
        authority: &str,
        rm_package: &str,
        rm_class: &str,
        concept: &str,
        version: u32,
    ) -> Result<Self, OpenEhrError> {
        Self::validate_components(authority, rm_package, rm_class, concept)?;

        Ok(Self {
            authority: authority.to_string(),
            rm_package: rm_package.to_string(),
            rm_class: rm_class.to_string(),
            concept: concept.to_string(),
            version,
        })
    }

    /// Parses and validates an openEHR archetype identifier string.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidArchetypeId`] if the string is missing delimiters, the
    /// version is not numeric, or a component breaks the grammar.
    pub fn parse(raw: &str) -> Result<Self, OpenEhrError> {
        let (authority, rest) = raw
            .split_once('-')
            .ok_or_else(|| OpenEhrError::InvalidArchetypeId(raw.to_string()))?;

        let (rm_package, remainder) = rest
            .split_once('-')
            .ok_or_else(|| OpenEhrError::InvalidArchetypeId(raw.to_string()))?;

        let (rm_class, remainder) = remainder
            .split_once('.')
            .ok_or_else(|| OpenEhrError::InvalidArchetypeId(raw.to_string()))?;

        let (concept, version_part) = remainder
            .rsplit_once(".v")
            .ok_or_else(|| OpenEhrError::InvalidArchetypeId(raw.to_string()))?;

        let version = version_part
            .parse::<u32>()
            .map_err(|_| OpenEhrError::InvalidArchetypeId(raw.to_string()))?;

        Self::new(authority, rm_package, rm_class, concept, version)
    }

    /// The most specialised part of the concept, if the archetype is a specialisation.
    pub fn specialisation(&self) -> Option<&str> {
        self.concept.rsplit_once('-').map(|(_, last)| last)
    }

    /// Returns `true` if this archetype targets the `COMPOSITION` RM class.
    pub fn is_composition(&self) -> bool {
        self.rm_class == "COMPOSITION"
    }

    /// Returns `true` if this archetype targets the `SECTION` RM class.
    pub fn is_section(&self) -> bool {
        self.rm_class == "SECTION"
    }
}

impl fmt::Display for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}.{}.v{}",
            self.authority, self.rm_package, self.rm_class, self.concept, self.version
        )
    }
}

impl FromStr for ArchetypeId {
    type Err = OpenEhrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ArchetypeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ArchetypeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn non_empty(value: impl AsRef<str>, what: &str) -> Result<NonEmptyText, OpenEhrError> {
    NonEmptyText::new(value)
        .map_err(|_| OpenEhrError::InvalidInput(format!("{what} cannot be empty")))
}
