//! Terminology lookups consumed by the composition rules.
//!
//! Construction needs two set-membership answers: is a category code in the openEHR
//! `composition category` group, and is a territory code in the `countries` code set. Both come
//! from a [`TerminologyService`] passed in by the caller. A lookup that cannot be answered is a
//! miss (`false`).
//!
//! [`SimpleTerminologyService`] is an in-memory table. It can be built in code, loaded from
//! YAML, or started from [`SimpleTerminologyService::openehr_default`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constants::{
    CATEGORY_EPISODIC, CATEGORY_EVENT, CATEGORY_PERSISTENT, COMPOSITION_CATEGORY_GROUP,
    COUNTRIES_CODE_SET, GROUP_LANGUAGE, ISO_3166_1, OPENEHR_TERMINOLOGY_ID, SETTING_GROUP,
};
use crate::data_types::CodePhrase;
use crate::OpenEhrError;

/// Set-membership queries against terminologies and code sets.
pub trait TerminologyService {
    /// Returns `true` if `code` belongs to the group named `group_name` (in `language`) of the
    /// terminology identified by `code.terminology_id`.
    fn group_contains(&self, code: &CodePhrase, group_name: &str, language: &str) -> bool;

    /// Returns `true` if `code` is a member of the code set `code_set_id`.
    fn code_set_contains(&self, code_set_id: &str, code: &CodePhrase) -> bool;
}

impl<T: TerminologyService + ?Sized> TerminologyService for &T {
    fn group_contains(&self, code: &CodePhrase, group_name: &str, language: &str) -> bool {
        (**self).group_contains(code, group_name, language)
    }

    fn code_set_contains(&self, code_set_id: &str, code: &CodePhrase) -> bool {
        (**self).code_set_contains(code_set_id, code)
    }
}

/// A named group of codes within one terminology.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TerminologyGroup {
    pub terminology: String,
    pub name: String,
    pub language: String,
    pub codes: BTreeSet<String>,
}

/// A code set bound to an external terminology (for example `countries` → `ISO_3166-1`).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CodeSet {
    pub external_id: String,
    pub codes: BTreeSet<String>,
}

/// In-memory [`TerminologyService`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SimpleTerminologyService {
    #[serde(default)]
    groups: Vec<TerminologyGroup>,

    #[serde(default)]
    code_sets: BTreeMap<String, CodeSet>,
}

impl SimpleTerminologyService {
    /// An empty table: every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// The openEHR groups and code sets composition construction relies on.
    ///
    /// - `composition category` (en): `431` persistent, `433` event, `451` episodic.
    /// - `setting` (en): `225`, `227`–`238`.
    /// - `countries`: ISO 3166-1 alpha-2 codes under terminology `ISO_3166-1`.
    pub fn openehr_default() -> Self {
        Self::new()
            .with_group(
                OPENEHR_TERMINOLOGY_ID,
                COMPOSITION_CATEGORY_GROUP,
                GROUP_LANGUAGE,
                [CATEGORY_PERSISTENT, CATEGORY_EVENT, CATEGORY_EPISODIC],
            )
            .with_group(
                OPENEHR_TERMINOLOGY_ID,
                SETTING_GROUP,
                GROUP_LANGUAGE,
                SETTING_CODES.iter().copied(),
            )
            .with_code_set(COUNTRIES_CODE_SET, ISO_3166_1, ISO_3166_ALPHA_2.iter().copied())
    }

    /// Adds codes to a group, creating the group if needed.
    pub fn with_group<I, S>(
        mut self,
        terminology: &str,
        name: &str,
        language: &str,
        codes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes = codes.into_iter().map(Into::into);
        match self.group_mut(terminology, name, language) {
            Some(group) => group.codes.extend(codes),
            None => self.groups.push(TerminologyGroup {
                terminology: terminology.to_string(),
                name: name.to_string(),
                language: language.to_string(),
                codes: codes.collect(),
            }),
        }
        self
    }

    /// Adds codes to a code set, creating it (bound to `external_id`) if needed.
    ///
    /// An existing code set keeps its original binding.
    pub fn with_code_set<I, S>(mut self, id: &str, external_id: &str, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.code_sets
            .entry(id.to_string())
            .or_insert_with(|| CodeSet {
                external_id: external_id.to_string(),
                codes: BTreeSet::new(),
            })
            .codes
            .extend(codes.into_iter().map(Into::into));
        self
    }

    /// Layers `other` over `self`: codes are unioned, new groups and code sets are added.
    pub fn merge(self, other: SimpleTerminologyService) -> Self {
        let merged = other.groups.into_iter().fold(self, |acc, group| {
            acc.with_group(&group.terminology, &group.name, &group.language, group.codes)
        });
        other
            .code_sets
            .into_iter()
            .fold(merged, |acc, (id, set)| {
                acc.with_code_set(&id, &set.external_id, set.codes)
            })
    }

    /// Loads a table from YAML.
    ///
    /// ```yaml
    /// groups:
    ///   - terminology: openehr
    ///     name: composition category
    ///     language: en
    ///     codes: ["431", "433"]
    /// code_sets:
    ///   countries:
    ///     external_id: ISO_3166-1
    ///     codes: [SE, GB]
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::Translation`] naming the failing field if the YAML does not
    /// match this shape.
    pub fn from_yaml(yaml: &str) -> Result<Self, OpenEhrError> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml);
        serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            OpenEhrError::Translation(format!(
                "terminology schema mismatch at {}: {}",
                if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                },
                err.into_inner()
            ))
        })
    }

    fn group_mut(
        &mut self,
        terminology: &str,
        name: &str,
        language: &str,
    ) -> Option<&mut TerminologyGroup> {
        self.groups.iter_mut().find(|group| {
            group.terminology == terminology && group.name == name && group.language == language
        })
    }
}

impl TerminologyService for SimpleTerminologyService {
    fn group_contains(&self, code: &CodePhrase, group_name: &str, language: &str) -> bool {
        self.groups.iter().any(|group| {
            group.terminology == code.terminology_id.as_str()
                && group.name == group_name
                && group.language == language
                && group.codes.contains(code.code_string.as_str())
        })
    }

    fn code_set_contains(&self, code_set_id: &str, code: &CodePhrase) -> bool {
        self.code_sets.get(code_set_id).is_some_and(|set| {
            set.external_id == code.terminology_id.as_str()
                && set.codes.contains(code.code_string.as_str())
        })
    }
}

const SETTING_CODES: [&str; 13] = [
    "225", "227", "228", "229", "230", "231", "232", "233", "234", "235", "236", "237", "238",
];

const ISO_3166_ALPHA_2: [&str; 249] = [
    "AD", "AE", "AF", "AG", "AI", "AL", "AM", "AO", "AQ", "AR", "AS", "AT", "AU", "AW", "AX",
    "AZ", "BA", "BB", "BD", "BE", "BF", "BG", "BH", "BI", "BJ", "BL", "BM", "BN", "BO", "BQ",
    "BR", "BS", "BT", "BV", "BW", "BY", "BZ", "CA", "CC", "CD", "CF", "CG", "CH", "CI", "CK",
    "CL", "CM", "CN", "CO", "CR", "CU", "CV", "CW", "CX", "CY", "CZ", "DE", "DJ", "DK", "DM",
    "DO", "DZ", "EC", "EE", "EG", "EH", "ER", "ES", "ET", "FI", "FJ", "FK", "FM", "FO", "FR",
    "GA", "GB", "GD", "GE", "GF", "GG", "GH", "GI", "GL", "GM", "GN", "GP", "GQ", "GR", "GS",
    "GT", "GU", "GW", "GY", "HK", "HM", "HN", "HR", "HT", "HU", "ID", "IE", "IL", "IM", "IN",
    "IO", "IQ", "IR", "IS", "IT", "JE", "JM", "JO", "JP", "KE", "KG", "KH", "KI", "KM", "KN",
    "KP", "KR", "KW", "KY", "KZ", "LA", "LB", "LC", "LI", "LK", "LR", "LS", "LT", "LU", "LV",
    "LY", "MA", "MC", "MD", "ME", "MF", "MG", "MH", "MK", "ML", "MM", "MN", "MO", "MP", "MQ",
    "MR", "MS", "MT", "MU", "MV", "MW", "MX", "MY", "MZ", "NA", "NC", "NE", "NF", "NG", "NI",
    "NL", "NO", "NP", "NR", "NU", "NZ", "OM", "PA", "PE", "PF", "PG", "PH", "PK", "PL", "PM",
    "PN", "PR", "PS", "PT", "PW", "PY", "QA", "RE", "RO", "RS", "RU", "RW", "SA", "SB", "SC",
    "SD", "SE", "SG", "SH", "SI", "SJ", "SK", "SL", "SM", "SN", "SO", "SR", "SS", "ST", "SV",
    "SX", "SY", "SZ", "TC", "TD", "TF", "TG", "TH", "TJ", "TK", "TL", "TM", "TN", "TO", "TR",
    "TT", "TV", "TW", "TZ", "UA", "UG", "UM", "US", "UY", "UZ", "VA", "VC", "VE", "VG", "VI",
    "VN", "VU", "WF", "WS", "YE", "YT", "ZA", "ZM", "ZW",
];
