//! Classification of composition categories as persistent or not.
//!
//! Which category codes denote a persistent composition (one with longitudinal validity and
//! no single recording event) is a deployment decision, so the classification is injected
//! into construction as a [`PersistencePolicy`].

use std::collections::BTreeSet;

use crate::constants::OPENEHR_TERMINOLOGY_ID;
use crate::data_types::DvCodedText;

/// Decides whether a composition category denotes a persistent composition.
pub trait PersistencePolicy {
    fn is_persistent(&self, category: &DvCodedText) -> bool;
}

/// Treats every category as non-persistent.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverPersistent;

impl PersistencePolicy for NeverPersistent {
    fn is_persistent(&self, _category: &DvCodedText) -> bool {
        false
    }
}

/// Treats an explicit set of codes from one terminology as persistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistentCodes {
    terminology_id: String,
    codes: BTreeSet<String>,
}

impl PersistentCodes {
    pub fn new<I, S>(terminology_id: impl Into<String>, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terminology_id: terminology_id.into(),
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Codes from the `openehr` terminology.
    pub fn openehr<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(OPENEHR_TERMINOLOGY_ID, codes)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

impl PersistencePolicy for PersistentCodes {
    fn is_persistent(&self, category: &DvCodedText) -> bool {
        let code = &category.defining_code;
        code.terminology_id.as_str() == self.terminology_id
            && self.codes.contains(code.code_string.as_str())
    }
}

impl<P: PersistencePolicy + ?Sized> PersistencePolicy for &P {
    fn is_persistent(&self, category: &DvCodedText) -> bool {
        (**self).is_persistent(category)
    }
}
