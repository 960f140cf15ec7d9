//! Object identifiers.
//!
//! The composition core only needs RM `HIER_OBJECT_ID` for the optional `uid` of a locatable.
//! Roots are UUIDs; an optional extension may follow a `::` separator, as in
//! `8849182c-82ad-4088-a07f-48ead4180515::ehr.example.org::1`.

use ehr_types::NonEmptyText;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::OpenEhrError;

/// RM `HIER_OBJECT_ID` with a UUID root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HierObjectId {
    root: Uuid,
    extension: Option<NonEmptyText>,
}

impl HierObjectId {
    /// Builds an identifier from an existing root and optional extension.
    pub fn new(root: Uuid, extension: Option<NonEmptyText>) -> Self {
        Self { root, extension }
    }

    /// Parses `<uuid>` or `<uuid>::<extension>`.
    ///
    /// Any textual UUID form accepted by the `uuid` crate is allowed for the root; the value is
    /// rendered back in hyphenated lowercase form.
    ///
    /// # Errors
    ///
    /// Returns [`OpenEhrError::InvalidInput`] if the root is not a UUID or the extension is
    /// present but empty.
    pub fn parse(input: &str) -> Result<Self, OpenEhrError> {
        let (root, extension) = match input.trim().split_once("::") {
            Some((root, extension)) => {
                let extension = NonEmptyText::new(extension).map_err(|_| {
                    OpenEhrError::InvalidInput(format!(
                        "object id extension cannot be empty, got: '{input}'"
                    ))
                })?;
                (root, Some(extension))
            }
            None => (input.trim(), None),
        };

        let root = Uuid::parse_str(root).map_err(|_| {
            OpenEhrError::InvalidInput(format!("object id root must be a UUID, got: '{input}'"))
        })?;

        Ok(Self { root, extension })
    }

    pub fn root(&self) -> Uuid {
        self.root
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_ref().map(NonEmptyText::as_str)
    }
}

impl fmt::Display for HierObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(extension) => write!(f, "{}::{}", self.root.hyphenated(), extension),
            None => write!(f, "{}", self.root.hyphenated()),
        }
    }
}

impl FromStr for HierObjectId {
    type Err = OpenEhrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HierObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HierObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_root_and_extension() {
        let id = HierObjectId::parse("8849182C-82AD-4088-A07F-48EAD4180515::ehr.example.org::1")
            .expect("valid id");
        assert_eq!(
            id.root().to_string(),
            "8849182c-82ad-4088-a07f-48ead4180515"
        );
        assert_eq!(id.extension(), Some("ehr.example.org::1"));
        assert_eq!(
            id.to_string(),
            "8849182c-82ad-4088-a07f-48ead4180515::ehr.example.org::1"
        );
    }

    #[test]
    fn parses_bare_root() {
        let id = HierObjectId::parse("550e8400e29b41d4a716446655440000").expect("valid id");
        assert_eq!(id.extension(), None);
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn rejects_invalid_roots_and_empty_extensions() {
        let err = HierObjectId::parse("not-a-uuid").expect_err("invalid root");
        assert!(matches!(err, OpenEhrError::InvalidInput(msg) if msg.contains("must be a UUID")));

        let err = HierObjectId::parse("550e8400-e29b-41d4-a716-446655440000::")
            .expect_err("empty extension");
        assert!(matches!(err, OpenEhrError::InvalidInput(msg) if msg.contains("extension")));
    }
}
