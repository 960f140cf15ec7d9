//! Command-line runtime configuration.
//!
//! Resolved once at startup from the environment (after `.env` has been loaded) and command-line
//! overrides, then passed down. Nothing below `main` reads environment variables.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use openehr::constants::CATEGORY_PERSISTENT;
use openehr::{PersistentCodes, SimpleTerminologyService};

/// Path to a YAML terminology table layered over the built-in openEHR defaults.
pub const TERMINOLOGY_FILE_ENV: &str = "EHR_TERMINOLOGY_FILE";

/// Comma-separated openEHR category codes treated as persistent.
pub const PERSISTENT_CODES_ENV: &str = "EHR_PERSISTENT_CODES";

/// Configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CliConfig {
    terminology_file: Option<PathBuf>,
    persistent_codes: BTreeSet<String>,
}

impl CliConfig {
    /// Create a new `CliConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if `persistent_codes` is empty.
    pub fn new(
        terminology_file: Option<PathBuf>,
        persistent_codes: BTreeSet<String>,
    ) -> anyhow::Result<Self> {
        if persistent_codes.is_empty() {
            bail!("{PERSISTENT_CODES_ENV} must name at least one category code");
        }

        Ok(Self {
            terminology_file,
            persistent_codes,
        })
    }

    /// Resolve from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let terminology_file = lookup(TERMINOLOGY_FILE_ENV)
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from);
        let persistent_codes = match lookup(PERSISTENT_CODES_ENV) {
            Some(raw) => parse_codes(&raw),
            None => BTreeSet::from([CATEGORY_PERSISTENT.to_string()]),
        };

        Self::new(terminology_file, persistent_codes)
    }

    /// Replaces the terminology file if an override is given.
    pub fn with_terminology_override(mut self, terminology_file: Option<PathBuf>) -> Self {
        if terminology_file.is_some() {
            self.terminology_file = terminology_file;
        }
        self
    }

    pub fn terminology_file(&self) -> Option<&Path> {
        self.terminology_file.as_deref()
    }

    pub fn persistent_codes(&self) -> impl Iterator<Item = &str> {
        self.persistent_codes.iter().map(String::as_str)
    }

    /// The built-in openEHR table, merged with the configured file if there is one.
    pub fn terminology(&self) -> anyhow::Result<SimpleTerminologyService> {
        let defaults = SimpleTerminologyService::openehr_default();
        let Some(path) = &self.terminology_file else {
            return Ok(defaults);
        };

        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read terminology file {}", path.display()))?;
        let table = SimpleTerminologyService::from_yaml(&yaml)
            .with_context(|| format!("failed to parse terminology file {}", path.display()))?;

        tracing::debug!(path = %path.display(), "merged terminology table");
        Ok(defaults.merge(table))
    }

    pub fn persistence_policy(&self) -> PersistentCodes {
        PersistentCodes::openehr(self.persistent_codes.iter().cloned())
    }
}

fn parse_codes(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use openehr::{CodePhrase, DvCodedText, PersistencePolicy, TerminologyService};
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn category(code: &str) -> DvCodedText {
        DvCodedText::new("category", CodePhrase::new("openehr", code).expect("valid code"))
            .expect("valid coded text")
    }

    #[test]
    fn defaults_to_openehr_persistent_code() {
        let config = CliConfig::from_lookup(lookup(&[])).expect("config");
        assert!(config.terminology_file().is_none());
        assert_eq!(config.persistent_codes().collect::<Vec<_>>(), ["431"]);
        assert!(config.persistence_policy().is_persistent(&category("431")));
    }

    #[test]
    fn persistent_codes_are_read_from_the_environment() {
        let config = CliConfig::from_lookup(lookup(&[(PERSISTENT_CODES_ENV, " 431, 451 ,,")]))
            .expect("config");
        assert_eq!(config.persistent_codes().collect::<Vec<_>>(), ["431", "451"]);
        assert!(config.persistence_policy().is_persistent(&category("451")));
    }

    #[test]
    fn empty_persistent_codes_are_rejected() {
        let err = CliConfig::from_lookup(lookup(&[(PERSISTENT_CODES_ENV, " , ")]))
            .expect_err("no codes");
        assert!(err.to_string().contains(PERSISTENT_CODES_ENV));
    }

    #[test]
    fn terminology_file_is_merged_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "code_sets:\n  countries:\n    external_id: ISO_3166-1\n    codes: [XK]"
        )
        .expect("write table");

        let config = CliConfig::from_lookup(lookup(&[(
            TERMINOLOGY_FILE_ENV,
            file.path().to_str().expect("utf-8 path"),
        )]))
        .expect("config");
        let terminology = config.terminology().expect("terminology");

        let kosovo = CodePhrase::new("ISO_3166-1", "XK").expect("valid code");
        let sweden = CodePhrase::new("ISO_3166-1", "SE").expect("valid code");
        assert!(terminology.code_set_contains("countries", &kosovo));
        assert!(terminology.code_set_contains("countries", &sweden));
    }

    #[test]
    fn command_line_override_wins() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("terminology.yaml");
        std::fs::write(&path, "groups: [").expect("write table");

        let config = CliConfig::from_lookup(lookup(&[(TERMINOLOGY_FILE_ENV, "/nonexistent.yaml")]))
            .expect("config")
            .with_terminology_override(Some(path.clone()));
        assert_eq!(config.terminology_file(), Some(path.as_path()));

        let err = config.terminology().expect_err("malformed table");
        assert!(format!("{err:#}").contains("failed to parse terminology file"));
    }
}
