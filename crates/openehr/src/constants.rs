//! Terminology identifiers, group names and codes used by the composition rules.

/// Terminology id of the openEHR terminology.
pub const OPENEHR_TERMINOLOGY_ID: &str = "openehr";

/// openEHR terminology group listing the permitted composition categories.
pub const COMPOSITION_CATEGORY_GROUP: &str = "composition category";

/// openEHR terminology group listing the permitted care settings.
pub const SETTING_GROUP: &str = "setting";

/// Language in which openEHR group names are looked up.
pub const GROUP_LANGUAGE: &str = "en";

/// Code set id for territories.
pub const COUNTRIES_CODE_SET: &str = "countries";

/// External terminology id bound to the `countries` code set.
pub const ISO_3166_1: &str = "ISO_3166-1";

/// openEHR `composition category` code for "persistent".
pub const CATEGORY_PERSISTENT: &str = "431";

/// openEHR `composition category` code for "event".
pub const CATEGORY_EVENT: &str = "433";

/// openEHR `composition category` code for "episodic".
pub const CATEGORY_EPISODIC: &str = "451";

/// Path of the root of any locatable structure.
pub const ROOT_PATH: &str = "/";

/// Attribute holding a composition's sections.
pub const CONTENT_ATTRIBUTE: &str = "content";

/// Attribute holding a section's children.
pub const ITEMS_ATTRIBUTE: &str = "items";

/// Attribute holding a locatable's links.
pub const LINKS_ATTRIBUTE: &str = "links";
