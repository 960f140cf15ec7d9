//! Path addressing inside a composition tree.
//!
//! A path is a `/`-separated list of segments, each naming an attribute and a predicate that
//! selects exactly one of the attribute's values:
//!
//! ```text
//! path      := "/" | ("/" segment)+
//! segment   := attribute "[" predicate "]"
//! predicate := node_id                   -- the child with this archetype node id
//!            | node_id ", '" name "'"    -- ... and this name value
//!            | "'" name "'"              -- the child with this name (a link's meaning)
//!            | index                     -- 1-based position in the attribute
//! ```
//!
//! Inside quotes, `\'` and `\\` escape a quote and a backslash. Surrounding whitespace and a
//! trailing `/` are ignored. A predicate matching more than one child does not address an item
//! and is rejected like any other invalid path.
//!
//! Canonical paths (see [`crate::Composition::path_of_item`]) use the shortest unique
//! predicate per segment: node id, then node id and name, then position.

use std::fmt;
use std::ptr;

use crate::archetyped::Link;
use crate::composition::Composition;
use crate::constants::{CONTENT_ATTRIBUTE, ITEMS_ATTRIBUTE, LINKS_ATTRIBUTE, ROOT_PATH};
use crate::content::{ContentItem, Entry, Section};
use crate::locatable::Locatable;
use crate::OpenEhrError;

/// A node reachable inside a composition, borrowed from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Item<'a> {
    Composition(&'a Composition),
    Section(&'a Section),
    Entry(&'a Entry),
    Link(&'a Link),
}

impl<'a> Item<'a> {
    /// The locatable base of the node; links are not locatable.
    pub fn locatable(&self) -> Option<&'a Locatable> {
        match *self {
            Item::Composition(composition) => Some(composition.locatable()),
            Item::Section(section) => Some(section.locatable()),
            Item::Entry(entry) => Some(entry.locatable()),
            Item::Link(_) => None,
        }
    }

    pub fn archetype_node_id(&self) -> Option<&'a str> {
        self.locatable().map(Locatable::archetype_node_id)
    }

    /// Display name of the node: the `name` value, or a link's `meaning`.
    pub fn name(&self) -> &'a str {
        match *self {
            Item::Link(link) => link.meaning.as_str(),
            _ => self
                .locatable()
                .map(|locatable| locatable.name().as_str())
                .unwrap_or_default(),
        }
    }

    /// RM class name of the node.
    pub fn kind(&self) -> &'static str {
        match *self {
            Item::Composition(_) => "COMPOSITION",
            Item::Section(_) => "SECTION",
            Item::Entry(entry) => entry.kind().rm_type_name(),
            Item::Link(_) => "LINK",
        }
    }

    /// Returns `true` if both refer to the very same node (not merely an equal one).
    pub fn is_same(&self, other: &Item<'_>) -> bool {
        match (*self, *other) {
            (Item::Composition(a), Item::Composition(b)) => ptr::eq(a, b),
            (Item::Section(a), Item::Section(b)) => ptr::eq(a, b),
            (Item::Entry(a), Item::Entry(b)) => ptr::eq(a, b),
            (Item::Link(a), Item::Link(b)) => ptr::eq(a, b),
            _ => false,
        }
    }

    /// Attributes that hold addressable children, in canonical enumeration order.
    fn attributes(&self) -> &'static [&'static str] {
        match self {
            Item::Composition(_) => &[LINKS_ATTRIBUTE, CONTENT_ATTRIBUTE],
            Item::Section(_) => &[LINKS_ATTRIBUTE, ITEMS_ATTRIBUTE],
            Item::Entry(_) => &[LINKS_ATTRIBUTE],
            Item::Link(_) => &[],
        }
    }

    /// Values of `attribute`, or `None` if the node has no such attribute.
    fn children(&self, attribute: &str) -> Option<Vec<Item<'a>>> {
        if attribute == LINKS_ATTRIBUTE {
            return self
                .locatable()
                .map(|locatable| locatable.links_iter().map(Item::Link).collect());
        }

        match (*self, attribute) {
            (Item::Composition(composition), CONTENT_ATTRIBUTE) => Some(
                composition
                    .content()
                    .unwrap_or_default()
                    .iter()
                    .map(Item::Section)
                    .collect(),
            ),
            (Item::Section(section), ITEMS_ATTRIBUTE) => Some(
                section
                    .items()
                    .unwrap_or_default()
                    .iter()
                    .map(ContentItem::as_item)
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl<'a> From<&'a Composition> for Item<'a> {
    fn from(composition: &'a Composition) -> Self {
        Item::Composition(composition)
    }
}

impl<'a> From<&'a Section> for Item<'a> {
    fn from(section: &'a Section) -> Self {
        Item::Section(section)
    }
}

impl<'a> From<&'a Entry> for Item<'a> {
    fn from(entry: &'a Entry) -> Self {
        Item::Entry(entry)
    }
}

impl<'a> From<&'a Link> for Item<'a> {
    fn from(link: &'a Link) -> Self {
        Item::Link(link)
    }
}

impl<'a> From<&'a ContentItem> for Item<'a> {
    fn from(item: &'a ContentItem) -> Self {
        item.as_item()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Predicate {
    NodeId(String),
    NodeIdAndName(String, String),
    Name(String),
    Index(usize),
}

impl Predicate {
    fn matches(&self, item: &Item<'_>) -> bool {
        match self {
            Predicate::NodeId(node_id) => item.archetype_node_id() == Some(node_id.as_str()),
            Predicate::NodeIdAndName(node_id, name) => {
                item.archetype_node_id() == Some(node_id.as_str()) && item.name() == name
            }
            Predicate::Name(name) => item.name() == name,
            Predicate::Index(_) => false,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::NodeId(node_id) => f.write_str(node_id),
            Predicate::NodeIdAndName(node_id, name) => write!(f, "{node_id}, '{}'", escape(name)),
            Predicate::Name(name) => write!(f, "'{}'", escape(name)),
            Predicate::Index(index) => write!(f, "{index}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Segment {
    pub attribute: String,
    pub predicate: Predicate,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.attribute, self.predicate)
    }
}

fn invalid(path: &str, reason: impl fmt::Display) -> OpenEhrError {
    OpenEhrError::InvalidPath(format!("{path}: {reason}"))
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Trims the path and drops a trailing `/` (other than the root itself).
pub(crate) fn normalise(path: &str) -> Result<&str, OpenEhrError> {
    let trimmed = path.trim();
    if !trimmed.starts_with('/') {
        return Err(invalid(path, "path must start with '/'"));
    }
    if trimmed.len() > 1 {
        if let Some(stripped) = trimmed.strip_suffix('/') {
            return Ok(stripped);
        }
    }
    Ok(trimmed)
}

/// Splits a path into segments. The root path yields no segments.
pub(crate) fn parse_segments(path: &str) -> Result<Vec<Segment>, OpenEhrError> {
    let normalised = normalise(path)?;
    let mut rest = &normalised[1..];
    let mut segments = Vec::new();

    while !rest.is_empty() {
        let (segment, remainder) = parse_segment(rest, path)?;
        segments.push(segment);
        rest = match remainder.strip_prefix('/') {
            Some("") => return Err(invalid(path, "empty segment")),
            Some(next) => next,
            None if remainder.is_empty() => remainder,
            None => return Err(invalid(path, format!("unexpected text '{remainder}'"))),
        };
    }

    Ok(segments)
}

fn parse_segment<'p>(input: &'p str, path: &str) -> Result<(Segment, &'p str), OpenEhrError> {
    let open = input
        .find('[')
        .ok_or_else(|| invalid(path, "segment is missing a '[...]' predicate"))?;

    let attribute = &input[..open];
    if attribute.is_empty() || !attribute.bytes().all(|b| b.is_ascii_lowercase() || b == b'_') {
        return Err(invalid(path, format!("'{attribute}' is not an attribute name")));
    }

    let mut in_quote = false;
    let mut escaped = false;
    let mut close = None;
    for (offset, c) in input[open + 1..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '\'' => in_quote = !in_quote,
            ']' if !in_quote => {
                close = Some(open + 1 + offset);
                break;
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(|| invalid(path, "unterminated predicate"))?;

    let predicate = parse_predicate(&input[open + 1..close], path)?;
    Ok((
        Segment {
            attribute: attribute.to_string(),
            predicate,
        },
        &input[close + 1..],
    ))
}

fn parse_predicate(raw: &str, path: &str) -> Result<Predicate, OpenEhrError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid(path, "empty predicate"));
    }

    if raw.starts_with('\'') {
        return Ok(Predicate::Name(parse_quoted_to_end(raw, path)?));
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let index = raw
            .parse::<usize>()
            .map_err(|_| invalid(path, format!("'{raw}' is not a position")))?;
        if index == 0 {
            return Err(invalid(path, "positions start at 1"));
        }
        return Ok(Predicate::Index(index));
    }

    match raw.split_once(',') {
        Some((node_id, name)) => Ok(Predicate::NodeIdAndName(
            parse_node_id(node_id.trim(), path)?,
            parse_quoted_to_end(name.trim(), path)?,
        )),
        None => Ok(Predicate::NodeId(parse_node_id(raw, path)?)),
    }
}

fn parse_node_id(raw: &str, path: &str) -> Result<String, OpenEhrError> {
    let ok = !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if !ok {
        return Err(invalid(path, format!("'{raw}' is not an archetype node id")));
    }
    Ok(raw.to_string())
}

/// Parses `'...'` and requires nothing to follow the closing quote.
fn parse_quoted_to_end(raw: &str, path: &str) -> Result<String, OpenEhrError> {
    let body = raw
        .strip_prefix('\'')
        .ok_or_else(|| invalid(path, format!("expected a quoted name, got '{raw}'")))?;

    let mut name = String::new();
    let mut chars = body.chars();
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some(c @ ('\\' | '\'')) => name.push(c),
                _ => return Err(invalid(path, "invalid escape in quoted name")),
            },
            Some('\'') => break,
            Some(c) => name.push(c),
            None => return Err(invalid(path, "unterminated quoted name")),
        }
    }

    if !chars.as_str().trim().is_empty() {
        return Err(invalid(path, format!("unexpected text after name '{name}'")));
    }
    if name.trim().is_empty() {
        return Err(invalid(path, "empty name"));
    }
    Ok(name)
}

/// Picks the single candidate the predicate selects.
pub(crate) fn select<'a>(
    candidates: &[Item<'a>],
    predicate: &Predicate,
    path: &str,
) -> Result<Item<'a>, OpenEhrError> {
    if let Predicate::Index(index) = predicate {
        return candidates
            .get(index - 1)
            .copied()
            .ok_or_else(|| invalid(path, format!("no item at position {index}")));
    }

    let mut matching = candidates.iter().filter(|item| predicate.matches(item));
    match (matching.next(), matching.next()) {
        (Some(item), None) => Ok(*item),
        (None, _) => Err(invalid(path, format!("no item matches [{predicate}]"))),
        (Some(_), Some(_)) => Err(invalid(path, format!("[{predicate}] matches several items"))),
    }
}

/// Follows `segments` from `start`, one attribute at a time.
pub(crate) fn walk<'a>(
    start: Item<'a>,
    segments: &[Segment],
    path: &str,
) -> Result<Item<'a>, OpenEhrError> {
    segments.iter().try_fold(start, |current, segment| {
        let children = current.children(&segment.attribute).ok_or_else(|| {
            invalid(
                path,
                format!("{} has no attribute '{}'", current.kind(), segment.attribute),
            )
        })?;
        select(&children, &segment.predicate, path)
    })
}

/// Returns `true` if `node_id` written as a predicate parses back to the same node id.
///
/// Node ids are free text; all-digit ids read back as positions and ids with spaces or
/// brackets do not parse at all.
fn addressable_node_id(node_id: &str) -> bool {
    matches!(parse_predicate(node_id, node_id), Ok(Predicate::NodeId(parsed)) if parsed == node_id)
}

/// The shortest predicate that selects `siblings[position]` and nothing else.
///
/// Falls back to the position when no id or name form is unique or when the node id cannot
/// be written as a predicate.
pub(crate) fn canonical_predicate(siblings: &[Item<'_>], position: usize) -> Predicate {
    let item = siblings[position];
    let name = item.name().to_string();

    let candidates = match item.archetype_node_id() {
        Some(node_id) if !addressable_node_id(node_id) => vec![],
        Some(node_id) => vec![
            Predicate::NodeId(node_id.to_string()),
            Predicate::NodeIdAndName(node_id.to_string(), name),
        ],
        None => vec![Predicate::Name(name)],
    };

    candidates
        .into_iter()
        .find(|predicate| siblings.iter().filter(|s| predicate.matches(s)).count() == 1)
        .unwrap_or(Predicate::Index(position + 1))
}

/// Every node under `item` with its canonical path, depth first.
pub(crate) fn collect<'a>(item: Item<'a>, prefix: &str, out: &mut Vec<(String, Item<'a>)>) {
    for attribute in item.attributes() {
        let children = item.children(attribute).unwrap_or_default();
        for (position, child) in children.iter().enumerate() {
            let segment = Segment {
                attribute: attribute.to_string(),
                predicate: canonical_predicate(&children, position),
            };
            let path = format!("{prefix}/{segment}");
            out.push((path.clone(), *child));
            collect(*child, &path, out);
        }
    }
}

/// Canonical path of the tree root.
pub(crate) fn root() -> String {
    ROOT_PATH.to_string()
}
