//! Element path grammar.
//!
//! An [`ElementPath`] addresses a file, or a declaration inside a file, with a
//! compact chained syntax:
//!
//! ```text
//! file:src/User.kt/class[User]/function[validate]
//! file:src/User.kt/class[User]/companion_object/property[DEFAULT]
//! file:src/User.kt/class[User]/constructor[primary]
//! ```
//!
//! Kind keywords are case-insensitive and a few synonyms are accepted
//! (`fun` for `function`, `val`/`var` for `property`, ...). Serialization
//! always emits the canonical keyword.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const FILE_PREFIX: &str = "file:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathSyntaxError {
    #[error("path must start with 'file:': {input}")]
    MissingFilePrefix { input: String },

    #[error("path has an empty file part: {input}")]
    EmptyFile { input: String },

    #[error("unknown segment kind '{keyword}' in {input}")]
    UnknownKind { keyword: String, input: String },

    #[error("malformed segment '{segment}' in {input}: {reason}")]
    MalformedSegment {
        segment: String,
        input: String,
        reason: &'static str,
    },
}

/// Declaration kinds addressable by a path segment, plus `File` for the
/// root of every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ElementKind {
    File,
    Class,
    Interface,
    Object,
    Enum,
    Function,
    Property,
    EnumEntry,
    CompanionObject,
    Init,
    Constructor,
}

impl ElementKind {
    /// Parse a kind keyword, accepting synonyms. Case-insensitive.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let kind = match keyword.trim().to_ascii_lowercase().as_str() {
            "file" => ElementKind::File,
            "class" => ElementKind::Class,
            "interface" => ElementKind::Interface,
            "object" => ElementKind::Object,
            "enum" | "enum_class" => ElementKind::Enum,
            "function" | "fun" | "method" => ElementKind::Function,
            "property" | "val" | "var" | "field" => ElementKind::Property,
            "enum_entry" | "entry" => ElementKind::EnumEntry,
            "companion_object" | "companion" => ElementKind::CompanionObject,
            "init" | "initializer" => ElementKind::Init,
            "constructor" | "ctor" => ElementKind::Constructor,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical keyword used when serializing.
    pub fn keyword(self) -> &'static str {
        match self {
            ElementKind::File => "file",
            ElementKind::Class => "class",
            ElementKind::Interface => "interface",
            ElementKind::Object => "object",
            ElementKind::Enum => "enum",
            ElementKind::Function => "function",
            ElementKind::Property => "property",
            ElementKind::EnumEntry => "enum_entry",
            ElementKind::CompanionObject => "companion_object",
            ElementKind::Init => "init",
            ElementKind::Constructor => "constructor",
        }
    }

    /// Kinds whose segment carries no name at all.
    pub fn is_anonymous(self) -> bool {
        matches!(self, ElementKind::CompanionObject)
    }

    /// Kinds whose segment name is an optional selector (index or `primary`).
    pub fn has_optional_selector(self) -> bool {
        matches!(self, ElementKind::Init | ElementKind::Constructor)
    }

    /// Kinds that may only appear inside a class-like body.
    pub fn is_member_only(self) -> bool {
        matches!(
            self,
            ElementKind::CompanionObject | ElementKind::Init | ElementKind::Constructor
        )
    }

    /// Kinds that own a declaration body.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ElementKind::File
                | ElementKind::Class
                | ElementKind::Interface
                | ElementKind::Object
                | ElementKind::Enum
                | ElementKind::CompanionObject
                | ElementKind::EnumEntry
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ElementKind {
    type Err = PathSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKind::from_keyword(s).ok_or_else(|| PathSyntaxError::UnknownKind {
            keyword: s.to_string(),
            input: s.to_string(),
        })
    }
}

impl TryFrom<String> for ElementKind {
    type Error = PathSyntaxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        kind.keyword().to_string()
    }
}

/// One hop in an element path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub kind: ElementKind,
    /// Name, or selector for `init`/`constructor`. `None` for the companion
    /// object and for selector-less `init`/`constructor`.
    pub name: Option<String>,
}

impl Segment {
    pub fn new(kind: ElementKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
        }
    }

    pub fn companion() -> Self {
        Self {
            kind: ElementKind::CompanionObject,
            name: None,
        }
    }

    /// Numeric selector for `init[N]` / `constructor[N]`. Missing or
    /// non-numeric selectors mean index 0.
    pub fn index(&self) -> usize {
        self.name
            .as_deref()
            .and_then(|n| n.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Whether this is `constructor[primary]`.
    pub fn is_primary_constructor(&self) -> bool {
        self.kind == ElementKind::Constructor
            && self
                .name
                .as_deref()
                .is_some_and(|n| n.trim().eq_ignore_ascii_case("primary"))
    }

    /// Canonical `kind[name]` form.
    pub fn to_path_string(&self) -> String {
        match &self.name {
            Some(name) if !self.kind.is_anonymous() => format!("{}[{}]", self.kind, name),
            _ => self.kind.keyword().to_string(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

/// Structured address of a file or of a declaration inside a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementPath {
    file: String,
    segments: Vec<Segment>,
}

impl ElementPath {
    /// Path addressing a whole file.
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            segments: Vec::new(),
        }
    }

    pub fn with_segments(file: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            file: file.into(),
            segments,
        }
    }

    /// Parse the `file:<path>(/<kind>[<name>])*` syntax.
    pub fn parse(input: &str) -> Result<Self, PathSyntaxError> {
        let trimmed = input.trim();
        let rest = strip_prefix_ignore_case(trimmed, FILE_PREFIX).ok_or_else(|| {
            PathSyntaxError::MissingFilePrefix {
                input: input.to_string(),
            }
        })?;

        let split = find_first_segment(rest);
        let (file, tail) = rest.split_at(split);
        if file.trim().is_empty() {
            return Err(PathSyntaxError::EmptyFile {
                input: input.to_string(),
            });
        }

        let mut segments = Vec::new();
        for raw in split_segments(tail) {
            segments.push(parse_segment(raw, input)?);
        }

        Ok(Self {
            file: file.trim().to_string(),
            segments,
        })
    }

    pub fn file_path(&self) -> &str {
        &self.file
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_file(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_segment(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Path extended by one segment.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self {
            file: self.file.clone(),
            segments,
        }
    }

    /// Path with the last segment dropped; `None` for a file path.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            file: self.file.clone(),
            segments,
        })
    }

    /// Canonical serialization. Synonyms are normalized to the canonical
    /// keyword, so this need not echo the original spelling.
    pub fn to_path_string(&self) -> String {
        let mut out = format!("{FILE_PREFIX}{}", self.file);
        for segment in &self.segments {
            out.push('/');
            out.push_str(&segment.to_path_string());
        }
        out
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

impl FromStr for ElementPath {
    type Err = PathSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementPath::parse(s)
    }
}

impl TryFrom<String> for ElementPath {
    type Error = PathSyntaxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ElementPath::parse(&value)
    }
}

impl From<ElementPath> for String {
    fn from(path: ElementPath) -> Self {
        path.to_path_string()
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Byte offset in `rest` where the first segment's leading `/` sits, or
/// `rest.len()` when there are no segments.
///
/// A `/` starts the segment list only if every component after it is shaped
/// like a segment, so `src/object/Foo.kt` stays a file path while a
/// misspelled `functon[f]` is still reported as an unknown kind.
fn find_first_segment(rest: &str) -> usize {
    for (i, _) in rest.match_indices('/') {
        if split_segments(&rest[i..])
            .iter()
            .all(|raw| is_segment_shaped(raw))
        {
            return i;
        }
    }
    rest.len()
}

/// `ident[...]` with any identifier, or a bare keyword that may stand alone.
fn is_segment_shaped(raw: &str) -> bool {
    match raw.find('[') {
        Some(open) => {
            let ident = &raw[..open];
            !ident.is_empty()
                && ident
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => ElementKind::from_keyword(raw).is_some_and(|kind| {
            kind.is_anonymous() || kind.has_optional_selector()
        }),
    }
}

/// Split `/a[x]/b[y/z]` into `["a[x]", "b[y/z]"]`, ignoring slashes inside
/// brackets.
fn split_segments(tail: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in tail.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                if let Some(s) = start {
                    out.push(&tail[s..i]);
                }
                start = Some(i + 1);
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push(&tail[s..]);
    }
    out
}

fn parse_segment(raw: &str, input: &str) -> Result<Segment, PathSyntaxError> {
    let malformed = |reason| PathSyntaxError::MalformedSegment {
        segment: raw.to_string(),
        input: input.to_string(),
        reason,
    };

    let (keyword, name) = match raw.find('[') {
        Some(open) => {
            if !raw.ends_with(']') {
                return Err(malformed("missing closing ']'"));
            }
            let name = raw[open + 1..raw.len() - 1].trim();
            (&raw[..open], Some(name))
        }
        None => (raw, None),
    };

    let kind = ElementKind::from_keyword(keyword).ok_or_else(|| PathSyntaxError::UnknownKind {
        keyword: keyword.to_string(),
        input: input.to_string(),
    })?;
    if kind == ElementKind::File {
        return Err(malformed("'file' is only valid as the path prefix"));
    }

    if kind.is_anonymous() {
        return match name {
            None | Some("") => Ok(Segment {
                kind,
                name: None,
            }),
            Some(_) => Err(malformed("companion_object takes no name")),
        };
    }

    match name {
        Some("") if kind.has_optional_selector() => Ok(Segment { kind, name: None }),
        Some("") => Err(malformed("empty name")),
        Some(name) => Ok(Segment::new(kind, name)),
        None if kind.has_optional_selector() => Ok(Segment { kind, name: None }),
        None => Err(malformed("expected kind[name]")),
    }
}
