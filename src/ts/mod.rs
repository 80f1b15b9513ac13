//! Tree-sitter integration for Kotlin sources.
//!
//! The raw CST is condensed into a declaration [`Outline`]: the arena of
//! declaration nodes that element paths resolve against. Byte spans in the
//! outline are exact, so every structural edit can be expressed as a
//! byte-span replacement without losing comments or formatting.

pub mod errors;
pub mod fragment;
pub mod outline;
pub mod parser;
pub mod query;
pub mod validator;

pub use errors::TreeSitterError;
pub use fragment::{Fragment, FragmentContext};
pub use outline::{Body, NodeId, Outline, OutlineNode};
pub use parser::{KotlinParser, ParsedSource};
pub use query::{QueryEngine, QueryMatch};
pub use validator::validate_syntax;
