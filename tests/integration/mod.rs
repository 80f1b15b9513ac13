//! Integration tests for the structural repository
//!
//! Each module drives `StructuralRepository` against a temporary Kotlin
//! project on disk.

mod batches;
mod common;
mod concurrency;
mod imports;
mod mutations;
mod navigation;
mod persistence;
