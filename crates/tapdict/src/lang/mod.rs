//! Language-specific items.
//!
//! All modules under this module are [ISO 639-3] language codes.
//!
//! [ISO 639-3]: https://iso639-3.sil.org/code_tables/639/data

pub mod jpn;
