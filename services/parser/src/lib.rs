//! CVM executive compensation normalizer.
//!
//! Turns the merged CVM "Formulário de Referência" extract, whose column
//! names and text encoding drifted between revisions, into one canonical
//! table: every known field present under its canonical name, numbers
//! finite, labels upper-cased, fiscal years typed or explicitly missing.
//!
//! The pipeline is `decode` -> `raw` -> `normalize` -> `table`, driven by
//! the field list in `schema`.

pub mod decode;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod raw;
pub mod schema;
pub mod table;

pub use error::NormalizeError;
pub use normalize::{normalize, normalize_or_empty, normalize_raw, NormalizeReport, Normalized};
pub use schema::{CanonicalField, FieldKind, SCHEMA};
pub use table::{CanonicalTable, Row, Selection};
