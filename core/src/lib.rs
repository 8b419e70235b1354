//! Core record and schema types shared by every recordstore crate.
//!
//! This crate has no database dependency. It defines:
//!
//! - [`Value`] and [`Record`]: scalar values and the dictionary rows every
//!   store operation reads and writes.
//! - [`TableSchema`] and [`ColumnDef`]: static and dynamic table
//!   declarations.
//! - [`DefinitionBundle`]: a versioned group of static declarations a store
//!   is seeded from.
//! - [`Condition`]: the structured filter/order/window builder, rendered to
//!   parameterized SQL by [`Condition::render`].
//! - [`HighlightMarker`]: match markers for full-text search snippets.
//!
//! Validation ([`validate_table`], [`validate_bundle`], [`validate_identifier`])
//! rejects malformed names before anything reaches SQL text.
//!
//! # Example
//!
//! ```
//! use recordstore_core::*;
//!
//! let contacts = TableSchema::new("contacts", "id")
//!     .with_column("id", ColumnType::Integer)
//!     .with_column("name", ColumnType::Text)
//!     .with_column("city", ColumnType::Text)
//!     .searchable(["name", "city"]);
//! assert!(validate_table(&contacts).is_empty());
//!
//! let record = Record::new().with("name", "Ada").with("city", "London");
//! assert_eq!(record.len(), 2);
//!
//! let lookup = Condition::new().and_eq("city", "London").asc("name").limit(10, 0);
//! let fragment = lookup.render().unwrap();
//! assert_eq!(fragment.sql, "WHERE \"city\" = ? ORDER BY \"name\" ASC LIMIT ? OFFSET ?");
//! assert_eq!(fragment.params.len(), 3);
//! ```

mod bundle;
mod condition;
mod highlight;
mod types;
mod validate;
mod value;

pub use bundle::DefinitionBundle;
pub use condition::{
    Clause, Condition, Connector, Direction, Operand, Operator, SqlFragment, Window,
};
pub use highlight::{HighlightMarker, Rgb};
pub use types::*;
pub use validate::{
    MAX_IDENTIFIER_LEN, ValidationError, validate_bundle, validate_column_name,
    validate_identifier, validate_table, validate_table_name,
};
pub use value::{Record, Value};
