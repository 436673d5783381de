//! # rowshift-core
//!
//! Record metadata and statement primitives for the rowshift migration
//! engine.
//!
//! This crate provides:
//! - The `Record` trait and `#[derive(Record)]` for exposing a struct's fields
//! - `Descriptor`, the resolved identifier metadata of a record type
//! - `DescriptorProvider`, a per-type descriptor cache safe to share
//! - Column `Value`s with canonical text and literal renderings
//! - `TableName` sanitization and the `Upsert` statement builder
//!
//! ## Identifier Resolution
//!
//! ```rust
//! use rowshift_core::{DescriptorProvider, Record};
//!
//! #[derive(Record)]
//! struct Customer {
//!     #[record(id(auto_generated = false))]
//!     email: String,
//!     name: String,
//! }
//!
//! let provider = DescriptorProvider::new();
//! let descriptor = provider.descriptor::<Customer>().unwrap();
//! assert_eq!(descriptor.id_field_name(), "email");
//!
//! let mut customer = Customer {
//!     email: "ada@example.com".to_string(),
//!     name: "Ada".to_string(),
//! };
//! descriptor.set_id(&mut customer, "lovelace@example.com").unwrap();
//! assert_eq!(descriptor.get_id(&customer).unwrap(), "lovelace@example.com");
//! ```

// Lets `#[derive(Record)]` expand to `::rowshift_core` paths inside this crate.
extern crate self as rowshift_core;

pub mod descriptor;
pub mod error;
pub mod literal;
pub mod provider;
pub mod statement;
pub mod table;
pub mod value;

pub use descriptor::{Descriptor, FieldDescriptor, FieldInfo, IdAnnotation, Record, RecordType};
pub use error::{ConfigError, DescriptorError};
pub use literal::{parse_literal, LiteralError};
pub use provider::DescriptorProvider;
pub use rowshift_derive::Record;
pub use statement::Upsert;
pub use table::TableName;
pub use value::Value;
