//! Record metadata and identifier descriptors.
//!
//! A record type exposes its fields through the [`Record`] trait, usually via
//! `#[derive(Record)]`. A [`Descriptor`] is the resolved view of one record
//! type: which field is the identifier, whether the store generates it, and
//! accessors for reading and writing it that were picked once at resolution
//! time.

use std::any::{Any, TypeId};
use std::fmt;

use crate::error::{DescriptorError, Result};

/// Reads a field out of a type-erased record, `None` if the record has
/// another type.
pub type FieldGetter = fn(&dyn Any) -> Option<&dyn Any>;

/// Mutable counterpart of [`FieldGetter`].
pub type FieldGetterMut = fn(&mut dyn Any) -> Option<&mut dyn Any>;

/// Names accepted as identifier when no field is annotated, besides
/// `<snake_case type name>_id`.
pub const CONVENTIONAL_ID_NAMES: &[&str] = &["id", "Id", "ID", "_id"];

/// Explicit identifier annotation carried by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdAnnotation {
    /// Whether the store generates the identifier when the record has none.
    pub auto_generated: bool,
}

/// Field metadata exposed by a [`Record`] implementation.
#[derive(Clone, Copy)]
pub struct FieldInfo {
    /// Field name.
    pub name: &'static str,
    /// Declared type as written in the struct definition.
    pub declared_type: &'static str,
    /// Runtime type of the field.
    pub type_id: TypeId,
    /// Identifier annotation, if the field carries one.
    pub id: Option<IdAnnotation>,
    /// Shared accessor.
    pub get: FieldGetter,
    /// Mutable accessor.
    pub get_mut: FieldGetterMut,
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInfo")
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A record type whose fields can be introspected.
///
/// Implemented by `#[derive(Record)]`:
///
/// ```ignore
/// use rowshift_core::Record;
///
/// #[derive(Record)]
/// struct User {
///     #[record(id(auto_generated = false))]
///     email: String,
///     name: String,
/// }
/// ```
pub trait Record: Any + Send + Sync {
    /// Display name of the record type.
    fn type_name() -> &'static str;

    /// Metadata for every field, in declaration order.
    fn fields() -> Vec<FieldInfo>;
}

/// Runtime handle to a record type, for callers that only know the type
/// dynamically.
#[derive(Clone, Copy)]
pub struct RecordType {
    type_id: TypeId,
    name: &'static str,
    fields: fn() -> Vec<FieldInfo>,
}

impl RecordType {
    /// Returns the handle for `T`.
    #[must_use]
    pub fn of<T: Record>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::type_name(),
            fields: T::fields,
        }
    }

    /// Returns the runtime type id.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the field metadata.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldInfo> {
        (self.fields)()
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Public view of one field of a described record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: &'static str,
    /// Declared type as written in the struct definition.
    pub declared_type: &'static str,
    /// Whether this field is the resolved identifier.
    pub is_id: bool,
}

#[derive(Clone, Copy)]
struct IdAccessor {
    get: FieldGetter,
    get_mut: FieldGetterMut,
}

/// Resolved identifier metadata for one record type.
///
/// Immutable once built; shared through `Arc` by the descriptor provider.
pub struct Descriptor {
    type_id: TypeId,
    type_name: &'static str,
    id_field_name: &'static str,
    id_auto_generated: bool,
    fields: Vec<FieldDescriptor>,
    id_accessor: IdAccessor,
}

impl Descriptor {
    /// Resolves the descriptor for a record type.
    ///
    /// An annotated field wins over conventional names. Fails if no field
    /// qualifies, if several do, or if the identifier is not a `String`.
    pub fn build(record_type: &RecordType) -> Result<Self> {
        let type_name = record_type.name();
        let infos = record_type.fields();
        let (index, auto_generated) = resolve_id_field(type_name, &infos)?;
        let id_info = &infos[index];

        if id_info.type_id != TypeId::of::<String>() {
            return Err(DescriptorError::UnsupportedIdType {
                type_name: type_name.to_string(),
                field: id_info.name.to_string(),
                found: id_info.declared_type.to_string(),
            });
        }

        let fields = infos
            .iter()
            .enumerate()
            .map(|(i, info)| FieldDescriptor {
                name: info.name,
                declared_type: info.declared_type,
                is_id: i == index,
            })
            .collect();

        Ok(Self {
            type_id: record_type.type_id(),
            type_name,
            id_field_name: id_info.name,
            id_auto_generated: auto_generated,
            fields,
            id_accessor: IdAccessor {
                get: id_info.get,
                get_mut: id_info.get_mut,
            },
        })
    }

    /// Returns the display name of the record type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the runtime type id of the record type.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the identifier field name.
    #[must_use]
    pub const fn id_field_name(&self) -> &'static str {
        self.id_field_name
    }

    /// Returns whether the store generates identifiers for this type.
    #[must_use]
    pub const fn is_id_auto_generated(&self) -> bool {
        self.id_auto_generated
    }

    /// Returns all fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Reads the identifier of `record`.
    pub fn get_id(&self, record: &dyn Any) -> Result<String> {
        (self.id_accessor.get)(record)
            .and_then(|value| value.downcast_ref::<String>())
            .cloned()
            .ok_or_else(|| self.type_mismatch())
    }

    /// Overwrites the identifier of `record`.
    pub fn set_id(&self, record: &mut dyn Any, id: impl Into<String>) -> Result<()> {
        let slot = (self.id_accessor.get_mut)(record)
            .and_then(|value| value.downcast_mut::<String>())
            .ok_or_else(|| self.type_mismatch())?;
        *slot = id.into();
        Ok(())
    }

    fn type_mismatch(&self) -> DescriptorError {
        DescriptorError::RecordTypeMismatch {
            expected: self.type_name.to_string(),
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("type_name", &self.type_name)
            .field("id_field_name", &self.id_field_name)
            .field("id_auto_generated", &self.id_auto_generated)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Returns the conventional identifier names for a record type, in priority
/// order.
#[must_use]
pub fn conventional_id_names(type_name: &str) -> Vec<String> {
    let mut names: Vec<String> = CONVENTIONAL_ID_NAMES
        .iter()
        .map(|name| (*name).to_string())
        .collect();
    names.push(format!("{}_id", to_snake_case(type_name)));
    names
}

/// Picks the identifier field index and its auto-generation flag.
fn resolve_id_field(type_name: &str, fields: &[FieldInfo]) -> Result<(usize, bool)> {
    let annotated: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.id.is_some())
        .map(|(i, _)| i)
        .collect();

    match annotated.as_slice() {
        [index] => {
            let auto_generated = fields[*index].id.is_some_and(|id| id.auto_generated);
            return Ok((*index, auto_generated));
        }
        [] => {}
        many => {
            return Err(DescriptorError::AmbiguousId {
                type_name: type_name.to_string(),
                candidates: many.iter().map(|i| fields[*i].name.to_string()).collect(),
            });
        }
    }

    let conventions = conventional_id_names(type_name);
    let matches: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| conventions.iter().any(|c| c == f.name))
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [index] => Ok((*index, true)),
        [] => Err(DescriptorError::MissingIdField {
            type_name: type_name.to_string(),
            conventions: conventions.join(", "),
        }),
        many => Err(DescriptorError::AmbiguousId {
            type_name: type_name.to_string(),
            candidates: many.iter().map(|i| fields[*i].name.to_string()).collect(),
        }),
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Record;

    #[derive(Debug, Default, Record)]
    struct Annotated {
        #[record(id(auto_generated = false))]
        email: String,
        name: String,
    }

    #[derive(Debug, Default, Record)]
    struct Conventional {
        id: String,
        score: i64,
    }

    #[derive(Debug, Default, Record)]
    struct UserAccount {
        user_account_id: String,
        active: bool,
    }

    #[derive(Debug, Default, Record)]
    struct NoId {
        name: String,
    }

    #[derive(Debug, Default, Record)]
    struct NumericId {
        id: i64,
    }

    #[derive(Debug, Default, Record)]
    struct TwoAnnotations {
        #[record(id)]
        first: String,
        #[record(id)]
        second: String,
    }

    #[derive(Debug, Default, Record)]
    struct TwoConventions {
        id: String,
        _id: String,
    }

    #[derive(Debug, Default, Record)]
    struct AnnotationBeatsConvention {
        id: String,
        #[record(id)]
        key: String,
    }

    #[test]
    fn test_annotated_id() {
        let descriptor = Descriptor::build(&RecordType::of::<Annotated>()).unwrap();
        assert_eq!(descriptor.type_name(), "Annotated");
        assert_eq!(descriptor.id_field_name(), "email");
        assert!(!descriptor.is_id_auto_generated());
        assert_eq!(descriptor.fields().len(), 2);
        assert!(descriptor.field("email").unwrap().is_id);
        assert!(!descriptor.field("name").unwrap().is_id);
    }

    #[test]
    fn test_conventional_id_is_auto_generated() {
        let descriptor = Descriptor::build(&RecordType::of::<Conventional>()).unwrap();
        assert_eq!(descriptor.id_field_name(), "id");
        assert!(descriptor.is_id_auto_generated());
        assert_eq!(descriptor.field("score").unwrap().declared_type, "i64");
    }

    #[test]
    fn test_type_named_convention() {
        let descriptor = Descriptor::build(&RecordType::of::<UserAccount>()).unwrap();
        assert_eq!(descriptor.id_field_name(), "user_account_id");
    }

    #[test]
    fn test_annotation_takes_priority() {
        let descriptor =
            Descriptor::build(&RecordType::of::<AnnotationBeatsConvention>()).unwrap();
        assert_eq!(descriptor.id_field_name(), "key");
        assert!(descriptor.is_id_auto_generated());
    }

    #[test]
    fn test_missing_id() {
        let err = Descriptor::build(&RecordType::of::<NoId>()).unwrap_err();
        match err {
            DescriptorError::MissingIdField {
                type_name,
                conventions,
            } => {
                assert_eq!(type_name, "NoId");
                assert_eq!(conventions, "id, Id, ID, _id, no_id_id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_string_id() {
        let err = Descriptor::build(&RecordType::of::<NumericId>()).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::UnsupportedIdType {
                type_name: "NumericId".to_string(),
                field: "id".to_string(),
                found: "i64".to_string(),
            }
        );
    }

    #[test]
    fn test_ambiguous_annotations() {
        let err = Descriptor::build(&RecordType::of::<TwoAnnotations>()).unwrap_err();
        assert_eq!(
            err,
            DescriptorError::AmbiguousId {
                type_name: "TwoAnnotations".to_string(),
                candidates: vec!["first".to_string(), "second".to_string()],
            }
        );
    }

    #[test]
    fn test_ambiguous_conventions() {
        let err = Descriptor::build(&RecordType::of::<TwoConventions>()).unwrap_err();
        assert!(matches!(err, DescriptorError::AmbiguousId { .. }));
    }

    #[test]
    fn test_get_and_set_id_match_field_access() {
        let descriptor = Descriptor::build(&RecordType::of::<Annotated>()).unwrap();
        let mut record = Annotated {
            email: "a@example.com".to_string(),
            name: "Ada".to_string(),
        };

        assert_eq!(descriptor.get_id(&record).unwrap(), record.email);

        descriptor.set_id(&mut record, "b@example.com").unwrap();
        assert_eq!(record.email, "b@example.com");
        assert_eq!(record.name, "Ada");
    }

    #[test]
    fn test_accessor_rejects_other_types() {
        let descriptor = Descriptor::build(&RecordType::of::<Annotated>()).unwrap();
        let mut other = Conventional::default();

        assert_eq!(
            descriptor.get_id(&other).unwrap_err(),
            DescriptorError::RecordTypeMismatch {
                expected: "Annotated".to_string()
            }
        );
        assert!(descriptor.set_id(&mut other, "x").is_err());
        assert_eq!(other.id, "");
    }
}
