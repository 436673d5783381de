//! Per-type descriptor cache.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::descriptor::{Descriptor, Record, RecordType};
use crate::error::Result;

/// Resolves and caches one [`Descriptor`] per record type.
///
/// Every call for a given type after the first returns the same `Arc`.
/// Concurrent first calls may both resolve the type, but only the first
/// insert is kept and every caller receives that instance. Failed
/// resolutions are not cached.
///
/// # Example
///
/// ```ignore
/// let provider = DescriptorProvider::new();
/// let descriptor = provider.descriptor::<User>()?;
/// let id = descriptor.get_id(&user)?;
/// ```
#[derive(Debug, Default)]
pub struct DescriptorProvider {
    cache: DashMap<TypeId, Arc<Descriptor>>,
}

impl DescriptorProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the descriptor for `T`.
    pub fn descriptor<T: Record>(&self) -> Result<Arc<Descriptor>> {
        self.descriptor_for(&RecordType::of::<T>())
    }

    /// Returns the descriptor for a dynamically known record type.
    pub fn descriptor_for(&self, record_type: &RecordType) -> Result<Arc<Descriptor>> {
        if let Some(cached) = self.cache.get(&record_type.type_id()) {
            return Ok(Arc::clone(cached.value()));
        }

        let descriptor = Arc::new(Descriptor::build(record_type)?);
        debug!(
            record = record_type.name(),
            id_field = descriptor.id_field_name(),
            auto_generated = descriptor.is_id_auto_generated(),
            "Resolved record descriptor"
        );

        let entry = self
            .cache
            .entry(record_type.type_id())
            .or_insert(descriptor);
        Ok(Arc::clone(entry.value()))
    }

    /// Returns whether a descriptor for `T` is cached.
    #[must_use]
    pub fn contains<T: Record>(&self) -> bool {
        self.cache.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of cached descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
