//! Cache handler trait.
//!
//! Defines the storage contract every backend honours. Records are addressed
//! by string keys and hold either a single scalar value or a map of named
//! fields.

use async_trait::async_trait;

use crate::CacheResult;
use crate::iter::KeyIterator;

/// Field under which scalar values are stored.
///
/// Both backends keep every record as a field map; a scalar record is a map
/// whose only meaningful entry is this field. Writing a scalar onto a field
/// record therefore adds this field, and writing a field onto a scalar record
/// leaves the scalar readable.
pub const SCALAR_FIELD: &str = "__";

// =============================================================================
// Cache Handler Trait
// =============================================================================

/// Uniform key-value storage with field-map records.
///
/// Backends are interchangeable: code written against this trait must behave
/// identically on the in-process map and on Redis.
///
/// Key patterns accepted by [`destroy`](Self::destroy) and
/// [`keys`](Self::keys) use `*` as the only wildcard. See
/// [`GlobPattern`](crate::GlobPattern).
///
/// # Example
///
/// ```ignore
/// use keystash_cache::{CacheHandler, MemoryCache};
///
/// async fn example(cache: &dyn CacheHandler) -> keystash_cache::CacheResult<()> {
///     cache.write_field("client:c1", "name", "Example").await?;
///     assert_eq!(cache.read_field("client:c1", "name").await?, "Example");
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait CacheHandler: Send + Sync {
    /// Returns `true` if a record exists under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Returns `true` if the record under `key` has a field named `field`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn field_exists(&self, key: &str, field: &str) -> CacheResult<bool>;

    /// Reads the scalar value stored under `key`.
    ///
    /// Returns an empty string when the record (or its scalar value) is
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn read(&self, key: &str) -> CacheResult<String>;

    /// Reads one field of the record under `key`.
    ///
    /// Returns an empty string when the record or the field is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn read_field(&self, key: &str, field: &str) -> CacheResult<String>;

    /// Creates or replaces the scalar value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn write(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Creates or replaces one field of the record under `key`.
    ///
    /// Sibling fields are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn write_field(&self, key: &str, field: &str, value: &str) -> CacheResult<()>;

    /// Sets one field only if the record does not have it yet.
    ///
    /// The check and the write are a single atomic step, so of several
    /// concurrent callers exactly one gets `Ok(true)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn write_field_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> CacheResult<bool>;

    /// Deletes the record under `key`.
    ///
    /// If `key` contains `*`, every record whose key matches the pattern is
    /// deleted instead. Deleting a missing record is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn destroy(&self, key: &str) -> CacheResult<()>;

    /// Removes one field from the record under `key`.
    ///
    /// The in-process backend keeps the record even when it becomes empty.
    /// Redis drops a hash once its last field is removed, so callers must not
    /// rely on an emptied record still existing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn destroy_field(&self, key: &str, field: &str) -> CacheResult<()>;

    /// Atomically moves the record under `old_key` to `new_key`.
    ///
    /// Any record already stored under `new_key` is replaced.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the record was moved
    /// - `Ok(false)` if `old_key` does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn rename(&self, old_key: &str, new_key: &str) -> CacheResult<bool>;

    /// Enumerates keys matching `pattern`.
    ///
    /// The returned iterator is a snapshot taken when this call completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn keys(&self, pattern: &str) -> CacheResult<KeyIterator>;

    /// Enumerates the field names of the record under `key`.
    ///
    /// The scalar slot ([`SCALAR_FIELD`]) is never reported.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    async fn fields(&self, key: &str) -> CacheResult<KeyIterator>;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
}
