use std::sync::Arc;

use auto_impl::auto_impl;

use super::{
    Bytes, MaybeBytes, StorageError, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix,
    StorePrefixes,
};

/// Read metadata documents and chunks from a store.
#[auto_impl(Arc)]
pub trait ReadableStorageTraits: Send + Sync {
    /// Read the value at `key`, or [`None`] if nothing is stored there.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError>;

    /// The size in bytes of the value at `key`, or [`None`] if nothing is stored there.
    ///
    /// Used to test for the presence of `.zarray` and `.zgroup` documents without reading them.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError>;
}

/// List the keys of a store.
#[auto_impl(Arc)]
pub trait ListableStorageTraits: Send + Sync {
    /// Every key in the store.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list(&self) -> Result<StoreKeys, StorageError>;

    /// Every key under `prefix`, at any depth.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError>;

    /// The keys and prefixes directly under `prefix`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError>;
}

/// Write to and erase from a store.
#[auto_impl(Arc)]
pub trait WritableStorageTraits: Send + Sync {
    /// Write `value` to `key`, replacing any existing value.
    ///
    /// # Errors
    /// Returns a [`StorageError`] on failure to store.
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError>;

    /// Erase `key`. Erasing a missing key succeeds.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn erase(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Erase every key under `prefix`. Erasing a missing prefix succeeds.
    ///
    /// Erasing [`StorePrefix::root`] empties the store.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the erase fails.
    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError>;
}

/// A store which can be read, written and listed, such as the destination of a subsample.
pub trait ReadableWritableListableStorageTraits:
    ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

impl<T> ReadableWritableListableStorageTraits for T where
    T: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits
{
}

/// The child prefixes of `prefix`, the candidate arrays and groups of a hierarchy.
///
/// Prefixes whose name starts with `__` are skipped.
///
/// # Errors
/// Returns a [`StorageError`] if there is an underlying error with the store.
pub fn discover_children<TStorage: ?Sized + ListableStorageTraits>(
    storage: &Arc<TStorage>,
    prefix: &StorePrefix,
) -> Result<StorePrefixes, StorageError> {
    let children = storage.list_dir(prefix)?;
    Ok(children
        .prefixes()
        .iter()
        .filter(|child| {
            let name = child
                .as_str()
                .strip_prefix(prefix.as_str())
                .unwrap_or(child.as_str());
            !name.starts_with("__")
        })
        .cloned()
        .collect())
}
