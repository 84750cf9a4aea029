//! Zarr V2 groups.
//!
//! A [`Group`] is the root of a hierarchy, identified by `.zgroup`.
//! Its direct child arrays are found from consolidated metadata in `.zmetadata` if present, and otherwise by listing the store.

use std::sync::Arc;

use thiserror::Error;
use timeslice_metadata::{
    v2::{ArrayMetadataV2, ConsolidatedMetadataV2, GroupMetadataV2},
    AttributesV2, ARRAY_METADATA_V2_KEY, ATTRIBUTES_V2_KEY, CONSOLIDATED_METADATA_V2_KEY,
    GROUP_METADATA_V2_KEY,
};
use timeslice_storage::{
    discover_children, Bytes, ListableStorageTraits, ReadableStorageTraits, StorageError,
    StoreKey, StorePrefix, WritableStorageTraits,
};

use crate::array::{retrieve_array_documents, Array, ArrayCreateError};

/// A group creation error.
#[derive(Clone, Debug, Error)]
pub enum GroupCreateError {
    /// Storage error.
    #[error(transparent)]
    StorageError(#[from] StorageError),
    /// Missing metadata.
    #[error("group metadata is missing")]
    MissingMetadata,
}

/// A Zarr V2 group at the root of a store.
#[derive(Debug)]
pub struct Group<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    metadata: GroupMetadataV2,
    attributes: AttributesV2,
    consolidated_metadata: Option<ConsolidatedMetadataV2>,
}

fn root_key(document: &str) -> Result<StoreKey, StorageError> {
    Ok(StoreKey::new(document)?)
}

fn parse_document<T: serde::de::DeserializeOwned>(
    key: StoreKey,
    bytes: &[u8],
) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|err| StorageError::InvalidMetadata(key, err.to_string()))
}

impl<TStorage: ?Sized> Group<TStorage> {
    /// Get the underlying storage backing the group.
    #[must_use]
    pub fn storage(&self) -> Arc<TStorage> {
        self.storage.clone()
    }

    /// Get the group metadata.
    #[must_use]
    pub const fn metadata(&self) -> &GroupMetadataV2 {
        &self.metadata
    }

    /// Get the group attributes.
    #[must_use]
    pub const fn attributes(&self) -> &AttributesV2 {
        &self.attributes
    }

    /// Get the consolidated metadata, if the group has any.
    #[must_use]
    pub const fn consolidated_metadata(&self) -> Option<&ConsolidatedMetadataV2> {
        self.consolidated_metadata.as_ref()
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + ListableStorageTraits + 'static> Group<TStorage> {
    /// Open the group at the root of `storage`.
    ///
    /// Consolidated metadata is read from `.zmetadata` if present.
    ///
    /// # Errors
    /// Returns [`GroupCreateError`] if `.zgroup` is missing, or there is a storage error or any metadata is invalid.
    pub fn open(storage: Arc<TStorage>) -> Result<Self, GroupCreateError> {
        let key = root_key(GROUP_METADATA_V2_KEY)?;
        let Some(metadata) = storage.get(&key)? else {
            return Err(GroupCreateError::MissingMetadata);
        };
        let metadata: GroupMetadataV2 = parse_document(key, &metadata)?;

        let key = root_key(ATTRIBUTES_V2_KEY)?;
        let attributes = match storage.get(&key)? {
            Some(attributes) => parse_document(key, &attributes)?,
            None => AttributesV2::new(),
        };

        let key = root_key(CONSOLIDATED_METADATA_V2_KEY)?;
        let consolidated_metadata = match storage.get(&key)? {
            Some(consolidated) => Some(parse_document(key, &consolidated)?),
            None => {
                log::warn!("no consolidated metadata found, listing the store for arrays");
                None
            }
        };

        Ok(Self {
            storage,
            metadata,
            attributes,
            consolidated_metadata,
        })
    }

    /// Return the names of the arrays which are direct children of the group, in lexicographic order.
    ///
    /// Nested groups are skipped.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    pub fn array_names(&self) -> Result<Vec<String>, StorageError> {
        if let Some(consolidated_metadata) = &self.consolidated_metadata {
            let mut names = consolidated_metadata.child_array_names();
            names.sort();
            return Ok(names);
        }

        let mut names = Vec::new();
        for child in discover_children(&self.storage, &StorePrefix::root())? {
            let name = child.as_str().trim_end_matches('/');
            if self
                .storage
                .size_key(&StoreKey::new(format!("{name}/{ARRAY_METADATA_V2_KEY}"))?)?
                .is_some()
            {
                names.push(name.to_string());
            } else if self
                .storage
                .size_key(&StoreKey::new(format!("{name}/{GROUP_METADATA_V2_KEY}"))?)?
                .is_some()
            {
                log::debug!("skipping nested group `{name}`");
            }
        }
        names.sort();
        Ok(names)
    }

    /// Return the metadata and attributes of the array `name`, a direct child of the group.
    ///
    /// The documents are taken from the consolidated metadata if the group has any.
    /// Unlike [`array`](Group::array), this succeeds for arrays with an unsupported data type or codec.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the array does not exist, or there is a storage error or any metadata is invalid.
    pub fn array_documents(
        &self,
        name: &str,
    ) -> Result<(ArrayMetadataV2, AttributesV2), ArrayCreateError> {
        let Some(consolidated_metadata) = &self.consolidated_metadata else {
            return retrieve_array_documents(&*self.storage, name);
        };
        let invalid = |document: &str, err: serde_json::Error| -> ArrayCreateError {
            match StoreKey::new(format!("{name}/{document}")) {
                Ok(key) => StorageError::InvalidMetadata(key, err.to_string()).into(),
                Err(err) => StorageError::from(err).into(),
            }
        };
        let metadata = consolidated_metadata
            .array_metadata(name)
            .map_err(|err| invalid(ARRAY_METADATA_V2_KEY, err))?
            .ok_or(ArrayCreateError::MissingMetadata)?;
        let attributes = consolidated_metadata
            .attributes(name)
            .map_err(|err| invalid(ATTRIBUTES_V2_KEY, err))?
            .unwrap_or_default();
        Ok((metadata, attributes))
    }

    /// Open the array `name`, a direct child of the group.
    ///
    /// Metadata is taken from the consolidated metadata if the group has any.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the array does not exist, or there is a storage error or any metadata is invalid.
    pub fn array(&self, name: &str) -> Result<Array<TStorage>, ArrayCreateError> {
        let (metadata, attributes) = self.array_documents(name)?;
        Array::new_with_metadata(self.storage.clone(), name, metadata, attributes)
    }

    /// Return an iterator over the arrays which are direct children of the group, in lexicographic order of name.
    ///
    /// Each item pairs an array name with the array, which is opened as the iterator advances.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the arrays cannot be enumerated.
    pub fn arrays(
        &self,
    ) -> Result<
        impl Iterator<Item = (String, Result<Array<TStorage>, ArrayCreateError>)> + '_,
        StorageError,
    > {
        Ok(self.array_names()?.into_iter().map(move |name| {
            let array = self.array(&name);
            (name, array)
        }))
    }
}

impl<TStorage: ?Sized + WritableStorageTraits + 'static> Group<TStorage> {
    /// Create a new empty group at the root of `storage`.
    ///
    /// Anything already in `storage` is erased and `.zgroup` is written.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    pub fn create(storage: Arc<TStorage>) -> Result<Self, StorageError> {
        storage.erase_prefix(&StorePrefix::root())?;
        let metadata = GroupMetadataV2::new();
        let key = root_key(GROUP_METADATA_V2_KEY)?;
        let json = serde_json::to_vec_pretty(&metadata)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        storage.set(&key, json.into())?;
        Ok(Self {
            storage,
            metadata,
            attributes: AttributesV2::new(),
            consolidated_metadata: None,
        })
    }

    /// Set the group attributes and write them to `.zattrs`.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store.
    pub fn store_attributes(&mut self, attributes: AttributesV2) -> Result<(), StorageError> {
        let key = root_key(ATTRIBUTES_V2_KEY)?;
        let json = serde_json::to_vec_pretty(&attributes)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        self.storage.set(&key, json.into())?;
        self.attributes = attributes;
        Ok(())
    }
}

impl<TStorage: ?Sized + ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits + 'static>
    Group<TStorage>
{
    /// Consolidate the metadata of the hierarchy into `.zmetadata`.
    ///
    /// Every `.zgroup`, `.zarray` and `.zattrs` document in the store is gathered under its key.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying error with the store or a document is not valid JSON.
    pub fn consolidate_metadata(&mut self) -> Result<&ConsolidatedMetadataV2, StorageError> {
        let mut consolidated_metadata = ConsolidatedMetadataV2::new();
        for key in self.storage.list()? {
            if !matches!(
                key.name(),
                GROUP_METADATA_V2_KEY | ARRAY_METADATA_V2_KEY | ATTRIBUTES_V2_KEY
            ) {
                continue;
            }
            let Some(document) = self.storage.get(&key)? else {
                continue;
            };
            let document: serde_json::Value = parse_document(key.clone(), &document)?;
            consolidated_metadata.insert(key.as_str(), document);
        }

        let key = root_key(CONSOLIDATED_METADATA_V2_KEY)?;
        let json = serde_json::to_vec_pretty(&consolidated_metadata)
            .map_err(|err| StorageError::InvalidMetadata(key.clone(), err.to_string()))?;
        self.storage.set(&key, Bytes::from(json))?;
        Ok(self.consolidated_metadata.insert(consolidated_metadata))
    }
}

#[cfg(test)]
mod tests {
    use timeslice_storage::store::MemoryStore;

    use super::*;
    use crate::array::{ArrayMetadataV2, AttributesV2};

    fn write_array(store: &Arc<MemoryStore>, name: &str) -> Result<(), Box<dyn std::error::Error>> {
        let metadata: ArrayMetadataV2 = serde_json::from_str(
            r#"{"chunks":[2],"compressor":null,"dtype":"<i4","fill_value":0,"filters":null,"order":"C","shape":[2],"zarr_format":2}"#,
        )?;
        let mut attributes = AttributesV2::new();
        attributes.insert("long_name".to_string(), name.into());
        Array::new_with_metadata(store.clone(), name, metadata, attributes)?.store_metadata()?;
        Ok(())
    }

    #[test]
    fn group_create_consolidate_open() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        store.set(&"stale".try_into()?, Bytes::from_static(b"x"))?;
        let mut group = Group::create(store.clone())?;
        assert!(store.get(&"stale".try_into()?)?.is_none());
        write_array(&store, "b")?;
        write_array(&store, "a")?;
        store.set(&"nested/.zgroup".try_into()?, Bytes::from_static(br#"{"zarr_format":2}"#))?;
        write_array(&store, "nested/c")?;

        let consolidated = group.consolidate_metadata()?;
        assert!(consolidated.metadata.contains_key("nested/c/.zarray"));
        assert!(consolidated.metadata.contains_key(".zgroup"));

        let group = Group::open(store.clone())?;
        assert!(group.consolidated_metadata().is_some());
        assert_eq!(group.array_names()?, vec!["a", "b"]);
        let (names, arrays): (Vec<_>, Vec<_>) = group.arrays()?.unzip();
        assert_eq!(names, vec!["a", "b"]);
        let arrays = arrays.into_iter().collect::<Result<Vec<_>, _>>()?;
        assert_eq!(arrays[1].attributes()["long_name"], "b");
        assert!(matches!(
            group.array("missing"),
            Err(ArrayCreateError::MissingMetadata)
        ));
        Ok(())
    }

    #[test]
    fn group_open_without_consolidated_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let _group = Group::create(store.clone())?;
        write_array(&store, "temp")?;
        write_array(&store, "time")?;
        store.set(&"nested/.zgroup".try_into()?, Bytes::from_static(br#"{"zarr_format":2}"#))?;
        store.set(&"__private/.zarray".try_into()?, Bytes::from_static(b"{}"))?;

        testing_logger::setup();
        let group = Group::open(store)?;
        testing_logger::validate(|captured_logs| {
            assert_eq!(captured_logs.len(), 1);
            assert_eq!(
                captured_logs[0].body,
                "no consolidated metadata found, listing the store for arrays"
            );
            assert_eq!(captured_logs[0].level, log::Level::Warn);
        });
        assert!(group.consolidated_metadata().is_none());
        assert_eq!(group.array_names()?, vec!["temp", "time"]);
        assert_eq!(group.array("time")?.shape(), &[2]);
        Ok(())
    }

    #[test]
    fn group_array_documents_unsupported_codec() -> Result<(), Box<dyn std::error::Error>> {
        let store = Arc::new(MemoryStore::new());
        let mut group = Group::create(store.clone())?;
        store.set(
            &"orography/.zarray".try_into()?,
            Bytes::from_static(br#"{"chunks":[2],"compressor":{"id":"lz4","acceleration":1},"dtype":"<f4","fill_value":null,"filters":null,"order":"C","shape":[2],"zarr_format":2}"#),
        )?;
        store.set(
            &"orography/.zattrs".try_into()?,
            Bytes::from_static(br#"{"_ARRAY_DIMENSIONS":["x"]}"#),
        )?;

        let (metadata, attributes) = group.array_documents("orography")?;
        assert_eq!(metadata.shape, vec![2]);
        assert_eq!(attributes["_ARRAY_DIMENSIONS"][0], "x");
        assert!(matches!(
            group.array("orography"),
            Err(ArrayCreateError::CodecsCreateError(_))
        ));

        group.consolidate_metadata()?;
        let group = Group::open(store)?;
        assert_eq!(group.array_documents("orography")?.0, metadata);
        Ok(())
    }

    #[test]
    fn group_open_missing() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            Group::open(store),
            Err(GroupCreateError::MissingMetadata)
        ));
    }
}
