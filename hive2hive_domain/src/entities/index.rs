// /////////////////////////////////////////////////////////////////////////////
// Hive2Hive RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Profile Index Tree
//!
//! The virtual file hierarchy inside a user profile. Each node is an
//! [`Index`]: a folder owning its children by name, or a file carrying
//! the digest of its latest content. Every node holds its own key pair;
//! the public fingerprint is the node's stable identity and, for files,
//! the location key of the meta-file.
//!
//! ## Ownership Model
//!
//! Folders own their children outright (`BTreeMap<name, Index>`), so the
//! tree is acyclic by construction. There are no parent pointers; a
//! node's path is wherever the walk from the root finds it, and parent
//! context is recovered by walking, never stored. This trades a pointer
//! chase for a lookup and removes an entire class of cycle and
//! staleness bugs from profile mutation.
//!
//! ## Sharing
//!
//! Folders carry a permission set. A permission granted on a folder
//! applies to the whole subtree; `permissions_along` collects the
//! effective set for any path by accumulating grants on the way down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::value_objects::{ContentHash, EncryptionKeyPair, KeyId, UserId};
use crate::H2HError;

/// Access level a share grants to a friend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionType {
    Read,
    Write,
}

/// One friend's access to a shared folder subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPermission {
    user_id: UserId,
    permission: PermissionType,
}

impl UserPermission {
    /// Creates a permission entry
    pub fn new(user_id: UserId, permission: PermissionType) -> Self {
        Self { user_id, permission }
    }

    /// Returns the friend's user id
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the granted access level
    pub fn permission(&self) -> PermissionType {
        self.permission
    }

    /// Returns true when the grant allows writing
    pub fn can_write(&self) -> bool {
        self.permission == PermissionType::Write
    }
}

/// A file node: name, node keys, and the digest of the latest content.
///
/// The public half of `node_keys` addresses the file's meta-file in the
/// DHT; the private half opens it. Both travel only inside the encrypted
/// profile (and inside share grants).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileIndex {
    name: String,
    node_keys: EncryptionKeyPair,
    md5: ContentHash,
}

impl FileIndex {
    /// Creates a file node
    pub fn new(name: impl Into<String>, node_keys: EncryptionKeyPair, md5: ContentHash) -> Self {
        Self {
            name: name.into(),
            node_keys,
            md5,
        }
    }

    /// Returns the file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the node key pair
    pub fn node_keys(&self) -> &EncryptionKeyPair {
        &self.node_keys
    }

    /// Returns the node identity (public fingerprint)
    pub fn id(&self) -> KeyId {
        self.node_keys.id()
    }

    /// Returns the digest of the latest uploaded content
    pub fn md5(&self) -> &ContentHash {
        &self.md5
    }

    /// Replaces the content digest after an update
    pub fn set_md5(&mut self, md5: ContentHash) {
        self.md5 = md5;
    }
}

/// A folder node: name, node keys, owned children, and share grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderIndex {
    name: String,
    node_keys: EncryptionKeyPair,
    children: BTreeMap<String, Index>,
    permissions: Vec<UserPermission>,
}

impl FolderIndex {
    /// Creates an empty folder node
    pub fn new(name: impl Into<String>, node_keys: EncryptionKeyPair) -> Self {
        Self {
            name: name.into(),
            node_keys,
            children: BTreeMap::new(),
            permissions: Vec::new(),
        }
    }

    /// Returns the folder name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the node key pair
    pub fn node_keys(&self) -> &EncryptionKeyPair {
        &self.node_keys
    }

    /// Returns the node identity (public fingerprint)
    pub fn id(&self) -> KeyId {
        self.node_keys.id()
    }

    /// Returns the children, ordered by name
    pub fn children(&self) -> impl Iterator<Item = &Index> {
        self.children.values()
    }

    /// Looks up a direct child by name
    pub fn child(&self, name: &str) -> Option<&Index> {
        self.children.get(name)
    }

    /// Returns the share grants on this folder
    pub fn permissions(&self) -> &[UserPermission] {
        &self.permissions
    }

    /// Adds or replaces a share grant for a friend
    pub fn grant_permission(&mut self, permission: UserPermission) {
        self.permissions.retain(|p| p.user_id() != permission.user_id());
        self.permissions.push(permission);
    }

    /// Removes a friend's share grant, if present
    pub fn revoke_permission(&mut self, user: &UserId) {
        self.permissions.retain(|p| p.user_id() != user);
    }

    /// Inserts a child node.
    ///
    /// # Errors
    /// Returns `H2HError::IllegalFileLocation` when a child with the
    /// same name already exists.
    pub fn insert(&mut self, node: Index) -> Result<(), H2HError> {
        let name = node.name().to_string();
        if self.children.contains_key(&name) {
            return Err(H2HError::IllegalFileLocation(format!(
                "'{}' already exists in folder '{}'",
                name, self.name
            )));
        }
        self.children.insert(name, node);
        Ok(())
    }

    /// Removes and returns a child node.
    ///
    /// # Errors
    /// Returns `H2HError::IllegalFileLocation` when no such child exists.
    pub fn remove(&mut self, name: &str) -> Result<Index, H2HError> {
        self.children.remove(name).ok_or_else(|| {
            H2HError::IllegalFileLocation(format!("'{}' does not exist in folder '{}'", name, self.name))
        })
    }

    /// Resolves a relative path to a node, if present
    pub fn node_at(&self, path: &Path) -> Option<&Index> {
        let mut components = path_components(path);
        let first = components.next()?;
        let mut current = self.children.get(first)?;
        for component in components {
            current = current.as_folder()?.children.get(component)?;
        }
        Some(current)
    }

    /// Resolves a relative path to a mutable node, if present
    pub fn node_at_mut(&mut self, path: &Path) -> Option<&mut Index> {
        let mut components = path_components(path);
        let first = components.next()?;
        let mut current = self.children.get_mut(first)?;
        for component in components {
            current = current.as_folder_mut()?.children.get_mut(component)?;
        }
        Some(current)
    }

    /// Resolves the parent folder of a relative path.
    ///
    /// For a single-component path, the parent is this folder itself.
    pub fn parent_of_mut(&mut self, path: &Path) -> Option<&mut FolderIndex> {
        match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            None => Some(self),
            Some(parent) => self.node_at_mut(parent)?.as_folder_mut(),
        }
    }

    /// Returns the `/`-joined path of the node with the given identity,
    /// if it lives in this subtree
    pub fn path_of(&self, id: &KeyId) -> Option<String> {
        for (name, child) in &self.children {
            if &child.id() == id {
                return Some(name.clone());
            }
            if let Index::Folder(folder) = child {
                if let Some(rest) = folder.path_of(id) {
                    return Some(format!("{}/{}", name, rest));
                }
            }
        }
        None
    }

    /// Searches the subtree for a node by its key identity
    pub fn find_by_id(&self, id: &KeyId) -> Option<&Index> {
        for child in self.children.values() {
            if &child.id() == id {
                return Some(child);
            }
            if let Index::Folder(folder) = child {
                if let Some(found) = folder.find_by_id(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Collects `path → digest` for every file in the subtree.
    ///
    /// Paths are `/`-joined relative to this folder; this is the shape
    /// the logout sidecar persists.
    pub fn digest_map(&self) -> BTreeMap<String, ContentHash> {
        let mut map = BTreeMap::new();
        self.collect_digests("", &mut map);
        map
    }

    fn collect_digests(&self, prefix: &str, map: &mut BTreeMap<String, ContentHash>) {
        for (name, child) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            match child {
                Index::File(file) => {
                    map.insert(path, *file.md5());
                }
                Index::Folder(folder) => folder.collect_digests(&path, map),
            }
        }
    }

    /// Collects the effective share grants along a path, including
    /// grants on this folder itself
    pub fn permissions_along(&self, path: &Path) -> Vec<UserPermission> {
        let mut collected: Vec<UserPermission> = self.permissions.clone();
        let mut current = self;
        for component in path_components(path) {
            match current.children.get(component) {
                Some(Index::Folder(folder)) => {
                    for permission in &folder.permissions {
                        if !collected.iter().any(|p| p.user_id() == permission.user_id()) {
                            collected.push(permission.clone());
                        }
                    }
                    current = folder;
                }
                _ => break,
            }
        }
        collected
    }
}

/// A node of the profile tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Index {
    Folder(FolderIndex),
    File(FileIndex),
}

impl Index {
    /// Returns the node name
    pub fn name(&self) -> &str {
        match self {
            Index::Folder(folder) => folder.name(),
            Index::File(file) => file.name(),
        }
    }

    /// Returns the node identity (public fingerprint)
    pub fn id(&self) -> KeyId {
        match self {
            Index::Folder(folder) => folder.id(),
            Index::File(file) => file.id(),
        }
    }

    /// Returns the node key pair
    pub fn node_keys(&self) -> &EncryptionKeyPair {
        match self {
            Index::Folder(folder) => folder.node_keys(),
            Index::File(file) => file.node_keys(),
        }
    }

    /// Returns true for file nodes
    pub fn is_file(&self) -> bool {
        matches!(self, Index::File(_))
    }

    /// Renames the node; callers re-insert it under the new name
    pub fn rename(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Index::Folder(folder) => folder.name = name,
            Index::File(file) => file.name = name,
        }
    }

    /// Returns the folder view of this node, if it is one
    pub fn as_folder(&self) -> Option<&FolderIndex> {
        match self {
            Index::Folder(folder) => Some(folder),
            Index::File(_) => None,
        }
    }

    /// Returns the mutable folder view of this node, if it is one
    pub fn as_folder_mut(&mut self) -> Option<&mut FolderIndex> {
        match self {
            Index::Folder(folder) => Some(folder),
            Index::File(_) => None,
        }
    }

    /// Returns the file view of this node, if it is one
    pub fn as_file(&self) -> Option<&FileIndex> {
        match self {
            Index::File(file) => Some(file),
            Index::Folder(_) => None,
        }
    }

    /// Returns the mutable file view of this node, if it is one
    pub fn as_file_mut(&mut self) -> Option<&mut FileIndex> {
        match self {
            Index::File(file) => Some(file),
            Index::Folder(_) => None,
        }
    }
}

fn path_components(path: &Path) -> impl Iterator<Item = &str> {
    path.iter().filter_map(|c| c.to_str()).filter(|c| !c.is_empty() && *c != "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{PrivateKey, PublicKey};
    use std::path::PathBuf;

    fn key_pair(seed: u8) -> EncryptionKeyPair {
        EncryptionKeyPair::new(
            PublicKey::from_der(vec![seed; 8]),
            PrivateKey::from_der(vec![seed; 8]),
        )
    }

    fn tree() -> FolderIndex {
        let mut root = FolderIndex::new("", key_pair(0));
        let mut docs = FolderIndex::new("docs", key_pair(1));
        docs.insert(Index::File(FileIndex::new(
            "report.txt",
            key_pair(2),
            ContentHash::of_bytes(b"report"),
        )))
        .unwrap();
        root.insert(Index::Folder(docs)).unwrap();
        root.insert(Index::File(FileIndex::new(
            "notes.md",
            key_pair(3),
            ContentHash::of_bytes(b"notes"),
        )))
        .unwrap();
        root
    }

    /// Tests path resolution through nested folders.
    ///
    /// Validates that:
    /// - Nested files resolve by relative path
    /// - Missing paths resolve to None
    /// - A file component in the middle of a path resolves to None
    #[test]
    fn test_node_resolution() {
        let root = tree();
        assert!(root.node_at(&PathBuf::from("docs/report.txt")).unwrap().is_file());
        assert!(root.node_at(&PathBuf::from("docs")).unwrap().as_folder().is_some());
        assert!(root.node_at(&PathBuf::from("docs/missing.txt")).is_none());
        assert!(root.node_at(&PathBuf::from("notes.md/child")).is_none());
    }

    /// Tests duplicate-name rejection on insert.
    #[test]
    fn test_duplicate_insert_rejected() {
        let mut root = tree();
        let duplicate = Index::File(FileIndex::new("notes.md", key_pair(9), ContentHash::of_bytes(b"x")));
        assert!(matches!(
            root.insert(duplicate),
            Err(H2HError::IllegalFileLocation(_))
        ));
    }

    /// Tests remove-then-insert re-parenting, the move primitive.
    ///
    /// Validates that:
    /// - The node disappears from the source folder
    /// - The node appears in the destination folder
    /// - Node identity (key id) is preserved across the move
    #[test]
    fn test_move_preserves_identity() {
        let mut root = tree();
        let id_before = root.node_at(&PathBuf::from("docs/report.txt")).unwrap().id();

        let node = root
            .node_at_mut(&PathBuf::from("docs"))
            .unwrap()
            .as_folder_mut()
            .unwrap()
            .remove("report.txt")
            .unwrap();
        root.insert(node).unwrap();

        assert!(root.node_at(&PathBuf::from("docs/report.txt")).is_none());
        assert_eq!(root.node_at(&PathBuf::from("report.txt")).unwrap().id(), id_before);
    }

    /// Tests the digest map used by the logout sidecar.
    #[test]
    fn test_digest_map_paths() {
        let map = tree().digest_map();
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("docs/report.txt"));
        assert!(map.contains_key("notes.md"));
    }

    /// Tests lookup by node key identity across the subtree.
    #[test]
    fn test_find_by_id() {
        let root = tree();
        let id = root.node_at(&PathBuf::from("docs/report.txt")).unwrap().id();
        assert_eq!(root.find_by_id(&id).unwrap().name(), "report.txt");
    }

    /// Tests permission accumulation along a shared path.
    ///
    /// Validates that:
    /// - Grants on an ancestor folder apply to descendants
    /// - The same user is not collected twice
    #[test]
    fn test_permissions_along_path() {
        let mut root = tree();
        let bob = UserId::new("bob").unwrap();
        root.node_at_mut(&PathBuf::from("docs"))
            .unwrap()
            .as_folder_mut()
            .unwrap()
            .grant_permission(UserPermission::new(bob.clone(), PermissionType::Write));

        let along = root.permissions_along(&PathBuf::from("docs/report.txt"));
        assert_eq!(along.len(), 1);
        assert_eq!(along[0].user_id(), &bob);
        assert!(along[0].can_write());

        assert!(root.permissions_along(&PathBuf::from("notes.md")).is_empty());
    }
}
