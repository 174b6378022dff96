//! External directory boundary.
//!
//! The directory owns group resources ("roles") and their membership
//! lists. The concrete implementation in production is the Discord REST
//! API; the core only sees this trait, so the reconciliation algorithm is
//! testable against [`InMemoryDirectory`].
//!
//! Every operation may fail independently. The core treats each failure
//! as local: removal failures are logged and reconciliation proceeds,
//! while a failed tier assignment is surfaced with the partial progress
//! attached (see the reconciler).

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::types::{ResourceId, UserId};

/// Error type for directory operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    /// The referenced resource does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),
    /// The directory rejected the request (permissions, hierarchy, ...).
    #[error("directory rejected the request: {0}")]
    Rejected(String),
    /// The directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Boundary to the external system that owns roles.
///
/// Implementations must be safe to call concurrently for different users.
/// Timeout and retry policy belong to the implementation; the core only
/// observes success or failure per call.
#[async_trait]
pub trait DirectoryAdapter: Send + Sync {
    /// Create a named, colored group resource and return its id.
    async fn create_resource(&self, name: &str, color: u32) -> Result<ResourceId, DirectoryError>;

    /// Delete a group resource.
    async fn delete_resource(&self, id: &ResourceId) -> Result<(), DirectoryError>;

    /// List every resource the user is currently a member of.
    async fn list_membership(&self, user: &UserId) -> Result<BTreeSet<ResourceId>, DirectoryError>;

    /// Add the user to a resource's membership list.
    async fn add_membership(&self, user: &UserId, id: &ResourceId) -> Result<(), DirectoryError>;

    /// Remove the user from each listed resource. Ids the user does not
    /// hold are ignored.
    async fn remove_membership(&self, user: &UserId, ids: &[ResourceId]) -> Result<(), DirectoryError>;
}

/// A resource held by the in-memory directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryResource {
    /// Display name of the resource.
    pub name: String,
    /// RGB color of the resource.
    pub color: u32,
}

#[derive(Debug, Default)]
struct DirectoryState {
    resources: BTreeMap<ResourceId, DirectoryResource>,
    memberships: BTreeMap<UserId, BTreeSet<ResourceId>>,
}

/// In-memory directory for testing and local development.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryDirectory {
    /// Create a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resource by id.
    pub fn resource(&self, id: &ResourceId) -> Option<DirectoryResource> {
        self.state.lock().resources.get(id).cloned()
    }

    /// Number of live resources.
    pub fn num_resources(&self) -> usize {
        self.state.lock().resources.len()
    }

    /// Memberships a user currently holds (synchronous test accessor).
    pub fn memberships_of(&self, user: &UserId) -> BTreeSet<ResourceId> {
        self.state
            .lock()
            .memberships
            .get(user)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DirectoryAdapter for InMemoryDirectory {
    async fn create_resource(&self, name: &str, color: u32) -> Result<ResourceId, DirectoryError> {
        let id = ResourceId::new(Uuid::new_v4().to_string());
        self.state.lock().resources.insert(
            id.clone(),
            DirectoryResource {
                name: name.to_string(),
                color,
            },
        );
        Ok(id)
    }

    async fn delete_resource(&self, id: &ResourceId) -> Result<(), DirectoryError> {
        let mut state = self.state.lock();
        if state.resources.remove(id).is_none() {
            return Err(DirectoryError::ResourceNotFound(id.clone()));
        }
        // Deleting a resource also drops it from every membership list.
        for members in state.memberships.values_mut() {
            members.remove(id);
        }
        Ok(())
    }

    async fn list_membership(&self, user: &UserId) -> Result<BTreeSet<ResourceId>, DirectoryError> {
        Ok(self
            .state
            .lock()
            .memberships
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_membership(&self, user: &UserId, id: &ResourceId) -> Result<(), DirectoryError> {
        let mut state = self.state.lock();
        if !state.resources.contains_key(id) {
            return Err(DirectoryError::ResourceNotFound(id.clone()));
        }
        state
            .memberships
            .entry(user.clone())
            .or_default()
            .insert(id.clone());
        Ok(())
    }

    async fn remove_membership(&self, user: &UserId, ids: &[ResourceId]) -> Result<(), DirectoryError> {
        let mut state = self.state.lock();
        if let Some(members) = state.memberships.get_mut(user) {
            for id in ids {
                members.remove(id);
            }
        }
        Ok(())
    }
}
