//! External inventory sources.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::DiscoveryError;

/// A service and the hosts it runs on, as reported by an inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    pub hosts: Vec<String>,
    /// Seconds an observation stays valid.
    pub ttl: f64,
    pub service: String,
}

/// Source of service descriptors, queried once per discovery cycle.
#[async_trait]
pub trait Inventory: Send + Sync + 'static {
    async fn fetch(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError>;
}

/// Inventory backed by a fixed, replaceable list.
#[derive(Debug, Default)]
pub struct StaticInventory {
    descriptors: RwLock<Vec<ServiceDescriptor>>,
}

impl StaticInventory {
    pub fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        Self {
            descriptors: RwLock::new(descriptors),
        }
    }

    /// Replaces the list returned by subsequent fetches.
    pub fn replace(&self, descriptors: Vec<ServiceDescriptor>) {
        *self.descriptors.write() = descriptors;
    }
}

#[async_trait]
impl Inventory for StaticInventory {
    async fn fetch(&self) -> Result<Vec<ServiceDescriptor>, DiscoveryError> {
        Ok(self.descriptors.read().clone())
    }
}
