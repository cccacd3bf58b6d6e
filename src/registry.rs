//! Registry of known controllers.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use futures::future::join_all;

use crate::config::ControllerConfig;
use crate::controller::{Availability, DeviceController};
use crate::errors::Error;
use crate::identity::DeviceIdentity;
use crate::state::LightState;

type Result<T> = std::result::Result<T, Error>;

/// Controllers keyed by their unique ID.
///
/// Discovery records are merged in with [`DeviceRegistry::upsert`] or
/// [`DeviceRegistry::sync`]. A known device that shows up at a new address
/// keeps its controller, and with it all state.
///
/// # Example
///
/// ```
/// use std::net::Ipv4Addr;
/// use magichome_lights_rs::{ControllerConfig, DeviceIdentity, DeviceRegistry};
///
/// let mut registry = DeviceRegistry::new(ControllerConfig::default());
/// registry.upsert(DeviceIdentity::new("A1", Ipv4Addr::new(10, 0, 0, 2), "")).unwrap();
/// registry.upsert(DeviceIdentity::new("A1", Ipv4Addr::new(10, 0, 0, 7), "")).unwrap();
///
/// assert_eq!(registry.len(), 1);
/// assert_eq!(registry.get("A1").unwrap().identity().ip_address(), Ipv4Addr::new(10, 0, 0, 7));
/// ```
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    config: ControllerConfig,
    devices: HashMap<String, DeviceController>,
}

impl DeviceRegistry {
    pub fn new(config: ControllerConfig) -> Self {
        DeviceRegistry {
            config,
            devices: HashMap::new(),
        }
    }

    /// Add a device, or re-point a known one at its reported address.
    pub fn upsert(&mut self, identity: DeviceIdentity) -> Result<&DeviceController> {
        self.validate_ip(identity.ip_address(), Some(identity.unique_id()))?;
        Ok(self.merge(identity))
    }

    /// Register a controller built by the caller, e.g. with a fixed LED profile.
    ///
    /// Returns the controller it replaces, if any.
    pub fn insert(&mut self, controller: DeviceController) -> Result<Option<DeviceController>> {
        let identity = controller.identity();
        self.validate_ip(identity.ip_address(), Some(identity.unique_id()))?;
        Ok(self
            .devices
            .insert(identity.unique_id().to_string(), controller))
    }

    /// Merge a complete discovery round.
    ///
    /// The round is taken as the current truth, so two devices may swap
    /// addresses within it. Returns the number of newly added devices.
    pub fn sync(&mut self, records: &[DeviceIdentity]) -> Result<usize> {
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.ip_address()) {
                return Err(Error::invalid_ip(&record.ip_address(), "reported twice"));
            }
        }

        let mut added = 0;
        for record in records {
            if !self.devices.contains_key(record.unique_id()) {
                added += 1;
            }
            self.merge(record.clone());
        }
        Ok(added)
    }

    pub fn get(&self, unique_id: &str) -> Option<&DeviceController> {
        self.devices.get(unique_id)
    }

    pub fn remove(&mut self, unique_id: &str) -> Result<DeviceController> {
        self.devices
            .remove(unique_id)
            .ok_or_else(|| Error::DeviceNotFound(unique_id.to_string()))
    }

    /// Unique IDs of all registered devices.
    pub fn list(&self) -> Vec<&str> {
        self.devices.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn availability(&self, unique_id: &str) -> Result<Availability> {
        self.get(unique_id)
            .map(DeviceController::availability)
            .ok_or_else(|| Error::DeviceNotFound(unique_id.to_string()))
    }

    /// Refresh every device concurrently.
    pub async fn refresh_all(&self) -> Vec<(String, Result<LightState>)> {
        join_all(self.devices.iter().map(|(id, controller)| async move {
            (id.clone(), controller.refresh().await)
        }))
        .await
    }

    fn merge(&mut self, identity: DeviceIdentity) -> &DeviceController {
        let config = &self.config;
        self.devices
            .entry(identity.unique_id().to_string())
            .and_modify(|controller| controller.update_ip(identity.ip_address()))
            .or_insert_with(|| DeviceController::new(identity.clone(), None, config.clone()))
    }

    fn validate_ip(&self, ip: Ipv4Addr, exclude_id: Option<&str>) -> Result<()> {
        for (id, known) in &self.devices {
            if Some(id.as_str()) == exclude_id {
                continue;
            }
            if known.identity().ip_address() == ip {
                return Err(Error::invalid_ip(&ip, "already known"));
            }
        }
        Ok(())
    }
}
