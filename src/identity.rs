use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Who a controller is, as reported by discovery.
///
/// `unique_id` is stable for the lifetime of the device, the IP address is
/// not.
///
/// ```
/// use std::net::Ipv4Addr;
/// use magichome_lights_rs::DeviceIdentity;
///
/// let identity: DeviceIdentity = serde_json::from_str(
///     r#"{"uniqueId": "600194A1B2C3", "ipAddress": "192.168.1.40", "modelNumber": "AK001-ZJ2145"}"#,
/// ).unwrap();
/// assert_eq!(identity.ip_address(), Ipv4Addr::new(192, 168, 1, 40));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    unique_id: String,
    ip_address: Ipv4Addr,
    #[serde(default)]
    model_number: String,
}

impl DeviceIdentity {
    pub fn new(unique_id: &str, ip_address: Ipv4Addr, model_number: &str) -> Self {
        DeviceIdentity {
            unique_id: unique_id.to_string(),
            ip_address,
            model_number: model_number.to_string(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn ip_address(&self) -> Ipv4Addr {
        self.ip_address
    }

    pub fn model_number(&self) -> &str {
        &self.model_number
    }

    pub(crate) fn set_ip_address(&mut self, ip: Ipv4Addr) {
        self.ip_address = ip;
    }
}
