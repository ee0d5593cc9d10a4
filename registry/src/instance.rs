use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key carrying the registration type of an instance.
pub const REGISTRATION_TYPE_KEY: &str = "apiml.registrationType";
/// Metadata key carrying the tenant id a peer gateway advertises.
pub const TENANT_ID_KEY: &str = "apiml.service.apimlId";
/// Metadata key letting a service opt out of gateway rate limiting.
pub const APPLY_RATE_LIMITER_KEY: &str = "apiml.gateway.applyRateLimiterFilter";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    #[default]
    #[serde(other)]
    Unknown,
}

/// How an instance registered itself with the registry.
///
/// A plain backend registers as `Primary`. In multi-domain topologies a peer
/// gateway additionally registers under the gateway service id, tagged
/// `Additional`, to advertise the tenant it serves. A registration-type
/// value the registry does not recognize is neither: it is excluded from
/// both selection paths rather than defaulted to primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationType {
    Primary,
    Additional,
    Unrecognized,
}

impl RegistrationType {
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        match metadata.get(REGISTRATION_TYPE_KEY).map(String::as_str) {
            None | Some("primary") => RegistrationType::Primary,
            Some("additional") => RegistrationType::Additional,
            Some(_) => RegistrationType::Unrecognized,
        }
    }

    pub fn is_primary(self) -> bool {
        self == RegistrationType::Primary
    }

    pub fn is_additional(self) -> bool {
        self == RegistrationType::Additional
    }
}

/// One running backend process, as registered with the registry.
///
/// Built from a wire document once at parse time; the metadata-derived
/// fields are never re-read from the map afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInstance {
    /// Canonical service id; compared case-insensitively.
    pub service_id: String,
    pub instance_id: String,
    pub host_name: String,
    pub ip_addr: String,
    pub port: Option<u16>,
    pub secure_port: Option<u16>,
    pub status: InstanceStatus,
    pub registration_type: RegistrationType,
    /// Tenant id advertised via metadata, when present.
    pub tenant_id: Option<String>,
    /// False only when the service explicitly opted out of rate limiting.
    pub apply_rate_limiter: bool,
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub(crate) fn from_document(app_name: &str, doc: InstanceDocument) -> Self {
        let service_id = if doc.app.is_empty() {
            app_name.to_string()
        } else {
            doc.app
        };
        let registration_type = RegistrationType::from_metadata(&doc.metadata);
        let tenant_id = doc.metadata.get(TENANT_ID_KEY).cloned();
        let apply_rate_limiter = doc
            .metadata
            .get(APPLY_RATE_LIMITER_KEY)
            .is_none_or(|value| !value.eq_ignore_ascii_case("false"));

        ServiceInstance {
            service_id,
            instance_id: doc.instance_id,
            host_name: doc.host_name,
            ip_addr: doc.ip_addr,
            port: doc.port.map(|p| p.value),
            secure_port: doc.secure_port.map(|p| p.value),
            status: doc.status,
            registration_type,
            tenant_id,
            apply_rate_limiter,
            metadata: doc.metadata,
        }
    }

    pub(crate) fn to_document(&self) -> InstanceDocument {
        InstanceDocument {
            instance_id: self.instance_id.clone(),
            app: self.service_id.clone(),
            host_name: self.host_name.clone(),
            ip_addr: self.ip_addr.clone(),
            status: self.status,
            port: self.port.map(PortDocument::new),
            secure_port: self.secure_port.map(PortDocument::new),
            metadata: self.metadata.clone(),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.registration_type.is_primary()
    }

    pub fn is_additional(&self) -> bool {
        self.registration_type.is_additional()
    }

    pub fn has_tenant_id(&self, tenant_id: &str) -> bool {
        self.tenant_id
            .as_deref()
            .is_some_and(|id| id.eq_ignore_ascii_case(tenant_id))
    }
}

/// Wire representation of an instance. Unknown fields are ignored.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct InstanceDocument {
    #[serde(rename = "instanceId", default)]
    pub instance_id: String,
    #[serde(default)]
    pub app: String,
    #[serde(rename = "hostName", default)]
    pub host_name: String,
    #[serde(rename = "ipAddr", default)]
    pub ip_addr: String,
    #[serde(default)]
    pub status: InstanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortDocument>,
    #[serde(rename = "securePort", default, skip_serializing_if = "Option::is_none")]
    pub secure_port: Option<PortDocument>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// The registry wraps port numbers in `{"$": 8080, "@enabled": "true"}`.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PortDocument {
    #[serde(rename = "$")]
    pub value: u16,
    #[serde(rename = "@enabled", default = "PortDocument::enabled_default")]
    pub enabled: String,
}

impl PortDocument {
    fn new(value: u16) -> Self {
        PortDocument {
            value,
            enabled: Self::enabled_default(),
        }
    }

    fn enabled_default() -> String {
        "true".to_string()
    }
}
