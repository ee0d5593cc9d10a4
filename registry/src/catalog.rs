use crate::instance::{InstanceDocument, ServiceInstance};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// All instances registered under one service, in registration order.
/// Registration order is selection order: the first instance matching a
/// selection mode wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub name: String,
    pub instances: Vec<ServiceInstance>,
}

impl Application {
    fn from_document(doc: ApplicationDocument) -> Self {
        let instances = doc
            .instance
            .into_iter()
            .map(|instance| ServiceInstance::from_document(&doc.name, instance))
            .collect();
        Application {
            name: doc.name,
            instances,
        }
    }

    fn to_document(&self) -> ApplicationDocument {
        ApplicationDocument {
            name: self.name.clone(),
            instance: self.instances.iter().map(|i| i.to_document()).collect(),
        }
    }

    pub fn select(&self, mode: SelectionMode<'_>) -> Option<&ServiceInstance> {
        select(&self.instances, mode)
    }
}

/// A point-in-time view of the registry's full catalog, keyed by upper-cased
/// service id in response order. Built fresh per query; never cached or
/// merged across endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    applications: IndexMap<String, Application>,
}

impl Catalog {
    pub fn get(&self, service_id: &str) -> Option<&Application> {
        self.applications.get(&service_id.to_uppercase())
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.applications.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }

    /// Re-encode into the registry's wire shape.
    pub fn to_wire_json(&self) -> String {
        let doc = CatalogWrapper {
            applications: ApplicationsDocument {
                application: self.applications.values().map(|a| a.to_document()).collect(),
            },
        };
        // A document assembled from parsed data always serializes.
        serde_json::to_string(&doc).unwrap_or_default()
    }
}

/// Closed set of instance-selection modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode<'a> {
    /// The instance registered directly under its own service id.
    Primary,
    /// A peer gateway advertising the given tenant id as an additional
    /// registration.
    AdditionalForTenant(&'a str),
}

impl SelectionMode<'_> {
    fn matches(&self, instance: &ServiceInstance) -> bool {
        match self {
            SelectionMode::Primary => instance.is_primary(),
            SelectionMode::AdditionalForTenant(tenant_id) => {
                instance.is_additional() && instance.has_tenant_id(tenant_id)
            }
        }
    }
}

/// First instance in registration order matching the selection mode.
pub fn select<'a>(
    instances: &'a [ServiceInstance],
    mode: SelectionMode<'_>,
) -> Option<&'a ServiceInstance> {
    instances.iter().find(|instance| mode.matches(instance))
}

/// Decode a single-application registry payload. A malformed payload is
/// logged and treated as "no data"; it never propagates.
pub fn parse_application(body: &str) -> Option<Application> {
    match serde_json::from_str::<ApplicationWrapper>(body) {
        Ok(doc) => Some(Application::from_document(doc.application)),
        Err(err) => {
            tracing::debug!(error = %err, "could not decode application payload");
            None
        }
    }
}

/// Decode a full-catalog registry payload. A malformed payload is reported
/// and treated as an absent snapshot; the endpoint still counts as having
/// answered.
pub fn parse_catalog(body: &str) -> Option<Catalog> {
    match serde_json::from_str::<CatalogWrapper>(body) {
        Ok(doc) => {
            let mut applications = IndexMap::new();
            for app_doc in doc.applications.application {
                let application = Application::from_document(app_doc);
                applications.insert(application.name.to_uppercase(), application);
            }
            Some(Catalog { applications })
        }
        Err(err) => {
            tracing::error!(error = %err, "could not decode registry catalog payload");
            None
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ApplicationWrapper {
    application: ApplicationDocument,
}

#[derive(Serialize, Deserialize)]
struct ApplicationDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    instance: Vec<InstanceDocument>,
}

#[derive(Serialize, Deserialize)]
struct CatalogWrapper {
    applications: ApplicationsDocument,
}

#[derive(Serialize, Deserialize)]
struct ApplicationsDocument {
    #[serde(default)]
    application: Vec<ApplicationDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::RegistrationType;
    use serde_json::json;

    fn instance_json(app: &str, id: &str, metadata: serde_json::Value) -> serde_json::Value {
        json!({
            "instanceId": id,
            "app": app,
            "hostName": "localhost",
            "ipAddr": "127.0.0.1",
            "status": "UP",
            "port": {"$": 8080, "@enabled": "true"},
            "metadata": metadata,
        })
    }

    fn application_body(app: &str, instances: Vec<serde_json::Value>) -> String {
        json!({"application": {"name": app.to_uppercase(), "instance": instances}}).to_string()
    }

    #[test]
    fn parses_single_application() {
        let body = application_body(
            "backend",
            vec![instance_json("BACKEND", "backend:localhost:8080", json!({}))],
        );
        let application = parse_application(&body).unwrap();
        assert_eq!(application.name, "BACKEND");
        assert_eq!(application.instances.len(), 1);
        assert_eq!(application.instances[0].instance_id, "backend:localhost:8080");
        assert_eq!(application.instances[0].port, Some(8080));
    }

    #[test]
    fn tolerates_unknown_fields() {
        let body = json!({
            "application": {
                "name": "BACKEND",
                "sizeHint": 3,
                "instance": [{
                    "instanceId": "backend:1",
                    "app": "BACKEND",
                    "status": "UP",
                    "leaseInfo": {"renewalIntervalInSecs": 30},
                    "metadata": {},
                }],
            }
        })
        .to_string();
        let application = parse_application(&body).unwrap();
        assert_eq!(application.instances.len(), 1);
    }

    #[test]
    fn malformed_application_payload_is_no_data() {
        assert!(parse_application("UNPARSABLE_JSON").is_none());
        assert!(parse_application("").is_none());
    }

    #[test]
    fn selection_is_first_match_in_registration_order() {
        let body = application_body(
            "backend",
            vec![
                instance_json("BACKEND", "backend:1", json!({})),
                instance_json("BACKEND", "backend:2", json!({})),
            ],
        );
        let application = parse_application(&body).unwrap();
        let selected = application.select(SelectionMode::Primary).unwrap();
        assert_eq!(selected.instance_id, "backend:1");
    }

    #[test]
    fn unrecognized_registration_is_excluded_from_both_modes() {
        let body = application_body(
            "gateway",
            vec![instance_json(
                "GATEWAY",
                "gateway:1",
                json!({
                    "apiml.registrationType": "tertiary",
                    "apiml.service.apimlId": "tenant1",
                }),
            )],
        );
        let application = parse_application(&body).unwrap();
        assert_eq!(
            application.instances[0].registration_type,
            RegistrationType::Unrecognized
        );
        assert!(application.select(SelectionMode::Primary).is_none());
        assert!(
            application
                .select(SelectionMode::AdditionalForTenant("tenant1"))
                .is_none()
        );
    }

    #[test]
    fn tenant_selection_requires_both_tenant_and_additional() {
        let body = application_body(
            "gateway",
            vec![
                instance_json(
                    "GATEWAY",
                    "central:1",
                    json!({
                        "apiml.registrationType": "primary",
                        "apiml.service.apimlId": "tenant1",
                    }),
                ),
                instance_json(
                    "GATEWAY",
                    "domain:1",
                    json!({
                        "apiml.registrationType": "additional",
                        "apiml.service.apimlId": "tenant1",
                    }),
                ),
            ],
        );
        let application = parse_application(&body).unwrap();
        let selected = application
            .select(SelectionMode::AdditionalForTenant("tenant1"))
            .unwrap();
        assert_eq!(selected.instance_id, "domain:1");
    }

    #[test]
    fn parses_full_catalog_preserving_order() {
        let body = json!({
            "applications": {
                "application": [
                    {"name": "GATEWAY", "instance": [instance_json("GATEWAY", "gateway:1", json!({}))]},
                    {"name": "BACKEND", "instance": [instance_json("BACKEND", "backend:1", json!({}))]},
                ],
            }
        })
        .to_string();
        let catalog = parse_catalog(&body).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.service_ids().collect::<Vec<_>>(),
            vec!["GATEWAY", "BACKEND"]
        );
        assert!(catalog.get("backend").is_some(), "lookup is case-insensitive");
    }

    #[test]
    fn malformed_catalog_payload_is_absent() {
        assert!(parse_catalog("UNPARSABLE_JSON").is_none());
    }

    #[test]
    fn catalog_round_trip_keeps_service_ids() {
        let body = json!({
            "applications": {
                "application": [
                    {"name": "GATEWAY", "instance": [instance_json("GATEWAY", "gateway:1", json!({"apiml.service.apimlId": "central"}))]},
                    {"name": "BACKEND", "instance": [instance_json("BACKEND", "backend:1", json!({}))]},
                    {"name": "EMPTY", "instance": []},
                ],
            }
        })
        .to_string();
        let catalog = parse_catalog(&body).unwrap();
        let reparsed = parse_catalog(&catalog.to_wire_json()).unwrap();
        assert_eq!(
            catalog.service_ids().collect::<Vec<_>>(),
            reparsed.service_ids().collect::<Vec<_>>()
        );
        assert_eq!(catalog, reparsed);
    }
}
