use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("no registry endpoints configured")]
    NoEndpoints,

    #[error("registry endpoint {0} has incomplete basic-auth credentials")]
    IncompleteCredentials(Url),

    #[error("gateway service id cannot be empty")]
    EmptyGatewayServiceId,
}

fn default_gateway_service_id() -> String {
    "gateway".to_string()
}

/// Registry connectivity configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RegistryConfig {
    /// Ordered registry endpoints. Order defines failover precedence and is
    /// never reordered at runtime.
    pub endpoints: Vec<RegistryEndpoint>,
    /// Well-known service id of the gateway application, the target of the
    /// tenant-alias fallback.
    #[serde(default = "default_gateway_service_id")]
    pub gateway_service_id: String,
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.endpoints.is_empty() {
            return Err(ValidationError::NoEndpoints);
        }
        for endpoint in &self.endpoints {
            if endpoint.username.is_some() != endpoint.password.is_some() {
                return Err(ValidationError::IncompleteCredentials(endpoint.url.clone()));
            }
        }
        if self.gateway_service_id.is_empty() {
            return Err(ValidationError::EmptyGatewayServiceId);
        }
        Ok(())
    }
}

/// One registry endpoint: a base URL and optional basic-auth credentials.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RegistryEndpoint {
    pub url: Url,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl RegistryEndpoint {
    pub fn new(url: Url) -> Self {
        RegistryEndpoint {
            url,
            username: None,
            password: None,
        }
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(url: &str) -> RegistryEndpoint {
        RegistryEndpoint::new(Url::parse(url).unwrap())
    }

    #[test]
    fn valid_config() {
        let config = RegistryConfig {
            endpoints: vec![endpoint("https://ds-1:10011/eureka/")],
            gateway_service_id: "gateway".to_string(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_endpoint_list() {
        let config = RegistryConfig {
            endpoints: vec![],
            gateway_service_id: "gateway".to_string(),
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::NoEndpoints
        ));
    }

    #[test]
    fn rejects_username_without_password() {
        let mut half = endpoint("https://ds-1:10011/eureka/");
        half.username = Some("eureka".to_string());
        let config = RegistryConfig {
            endpoints: vec![half],
            gateway_service_id: "gateway".to_string(),
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::IncompleteCredentials(_)
        ));
    }

    #[test]
    fn gateway_service_id_defaults() {
        let yaml = r#"
endpoints:
    - url: "https://ds-1:10011/eureka/"
"#;
        let config: RegistryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.gateway_service_id, "gateway");
    }
}
