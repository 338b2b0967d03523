//! GetEndpoints handler (§4.F "GetEndpoints").

use chrono::Utc;
use ua_proto::{ApplicationDescription, EndpointDescription, GetEndpointsRequest, GetEndpointsResponse, MessageSecurityMode, ResponseHeader};

/// The wire profile URI for binary UA-TCP; if a non-empty requested list
/// omits it, `GetEndpoints` returns zero endpoints (§4.F).
pub const BINARY_UA_TCP_PROFILE_URI: &str = "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecurityPolicy {
    None,
    Basic256,
    Basic256Sha256,
}

impl SecurityPolicy {
    /// `policyWeight`: `2` for Basic256Sha256, `1` for Basic256, `0`
    /// otherwise (§4.F).
    fn weight(&self) -> u8 {
        match self {
            SecurityPolicy::Basic256Sha256 => 2,
            SecurityPolicy::Basic256 => 1,
            SecurityPolicy::None => 0,
        }
    }

    fn uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            SecurityPolicy::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            SecurityPolicy::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
        }
    }
}

/// One enabled security mode, used as a mask bit (§4.F).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeMask {
    pub none: bool,
    pub sign: bool,
    pub sign_and_encrypt: bool,
}

impl ModeMask {
    pub const ALL: ModeMask = ModeMask { none: true, sign: true, sign_and_encrypt: true };
}

/// The server-wide endpoint configuration this handler reads from (an
/// external collaborator populated by the XML loader, per §6).
pub struct EndpointConfig {
    pub endpoint_url: String,
    pub application_uri: String,
    pub product_uri: String,
    pub application_name: ua_core::LocalizedText,
    pub discovery_urls: Vec<String>,
    pub security_policies: Vec<(SecurityPolicy, ModeMask)>,
}

/// Whether this call is answering a `CreateSession`'s embedded discovery or
/// a standalone `GetEndpoints` (§4.F: only the latter returns the full
/// application description with `DiscoveryUrls`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointsContext {
    CreateSession,
    GetEndpoints,
}

pub fn handle_get_endpoints(
    config: &EndpointConfig,
    context: EndpointsContext,
    request: &GetEndpointsRequest,
) -> GetEndpointsResponse {
    let now = Utc::now();

    if !request.profile_uris.is_empty() && !request.profile_uris.iter().any(|u| u == BINARY_UA_TCP_PROFILE_URI) {
        return GetEndpointsResponse { header: ResponseHeader::ok(&request.header, now), endpoints: Vec::new() };
    }

    let application = match context {
        EndpointsContext::CreateSession => ApplicationDescription {
            application_uri: config.application_uri.clone(),
            product_uri: String::new(),
            application_name: ua_core::LocalizedText::default(),
            discovery_urls: Vec::new(),
        },
        EndpointsContext::GetEndpoints => ApplicationDescription {
            application_uri: config.application_uri.clone(),
            product_uri: config.product_uri.clone(),
            application_name: config.application_name.clone(),
            discovery_urls: if config.discovery_urls.is_empty() {
                vec![config.endpoint_url.clone()]
            } else {
                config.discovery_urls.clone()
            },
        },
    };

    let mut endpoints = Vec::new();
    for (policy, modes) in &config.security_policies {
        let weight = policy.weight();
        if modes.none {
            endpoints.push(endpoint(config, &application, *policy, MessageSecurityMode::None, 0));
        }
        if modes.sign {
            endpoints.push(endpoint(config, &application, *policy, MessageSecurityMode::Sign, weight));
        }
        if modes.sign_and_encrypt {
            endpoints.push(endpoint(config, &application, *policy, MessageSecurityMode::SignAndEncrypt, 2 * weight));
        }
    }

    GetEndpointsResponse { header: ResponseHeader::ok(&request.header, now), endpoints }
}

fn endpoint(
    config: &EndpointConfig,
    application: &ApplicationDescription,
    policy: SecurityPolicy,
    mode: MessageSecurityMode,
    security_level: u8,
) -> EndpointDescription {
    EndpointDescription {
        endpoint_url: config.endpoint_url.clone(),
        server: application.clone(),
        security_policy_uri: policy.uri().to_string(),
        security_mode: mode,
        security_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ua_proto::RequestHeader;

    fn sample_config() -> EndpointConfig {
        EndpointConfig {
            endpoint_url: "opc.tcp://localhost:4840".into(),
            application_uri: "urn:test:server".into(),
            product_uri: "urn:test:product".into(),
            application_name: ua_core::LocalizedText::new("en", "Test Server"),
            discovery_urls: Vec::new(),
            security_policies: vec![(SecurityPolicy::Basic256Sha256, ModeMask::ALL)],
        }
    }

    #[test]
    fn missing_binary_profile_uri_returns_zero_endpoints_ok() {
        let config = sample_config();
        let request = GetEndpointsRequest {
            header: RequestHeader::dummy(Utc::now()),
            endpoint_url: config.endpoint_url.clone(),
            profile_uris: vec!["http://example.com/other-profile".into()],
        };
        let response = handle_get_endpoints(&config, EndpointsContext::GetEndpoints, &request);
        assert!(response.endpoints.is_empty());
        assert_eq!(response.header.service_result, ua_core::StatusCode::Ok);
    }

    #[test]
    fn security_level_doubles_for_sign_and_encrypt() {
        let config = sample_config();
        let request = GetEndpointsRequest {
            header: RequestHeader::dummy(Utc::now()),
            endpoint_url: config.endpoint_url.clone(),
            profile_uris: Vec::new(),
        };
        let response = handle_get_endpoints(&config, EndpointsContext::GetEndpoints, &request);
        let sign_and_encrypt = response
            .endpoints
            .iter()
            .find(|e| e.security_mode == MessageSecurityMode::SignAndEncrypt)
            .unwrap();
        let sign = response.endpoints.iter().find(|e| e.security_mode == MessageSecurityMode::Sign).unwrap();
        assert_eq!(sign_and_encrypt.security_level, 2 * sign.security_level);
    }

    #[test]
    fn create_session_context_omits_discovery_urls() {
        let config = sample_config();
        let request = GetEndpointsRequest {
            header: RequestHeader::dummy(Utc::now()),
            endpoint_url: config.endpoint_url.clone(),
            profile_uris: Vec::new(),
        };
        let response = handle_get_endpoints(&config, EndpointsContext::CreateSession, &request);
        assert!(response.endpoints[0].server.discovery_urls.is_empty());
    }

    #[test]
    fn get_endpoints_context_defaults_discovery_urls_to_endpoint_url() {
        let config = sample_config();
        let request = GetEndpointsRequest {
            header: RequestHeader::dummy(Utc::now()),
            endpoint_url: config.endpoint_url.clone(),
            profile_uris: Vec::new(),
        };
        let response = handle_get_endpoints(&config, EndpointsContext::GetEndpoints, &request);
        assert_eq!(response.endpoints[0].server.discovery_urls, vec![config.endpoint_url.clone()]);
    }
}
