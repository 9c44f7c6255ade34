//! Service registry and dispatch types
//!
//! Wire shapes for registration, remote descriptors and dispatch results,
//! plus the resolved in-memory forms the engine routes on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Literal endpoint marker for services handled in-process
pub const INTERNAL_ENDPOINT: &str = "internal";

/// Persisted service record, keyed by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: String,
    pub name: String,
    pub endpoint: String,
}

impl ServiceRecord {
    /// Create a new service record
    pub fn new(id: impl Into<String>, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// Structured request format advertised by a service
///
/// Only `keywords` is interpreted. Any other fields a service reports are
/// carried along untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestFormat {
    /// Fast-path keywords, in the order the service declared them
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestFormat {
    /// Build a request format holding only keywords
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            extra: Map::new(),
        }
    }
}

/// How a service endpoint is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Remote service over http(s)
    Http,
    /// In-process local search handler
    Internal,
    /// Anything else; never dispatched
    Unsupported,
}

impl EndpointKind {
    /// Classify an endpoint string by its scheme
    pub fn classify(endpoint: &str) -> Self {
        let endpoint = endpoint.trim();
        let lower = endpoint.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Http
        } else if endpoint.starts_with(INTERNAL_ENDPOINT) {
            Self::Internal
        } else {
            Self::Unsupported
        }
    }
}

/// Trim whitespace and drop trailing slashes from an endpoint
///
/// ```
/// assert_eq!(sdk::types::normalize_endpoint(" http://svc/a/ "), "http://svc/a");
/// assert_eq!(sdk::types::normalize_endpoint("internal"), "internal");
/// ```
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

/// Directory entry: a routable service with its live metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub description: String,
    pub system_prompt: String,
    pub request_format: RequestFormat,
}

impl ServiceDescriptor {
    /// Create a descriptor with empty metadata
    pub fn new(id: impl Into<String>, name: impl Into<String>, endpoint: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            endpoint: normalize_endpoint(endpoint),
            description: String::new(),
            system_prompt: String::new(),
            request_format: RequestFormat::default(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set the fast-path keywords
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_format = RequestFormat::with_keywords(keywords);
        self
    }

    /// Fast-path keywords for this service
    pub fn keywords(&self) -> &[String] {
        &self.request_format.keywords
    }

    /// Endpoint classification
    pub fn kind(&self) -> EndpointKind {
        EndpointKind::classify(&self.endpoint)
    }

    /// The persisted part of this descriptor
    pub fn record(&self) -> ServiceRecord {
        ServiceRecord::new(&self.id, &self.name, &self.endpoint)
    }
}

/// Registration request accepted at the intake boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub request_format: Option<RequestFormat>,
    pub endpoint: String,
}

impl ServiceRegistration {
    /// Resolve optional fields and normalize the endpoint
    pub fn into_descriptor(self) -> ServiceDescriptor {
        ServiceDescriptor {
            id: self.id.trim().to_string(),
            name: self.name.trim().to_string(),
            endpoint: normalize_endpoint(&self.endpoint),
            description: self.description.unwrap_or_default(),
            system_prompt: self.system_prompt.unwrap_or_default(),
            request_format: self.request_format.unwrap_or_default(),
        }
    }
}

/// Descriptor a remote service reports about itself at its root path
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteDescriptor {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub request_format: Option<RequestFormat>,
}

impl RemoteDescriptor {
    /// Bind the remote metadata to the stable registry id
    pub fn into_descriptor(self, id: impl Into<String>) -> ServiceDescriptor {
        ServiceDescriptor {
            id: id.into(),
            name: self.name.trim().to_string(),
            endpoint: normalize_endpoint(&self.endpoint),
            description: self.description.unwrap_or_default(),
            system_prompt: self.system_prompt.unwrap_or_default(),
            request_format: self.request_format.unwrap_or_default(),
        }
    }
}

/// Registration acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub status: String,
    pub total_services: usize,
}

impl RegistrationReceipt {
    /// Receipt for a successful registration
    pub fn registered(total_services: usize) -> Self {
        Self {
            status: "registered".to_string(),
            total_services,
        }
    }
}

/// Dispatch query accepted at the intake boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub prompt: String,
}

/// Result of one dispatch attempt
///
/// Serializes to `{service, response}` on success and `{service, error}` on
/// failure. `service` is `null` when no service was selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DispatchOutcome {
    Success {
        service: Option<String>,
        response: Value,
    },
    Failure {
        service: Option<String>,
        error: String,
    },
}

impl DispatchOutcome {
    /// Successful result
    pub fn success(service: Option<&str>, response: Value) -> Self {
        Self::Success {
            service: service.map(str::to_string),
            response,
        }
    }

    /// Failed result carrying the failure description
    pub fn failure(service: Option<&str>, error: impl ToString) -> Self {
        Self::Failure {
            service: service.map(str::to_string),
            error: error.to_string(),
        }
    }

    /// Name of the service that handled the request, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::Success { service, .. } | Self::Failure { service, .. } => service.as_deref(),
        }
    }

    /// Whether this result carries an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}
