//! Switchboard SDK
//!
//! Shared library providing the service types, error taxonomy and
//! collaborator traits used by the engine and by embedders.

/// Error types and handling
pub mod errors;

/// Local search collaborator trait
pub mod search;

/// Registry and dispatch types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, SwitchboardErrorExt};
pub use search::LocalSearch;
pub use types::{
    normalize_endpoint, DispatchOutcome, EndpointKind, RegistrationReceipt, RemoteDescriptor,
    RequestFormat, ServiceDescriptor, ServiceRecord, ServiceRegistration, TaskRequest,
    INTERNAL_ENDPOINT,
};
