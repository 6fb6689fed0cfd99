//! Request-level facade over the domain services.
//!
//! [`DomainOrchestrator::handle`] takes a [`DomainRequest`], runs it against
//! the caja, inventory or traspaso service, records request metrics and
//! announces committed changes through an [`EventPublisher`].

pub mod orchestrator;
pub mod publisher;
pub mod request;

pub use orchestrator::{DomainOrchestrator, with_store_timeout};
pub use publisher::{DomainNotification, EventPublisher, InMemoryPublisher, TracingPublisher};
pub use request::{DomainRequest, DomainResponse};
