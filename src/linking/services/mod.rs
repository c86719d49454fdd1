//! Service layer for driver registration, linking and event routing.

pub mod agent;
pub mod dispatcher;
pub mod link_index;
pub mod reconciler;
pub mod registry;
pub mod router;

pub use agent::{AgentService, AgentServiceError, AgentServiceResult};
pub use dispatcher::{DispatchError, DispatchSettings, EventDispatcher};
pub use link_index::{
    LinkIndex, LinkIndexError, LinkIndexResult, LinkOutcome, LinkSettings, UnlinkOutcome,
};
pub use reconciler::{ReconcileReport, Reconciler};
pub use registry::{DriverRegistry, DriverRegistryError};
pub use router::EventRouter;
