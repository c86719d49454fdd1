//! Domain model for agent/protocol linking.
//!
//! Assets, attributes, protocol configurations, connection status and the
//! events that flow through the linking engine. Nothing here performs I/O;
//! drivers, persistence and the asset pipeline sit behind the ports.

mod asset;
mod attribute;
mod compare;
mod configuration;
mod driver_name;
mod error;
mod event;
mod ids;
mod status;

pub use asset::{Asset, AssetType};
pub(crate) use asset::{agent_linked_attributes, protocol_configurations};
pub use attribute::{Attribute, AttributeMeta, LinkedAttribute, VALUE_TIMESTAMP_FIELD};
pub use compare::content_eq_ignoring;
pub use configuration::ProtocolConfiguration;
pub use driver_name::DriverName;
pub use error::{LinkDomainError, ParseConnectionStatusError};
pub use event::{
    AssetChangeEvent, AttributeState, AttributeValueEvent, EventSource, PersistenceCause,
    ProcessingStatus,
};
pub use ids::{AssetId, AttributeRef, OwnerId};
pub use status::{ConnectionStatus, ConnectionStatusChange};
