//! Session state for the unified agent gateway: the registry of live
//! sessions, their replay/outbound queues and pending-request correlation,
//! and the durable state store that survives a restart.

pub mod outbound;
pub mod pending;
pub mod registry;
pub mod replay;
pub mod session;
pub mod state_store;

pub use outbound::OutboundQueue;
pub use pending::{PendingCorrelator, PendingPermission, PendingRequest};
pub use registry::{SessionHandle, SessionRegistry};
pub use replay::ReplayBuffer;
pub use session::GatewaySessionState;
pub use state_store::StateStore;
