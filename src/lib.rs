//! Client-side reliable event delivery.
//!
//! Application code enqueues telemetry events; the relay persists unsent
//! events across restarts, delivers them one at a time to a remote endpoint,
//! waits out a randomized cooldown between attempts, and removes an event
//! only once the endpoint confirmed receipt.
//!
//! The transport and the persistence primitive are abstract collaborators
//! ([`transport::Transport`], [`store::SnapshotStore`]); the hosting process
//! drives the lifecycle through [`relay::EventRelay::initialize`],
//! [`relay::EventRelay::track_event`] and [`relay::EventRelay::on_suspend`].

pub mod event;
pub mod queue;
pub mod relay;
pub mod snapshot;
pub mod store;
pub mod transport;

pub use event::{EventCategory, EventRecord};
pub use queue::{DeliveryQueue, QueueError};
pub use relay::{EventRelay, MetricsSnapshot, RelayConfig, RelayError, SchedulerState};
pub use snapshot::SnapshotError;
pub use store::{FileStore, MemoryStore, SnapshotStore, StoreError};
pub use transport::{HttpTransport, Transport, TransportError};
