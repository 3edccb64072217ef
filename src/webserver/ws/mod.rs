/// Real-time distribution over WebSockets
///
/// ## Architecture
/// - Three typed hubs (dashboard, client-control, logs), each the sole
///   owner of its client set
/// - Per-client bounded send queues; non-blocking enqueue with eviction
///   as the only backpressure policy
/// - Per-recipient redaction on the `new_alert` path
/// - Read/write pump pair per connection with heartbeats and frame
///   coalescing
///
/// ## Key Components
/// - `hub`: membership, broadcast routing, backpressure
/// - `client`: wire pumps and protocol constants
/// - `connection`: upgrade binding and inbound dispatch
/// - `message`: envelope schema helpers
pub mod client;
pub mod connection;
pub mod hub;
pub mod message;

pub use hub::{ClientStats, EventContent, Hub, HubType};
