pub mod broadcaster;
pub mod registry;
pub mod sse;
pub mod ws;

pub use broadcaster::Broadcaster;
pub use registry::{ConnectionGuard, ConnectionId, SubscriptionRegistry};
pub use sse::results_sse;
pub use ws::ws_handler;
