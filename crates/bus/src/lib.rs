//! Redis-backed event bus.
//!
//! The publisher and the subscriber each own one broker connection. Both are
//! constructed without I/O and open their connection in `start()`.

pub mod memory;
pub mod publisher;
pub mod redis_transport;
pub mod router;
pub mod subscriber;
pub mod transport;

pub use publisher::{EventPublisher, NotifySink};
pub use router::{ChannelHandler, EventRouter, RouteOutcome};
pub use subscriber::EventSubscriber;
pub use transport::{Broker, InboundMessage, PublisherConnection, SubscriberConnection};
