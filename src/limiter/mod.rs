//! Rate limiting logic and shared-store state management.

mod clock;
mod limiter;
mod memory;
mod policy;
mod redis;
mod store;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use limiter::{Decision, IdentityStats, RateLimiter};
pub use memory::MemoryStore;
pub use policy::Policy;
pub use self::redis::RedisStore;
pub use store::{ActivityStore, Stamp, WindowOutcome};
