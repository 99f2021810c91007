// # Result Stores
//
// In-memory holders for accepted results:
// - `BoundedHistory`: newest-first, fixed capacity (push deployments)
// - `LiveSlot`: single current value (poll deployments)

pub mod history;
pub mod live;

pub use history::{Accepted, BoundedHistory};
pub use live::{FetchStats, LiveSlot};
