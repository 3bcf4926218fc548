//! The streaming engine.
//!
//! ```text
//! InputController ──┐
//!                   ▼
//! SourceReader → StreamEngine → RenderSession → sink
//!                   ▲                 │
//!                   └──── padding ────┘
//! ```
//!
//! - **StreamEngine**: one synchronous loop that leases, fills and commits chunks
//! - **Padding**: the only backpressure signal; no chunk is leased while the
//!   sink holds a full chunk
//! - **Drain**: after the source is exhausted, waits until the sink is empty

mod engine;
mod progress;

pub use engine::StreamEngine;
pub use progress::{PlaybackState, StreamProgress};
