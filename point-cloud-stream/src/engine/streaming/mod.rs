//! Progressive loading of a chunked dataset into a [`PointBuffer`](crate::engine::buffer::PointBuffer).
//!
//! ```text
//!  Viewpoint ──► next_chunk ──► FetchTicket ──► IoTaskPool fetch
//!                    ▲                                │
//!                    └── throttle ◄── complete ◄──────┘
//! ```

/// Bevy resources, events and systems driving a session from IO tasks.
pub mod plugin;
/// Chunk priority and the post-fetch cooldown.
pub mod scheduler;
/// Per-dataset state machine owning the buffer and colour layers.
pub mod session;
