//! Task runtime primitives shared by the sift crates.
//!
//! * [`spawn`] routes work onto the current tokio runtime, or a small shared
//!   fallback runtime when called from plain threads.
//! * [`GenerationClock`] / [`GenerationToken`] scope cancellation to one
//!   generation of work so stale tasks can be cut off as a unit.
//! * [`LatestSlot`] is a latest-wins handoff from synchronous producers to a
//!   single async consumer.
//! * [`JoinCtrl`] lets several callers join one long-lived task.

mod class;
mod join_ctrl;
mod slot;
mod spawn;
mod token;

pub use class::TaskClass;
pub use join_ctrl::JoinCtrl;
pub use slot::{LatestSlot, SlotPush};
pub use spawn::{panic_message, payload_message, spawn};
pub use token::{GenerationClock, GenerationToken};
