//! # GPU Object Picking
//!
//! Mouse selection by rendering object ids offscreen and reading back a
//! single pixel.
//!
//! ## Protocol
//!
//! 1. Input calls [`GpuPicker::request_pick`]; the request stays pending.
//! 2. On a frame where [`GpuPicker::should_run_picking`] holds (pending and
//!    nothing in flight) the orchestrator calls [`GpuPicker::encode_pick`],
//!    which records the id pass restricted to the clicked pixel plus the
//!    copies into the readback buffer.
//! 3. After submission, [`GpuPicker::on_submitted`] starts the asynchronous
//!    map. The frame loop keeps rendering while the pick resolves.
//! 4. [`GpuPicker::poll`] returns the decoded result on some later frame;
//!    the caller consumes it and calls [`GpuPicker::complete`] to go idle.
//!
//! Requests made while a pick is in flight are held and run on the first
//! frame after completion, with the most recent coordinates.

pub mod encoding;
pub mod state;
pub mod target;
pub mod service;

pub use encoding::{decode_object_id, encode_object_id, NO_OBJECT};
pub use service::{GpuPicker, PickOutcome};
pub use state::{PickPhase, PickState};
pub use target::PickTarget;
