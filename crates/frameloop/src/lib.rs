//! Frame scheduling and driver glue for the shader sandbox.
//!
//! The crate owns everything that happens per frame rather than per
//! compilation: the pause-aware [`Clock`], the before/after-render
//! [`Hooks`], the [`RenderDriver`] contract a GPU backend implements, and
//! the [`Session`] that wires those pieces to the preprocessor's registries.
//!
//! ```text
//! host frame loop ──▶ Session::frame(now)
//!                         │ Clock::frame gate + snapshot
//!                         ▼
//!              before Hooks ─▶ uniform uploads ─▶ RenderDriver::draw ─▶ after Hooks
//!                         │ any fault
//!                         ▼
//!                  error callback (frame skipped, state kept)
//! ```

mod clock;
mod driver;
mod hooks;

pub use clock::{Clock, ClockState};
pub use driver::{HeadlessDriver, RenderDriver, Session, VERTEX_GL1, VERTEX_GL2};
pub use hooks::{HookId, HookSignal, Hooks};
