//! Dashboard state: value classification, the shared display board and the
//! reconciler that keeps it in step with site liveness.

pub mod board;
pub mod classify;
mod reconciler;

pub use board::{DisplayBoard, SiteView};
pub use reconciler::Reconciler;
