//! Auto-ballooning: a per-VM closed loop over the balloon size.
//!
//! Every tick reads the latest snapshot and decides, per VM, whether
//! to inflate (guest pressure above the trigger, applied immediately),
//! deflate (pressure below the trigger, gently and only outside the
//! back-off window), or hold. Resizes flow through the sampling
//! cache's validated `set_memory`.

mod clock;
mod controller;
mod params;

pub use clock::{Clock, SystemClock};
pub use controller::BallooningController;
pub use params::BallooningParams;
