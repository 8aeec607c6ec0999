//! Tuning knobs of the ballooning feedback loop.

use std::time::Duration;

use ballast_common::units::GIB;

/// Per-VM ballooning parameters.
///
/// A value record handed to each sub-controller at construction;
/// runtime tuning flows through
/// [`BallooningController::set_params`](crate::BallooningController::set_params),
/// which also clears any active back-off.
#[derive(Debug, Clone, PartialEq)]
pub struct BallooningParams {
    /// Lower bound for the balloon size.
    pub min_actual: u64,
    /// Guest pressure (percent used) above which memory is inflated.
    pub trigger_increase: f64,
    /// Relative inflate step, percent.
    pub increase_by: u32,
    /// Guest pressure below which memory is deflated.
    pub trigger_decrease: f64,
    /// Relative deflate step, percent.
    pub decrease_by: u32,
    /// Cool-down after a resize.
    pub back_off: Duration,
    /// Cool-down applied while a VM is down and right after boot.
    pub boot_back_off: Duration,
}

impl Default for BallooningParams {
    fn default() -> Self {
        Self {
            min_actual: 2 * GIB,
            trigger_increase: 65.0,
            increase_by: 30,
            trigger_decrease: 55.0,
            decrease_by: 10,
            back_off: Duration::from_secs(10),
            boot_back_off: Duration::from_secs(20),
        }
    }
}
