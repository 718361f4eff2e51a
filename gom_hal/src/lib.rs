//! # Go Motion External Interface
//!
//! The contract between the servo loops and the world's sensors and
//! actuators, plus the backends bundled with the controller:
//!
//! - [`sim`]: one closed-form DC motor per joint, a rollover home switch
//!   and cycling test IO; the hardware-free way to run everything.
//! - [`stub`]: a pass-through integrator for pure software tests.
//!
//! Real drivers (interface boards, fieldbus glue) implement
//! [`ExtInterface`] out of tree and register by name the same way.

pub mod dcmotor;
pub mod sim;
pub mod stub;

use gom_math::{GoError, GoResult};

/// The external actuator/sensor contract consumed by the servo loops.
///
/// All positions are raw device coordinates; scaling to joint units is
/// the servo configuration's business. Implementations must be
/// non-blocking: each call is a bounded read-modify-write against
/// device or simulation state.
pub trait ExtInterface: Send + std::fmt::Debug {
    /// Process-wide initialization. Idempotent.
    fn init(&mut self, init_string: &str) -> GoResult<()>;

    /// Release all external resources.
    fn quit(&mut self) -> GoResult<()>;

    /// Initialize one joint for the given cycle time.
    fn joint_init(&mut self, joint: usize, cycle_time: f64) -> GoResult<()>;

    fn joint_enable(&mut self, joint: usize) -> GoResult<()>;

    fn joint_disable(&mut self, joint: usize) -> GoResult<()>;

    fn joint_quit(&mut self, joint: usize) -> GoResult<()>;

    /// Read the raw position.
    fn read_pos(&mut self, joint: usize, pos: &mut f64) -> GoResult<()>;

    /// Pass-through setpoint for externally-servoed joints. Backends
    /// without that mode report `ImplError`.
    fn write_pos(&mut self, joint: usize, pos: f64) -> GoResult<()>;

    /// Closed-loop output: voltage, current or step rate.
    fn write_vel(&mut self, joint: usize, vel: f64) -> GoResult<()>;

    /// Request that the joint's home condition be latched.
    fn joint_home(&mut self, joint: usize) -> GoResult<()>;

    /// Has the home condition been met since the last request?
    fn joint_is_home(&mut self, joint: usize) -> bool;

    /// The raw position latched at the home condition.
    fn joint_home_latch(&mut self, joint: usize, pos: &mut f64) -> GoResult<()>;

    // ── Generic IO ──────────────────────────────────────────────────

    fn num_ain(&self) -> usize;
    fn num_aout(&self) -> usize;
    fn num_din(&self) -> usize;
    fn num_dout(&self) -> usize;

    /// One-shot sample of all analog/digital inputs.
    fn trigger_in(&mut self) -> GoResult<()>;

    fn read_ain(&mut self, index: usize, value: &mut f64) -> GoResult<()>;
    fn write_aout(&mut self, index: usize, value: f64) -> GoResult<()>;
    fn read_din(&mut self, index: usize, value: &mut bool) -> GoResult<()>;
    fn write_dout(&mut self, index: usize, value: bool) -> GoResult<()>;

    /// Opaque driver-specific tuning values.
    fn set_parameters(&mut self, joint: usize, values: &[f64]) -> GoResult<()>;
}

/// Instantiate a registered backend by name.
pub fn select(name: &str) -> GoResult<Box<dyn ExtInterface>> {
    match name {
        sim::NAME => Ok(Box::new(sim::SimInterface::new())),
        stub::NAME => Ok(Box::new(stub::StubInterface::new())),
        _ => Err(GoError::ImplError),
    }
}

/// Names of all bundled backends.
pub fn available() -> &'static [&'static str] {
    &[sim::NAME, stub::NAME]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_by_name() {
        assert!(select("sim").is_ok());
        assert!(select("stub").is_ok());
        assert_eq!(select("s626").unwrap_err(), GoError::ImplError);
    }
}
