//! Per-joint servo command, status and config records.
//!
//! One trio per joint. Traj writes the command and config records; the
//! servo loop writes status and settings. The `homed`/`input_latch` pair
//! rides in one status record so they move atomically together.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::cell::CommCell;

/// Servo command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ServoCmdType {
    /// Idle; hold the last setpoint.
    #[default]
    Nop = 0,
    /// Reset state machine and clear latched faults.
    Init = 1,
    /// Disable output immediately.
    Abort = 2,
    /// Controlled stop, then disable.
    Halt = 3,
    /// Exit at the next cycle boundary.
    Shutdown = 4,
    /// Track the carried setpoint.
    Servo = 5,
}

impl ServoCmdType {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Nop),
            1 => Some(Self::Init),
            2 => Some(Self::Abort),
            3 => Some(Self::Halt),
            4 => Some(Self::Shutdown),
            5 => Some(Self::Servo),
            _ => None,
        }
    }
}

/// Servo loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServoState {
    #[default]
    Uninit = 0,
    Init = 1,
    Enabled = 2,
    Homing = 3,
    Homed = 4,
    Fault = 5,
    Shutdown = 6,
}

impl ServoState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninit),
            1 => Some(Self::Init),
            2 => Some(Self::Enabled),
            3 => Some(Self::Homing),
            4 => Some(Self::Homed),
            5 => Some(Self::Fault),
            6 => Some(Self::Shutdown),
            _ => None,
        }
    }

    /// True if the loop is tracking setpoints.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Enabled | Self::Homing | Self::Homed)
    }
}

bitflags! {
    /// Latched servo fault flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ServoFaultFlags: u32 {
        /// Following error exceeded its limit.
        const FERROR = 1 << 0;
        /// Position left the travel limits.
        const OVERTRAVEL = 1 << 1;
        /// Homing was requested but the backend cannot home.
        const HOME_FAILED = 1 << 2;
        /// The external interface returned an error.
        const EXT_FAULT = 1 << 3;
    }
}

/// Command record written by traj, read by one servo loop.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct ServoCmdMsg {
    /// Bumped for every distinct command.
    pub serial: u32,
    pub cmd_type: ServoCmdType,
    /// Position setpoint, in the servo's raw coordinates.
    pub setpoint: f64,
    /// Velocity feedforward.
    pub ff_vel: f64,
    /// Acceleration feedforward.
    pub ff_acc: f64,
    /// Request homing on this joint.
    pub home: bool,
    /// Drive enable.
    pub enable: bool,
}

/// Status record written by one servo loop.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct ServoStatMsg {
    /// Serial of the last command acted on, echoed even on rejection.
    pub echo_serial: u32,
    pub state: ServoState,
    /// Bumped every cycle.
    pub heartbeat: u64,
    /// Raw measured position.
    pub input: f64,
    /// Estimated velocity from differenced feedback.
    pub input_vel: f64,
    /// Homing in progress (echo of the command's home request).
    pub homing: bool,
    /// Home condition has been latched. Published in the same record as
    /// `input_latch`, so the pair is atomic.
    pub homed: bool,
    /// Raw position at which the home condition latched.
    pub input_latch: f64,
    /// Following error (setpoint - feedback).
    pub ferror: f64,
    pub faults: ServoFaultFlags,
    /// Measured cycle time [s].
    pub cycle_time: f64,
}

/// Config command variants for one servo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServoCfg {
    Nop,
    CycleTime(f64),
    /// PID and feedforward gains.
    Pid {
        p: f64,
        i: f64,
        d: f64,
        vff: f64,
        aff: f64,
        /// Integrator clamp.
        i_max: f64,
        /// Output clamp, symmetric.
        out_max: f64,
        /// Derivative filter time constant [s].
        tf: f64,
    },
    /// Soft travel limits in raw coordinates.
    Limit { min: f64, max: f64 },
    /// Following-error fault threshold.
    FerrorLimit(f64),
    /// Opaque backend tuning values, passed through to the external
    /// interface.
    Parameters { values: [f64; 8], num: usize },
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self::Nop
    }
}

/// Config record written by traj (or a setup tool), read by one servo.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct ServoCfgMsg {
    pub serial: u32,
    pub cfg: ServoCfg,
}

/// Settings echo written by one servo loop: the configuration actually in
/// effect.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct ServoSetMsg {
    pub echo_serial: u32,
    pub cycle_time: f64,
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub vff: f64,
    pub aff: f64,
    pub i_max: f64,
    pub out_max: f64,
    pub tf: f64,
    pub min_limit: f64,
    pub max_limit: f64,
    pub ferror_limit: f64,
}

/// The comm trio for one joint.
pub struct ServoComm {
    pub cmd: CommCell<ServoCmdMsg>,
    pub stat: CommCell<ServoStatMsg>,
    pub cfg: CommCell<ServoCfgMsg>,
    pub set: CommCell<ServoSetMsg>,
}

impl ServoComm {
    pub fn new() -> Self {
        Self {
            cmd: CommCell::new(ServoCmdMsg::default()),
            stat: CommCell::new(ServoStatMsg::default()),
            cfg: CommCell::new(ServoCfgMsg::default()),
            set: CommCell::new(ServoSetMsg::default()),
        }
    }
}

impl Default for ServoComm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_roundtrip() {
        for v in 0..=6u8 {
            let s = ServoState::from_u8(v).unwrap();
            assert_eq!(s as u8, v);
        }
        assert!(ServoState::from_u8(7).is_none());
    }

    #[test]
    fn cmd_type_roundtrip() {
        for v in 0..=5u8 {
            let c = ServoCmdType::from_u8(v).unwrap();
            assert_eq!(c as u8, v);
        }
        assert!(ServoCmdType::from_u8(6).is_none());
    }

    #[test]
    fn active_states() {
        assert!(!ServoState::Uninit.is_active());
        assert!(!ServoState::Init.is_active());
        assert!(ServoState::Enabled.is_active());
        assert!(ServoState::Homing.is_active());
        assert!(ServoState::Homed.is_active());
        assert!(!ServoState::Fault.is_active());
        assert!(!ServoState::Shutdown.is_active());
    }

    #[test]
    fn comm_trio_roundtrips() {
        let comm = ServoComm::new();
        let cmd = ServoCmdMsg {
            serial: 3,
            cmd_type: ServoCmdType::Servo,
            setpoint: 1.25,
            enable: true,
            ..Default::default()
        };
        comm.cmd.write(&cmd);
        let mut out = ServoCmdMsg::default();
        assert!(comm.cmd.read_into(&mut out));
        assert_eq!(out.serial, 3);
        assert_eq!(out.cmd_type, ServoCmdType::Servo);
        assert_eq!(out.setpoint, 1.25);
    }
}
