//! TOML-mapped configuration.
//!
//! The core consumes already-parsed configuration; these types are the
//! parsed form. Loading and file handling live in the binary crate; here
//! are the shapes and the validation rules.

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use gom_math::{Link, Pose, Rpy};

use crate::consts::{DEFAULT_QUEUE_SIZE, DEFAULT_SERVO_CYCLE_TIME, DEFAULT_TRAJ_CYCLE_TIME, MAX_JOINTS};
use crate::units::Units;

/// A pose written as position plus roll/pitch/yaw, the form used in the
/// config files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PoseCfg {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
}

impl PoseCfg {
    pub fn to_pose(&self) -> Pose {
        Pose {
            tran: gom_math::Cart::new(self.x, self.y, self.z),
            rot: Rpy { r: self.roll, p: self.pitch, y: self.yaw }.to_quat(),
        }
    }
}

/// PID and feedforward gains for one joint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidCfg {
    #[serde(default)]
    pub p: f64,
    #[serde(default)]
    pub i: f64,
    #[serde(default)]
    pub d: f64,
    /// Velocity feedforward.
    #[serde(default)]
    pub vff: f64,
    /// Acceleration feedforward.
    #[serde(default)]
    pub aff: f64,
    /// Integrator clamp.
    #[serde(default = "default_i_max")]
    pub i_max: f64,
    /// Symmetric output clamp.
    #[serde(default = "default_out_max")]
    pub out_max: f64,
    /// Derivative filter time constant [s]; 0 disables the filter.
    #[serde(default)]
    pub tf: f64,
}

fn default_i_max() -> f64 {
    1.0e6
}
fn default_out_max() -> f64 {
    1.0e6
}

impl Default for PidCfg {
    fn default() -> Self {
        Self {
            p: 0.0,
            i: 0.0,
            d: 0.0,
            vff: 0.0,
            aff: 0.0,
            i_max: default_i_max(),
            out_max: default_out_max(),
            tf: 0.0,
        }
    }
}

/// DC-motor parameters for the simulation backend, SI units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotorCfg {
    /// Viscous friction coefficient.
    pub bm: f64,
    /// Armature inductance.
    pub la: f64,
    /// Armature resistance.
    pub ra: f64,
    /// Rotor plus load inertia.
    pub jm: f64,
    /// Torque constant == back-EMF constant.
    pub kb: f64,
    /// Constant load torque.
    #[serde(default)]
    pub tl: f64,
    /// Static friction torque.
    #[serde(default)]
    pub tk: f64,
    /// Sliding friction torque.
    #[serde(default)]
    pub ts: f64,
}

impl Default for MotorCfg {
    fn default() -> Self {
        // Inland Motor BM-3503.
        Self {
            bm: 6.129,
            la: 0.00035,
            ra: 0.028,
            jm: 0.00707,
            kb: 0.414,
            tl: 0.0,
            tk: 0.0,
            ts: 0.0,
        }
    }
}

/// Per-joint configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoSection {
    /// Link geometry, quantity and body data for this joint.
    #[serde(default)]
    pub link: Link,
    /// Nominal home position in traj's homed coordinates.
    #[serde(default)]
    pub home: f64,
    /// Soft travel limits.
    #[serde(default = "default_min_limit")]
    pub min_limit: f64,
    #[serde(default = "default_max_limit")]
    pub max_limit: f64,
    /// Following-error fault threshold; 0 disables the check.
    #[serde(default)]
    pub ferror_limit: f64,
    /// Per-move default maxima.
    #[serde(default = "default_unity")]
    pub max_vel: f64,
    #[serde(default = "default_unity")]
    pub max_acc: f64,
    #[serde(default = "default_unity")]
    pub max_jerk: f64,
    #[serde(default)]
    pub pid: PidCfg,
    /// Simulation motor model, used when the backend is `sim`.
    #[serde(default)]
    pub motor: MotorCfg,
}

fn default_min_limit() -> f64 {
    -1.0e9
}
fn default_max_limit() -> f64 {
    1.0e9
}
fn default_unity() -> f64 {
    1.0
}

impl Default for ServoSection {
    fn default() -> Self {
        Self {
            link: Link::default(),
            home: 0.0,
            min_limit: default_min_limit(),
            max_limit: default_max_limit(),
            ferror_limit: 0.0,
            max_vel: 1.0,
            max_acc: 1.0,
            max_jerk: 1.0,
            pid: PidCfg::default(),
            motor: MotorCfg::default(),
        }
    }
}

/// Coordinated-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajSection {
    #[serde(default = "default_traj_cycle")]
    pub cycle_time: f64,
    #[serde(default = "default_servo_cycle")]
    pub servo_cycle_time: f64,
    /// Kinematics implementation name, resolved by the factory.
    #[serde(default = "default_kinematics")]
    pub kinematics: String,
    #[serde(default)]
    pub home: PoseCfg,
    #[serde(default)]
    pub tool_transform: PoseCfg,
    #[serde(default)]
    pub min_limit: PoseCfg,
    #[serde(default)]
    pub max_limit: PoseCfg,
    #[serde(default = "default_unity")]
    pub max_tvel: f64,
    #[serde(default = "default_unity")]
    pub max_tacc: f64,
    #[serde(default = "default_unity")]
    pub max_tjerk: f64,
    #[serde(default = "default_unity")]
    pub max_rvel: f64,
    #[serde(default = "default_unity")]
    pub max_racc: f64,
    #[serde(default = "default_unity")]
    pub max_rjerk: f64,
    #[serde(default = "default_unity")]
    pub max_scale: f64,
    #[serde(default = "default_unity")]
    pub max_scale_v: f64,
    #[serde(default = "default_unity")]
    pub max_scale_a: f64,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default)]
    pub debug: u32,
}

fn default_traj_cycle() -> f64 {
    DEFAULT_TRAJ_CYCLE_TIME
}
fn default_servo_cycle() -> f64 {
    DEFAULT_SERVO_CYCLE_TIME
}
fn default_kinematics() -> String {
    "trivial".to_string()
}
fn default_queue_size() -> usize {
    DEFAULT_QUEUE_SIZE
}

impl Default for TrajSection {
    fn default() -> Self {
        Self {
            cycle_time: DEFAULT_TRAJ_CYCLE_TIME,
            servo_cycle_time: DEFAULT_SERVO_CYCLE_TIME,
            kinematics: default_kinematics(),
            home: PoseCfg::default(),
            tool_transform: PoseCfg::default(),
            min_limit: PoseCfg { x: -1e9, y: -1e9, z: -1e9, ..Default::default() },
            max_limit: PoseCfg { x: 1e9, y: 1e9, z: 1e9, ..Default::default() },
            max_tvel: 1.0,
            max_tacc: 1.0,
            max_tjerk: 1.0,
            max_rvel: 1.0,
            max_racc: 1.0,
            max_rjerk: 1.0,
            max_scale: 1.0,
            max_scale_v: 1.0,
            max_scale_a: 1.0,
            queue_size: DEFAULT_QUEUE_SIZE,
            debug: 0,
        }
    }
}

/// External interface selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    /// Registered backend name, e.g. `sim` or `stub`.
    #[serde(default = "default_backend")]
    pub name: String,
    /// Opaque init string handed to the backend.
    #[serde(default)]
    pub init: String,
}

fn default_backend() -> String {
    "sim".to_string()
}

impl Default for BackendSection {
    fn default() -> Self {
        Self { name: default_backend(), init: String::new() }
    }
}

/// The whole controller configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GomConfig {
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub traj: TrajSection,
    /// One section per joint, in joint order.
    #[serde(default)]
    pub servo: HVec<ServoSection, MAX_JOINTS>,
}

impl GomConfig {
    pub fn joint_num(&self) -> usize {
        self.servo.len()
    }

    /// Validate the cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.units.validate().map_err(str::to_string)?;

        if self.servo.is_empty() {
            return Err("at least one [[servo]] section is required".into());
        }
        if self.traj.cycle_time <= 0.0 || self.traj.servo_cycle_time <= 0.0 {
            return Err("cycle times must be positive".into());
        }
        let ratio = self.traj.cycle_time / self.traj.servo_cycle_time;
        if (ratio - ratio.round()).abs() > 1.0e-9 || ratio < 1.0 {
            return Err(format!(
                "servo cycle time {} must divide traj cycle time {}",
                self.traj.servo_cycle_time, self.traj.cycle_time
            ));
        }
        if self.traj.queue_size < 2 {
            return Err("queue_size must be at least 2".into());
        }
        for (i, s) in self.servo.iter().enumerate() {
            if s.min_limit >= s.max_limit {
                return Err(format!("servo {i}: min_limit must be below max_limit"));
            }
            if s.max_vel <= 0.0 || s.max_acc <= 0.0 || s.max_jerk <= 0.0 {
                return Err(format!("servo {i}: max_vel/acc/jerk must be positive"));
            }
            if s.pid.out_max <= 0.0 {
                return Err(format!("servo {i}: pid.out_max must be positive"));
            }
        }
        for (name, v) in [
            ("max_tvel", self.traj.max_tvel),
            ("max_tacc", self.traj.max_tacc),
            ("max_tjerk", self.traj.max_tjerk),
            ("max_rvel", self.traj.max_rvel),
            ("max_racc", self.traj.max_racc),
            ("max_rjerk", self.traj.max_rjerk),
            ("max_scale", self.traj.max_scale),
        ] {
            if v <= 0.0 {
                return Err(format!("traj.{name} must be positive"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_joint_config() -> GomConfig {
        let mut cfg = GomConfig::default();
        cfg.servo.push(ServoSection::default()).unwrap();
        cfg
    }

    #[test]
    fn default_with_one_joint_validates() {
        assert!(one_joint_config().validate().is_ok());
    }

    #[test]
    fn empty_servo_list_rejected() {
        let cfg = GomConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_dividing_cycle_times_rejected() {
        let mut cfg = one_joint_config();
        cfg.traj.cycle_time = 0.0035;
        cfg.traj.servo_cycle_time = 0.001;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_limits_rejected() {
        let mut cfg = one_joint_config();
        cfg.servo[0].min_limit = 1.0;
        cfg.servo[0].max_limit = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let text = r#"
            [units]
            m_per_length_units = 1.0
            rad_per_angle_units = 1.0

            [backend]
            name = "sim"

            [traj]
            kinematics = "trivial"
            cycle_time = 0.004
            servo_cycle_time = 0.001

            [[servo]]
            home = 0.0
            max_vel = 1.0
            max_acc = 1.0
            max_jerk = 1.0

            [servo.pid]
            p = 100.0
            out_max = 10.0
        "#;
        let cfg: GomConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.joint_num(), 1);
        assert_eq!(cfg.backend.name, "sim");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.servo[0].pid.p, 100.0);
    }

    #[test]
    fn pose_cfg_converts_rpy() {
        let p = PoseCfg { x: 1.0, y: 2.0, z: 3.0, roll: 0.0, pitch: 0.0, yaw: 0.0 };
        let pose = p.to_pose();
        assert!(pose.rot.is_close(&gom_math::Quat::IDENTITY));
        assert!((pose.tran.x - 1.0).abs() < 1e-12);
    }
}
