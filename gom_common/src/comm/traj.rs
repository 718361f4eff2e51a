//! Traj command, status, config and reference records.
//!
//! The command union of the original shared-memory ABI becomes a tagged
//! sum with a compile-time maximum size; the discriminant plays the role
//! of the message type tag, and the ping-pong cell supplies the head/tail
//! guards.

use gom_math::{Link, Pose, Twist};
use static_assertions::const_assert;

use super::cell::CommCell;
use crate::consts::MAX_JOINTS;

// The command and config records are tagged sums with a compile-time
// maximum size; keep them inside one page so a copy stays a handful of
// cache lines.
const_assert!(core::mem::size_of::<TrajCmdMsg>() <= 4096);
const_assert!(core::mem::size_of::<TrajCfgMsg>() <= 4096);
const_assert!(core::mem::size_of::<TrajStatMsg>() <= 4096);

/// Kind of a Cartesian move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldMoveKind {
    Linear,
    Circular {
        /// Vector to the circle center.
        center: gom_math::Cart,
        /// Normal defining the circle plane.
        normal: gom_math::Cart,
        /// Extra full revolutions; 0 is a partial CCW arc, -1 partial CW.
        turns: i32,
    },
}

/// Commands accepted by the traj loop. One is consumed per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TrajCmd {
    #[default]
    Nop,
    Init,
    Abort,
    Halt,
    Shutdown,
    Stop,
    MoveWorld {
        id: i32,
        kind: WorldMoveKind,
        tv: f64,
        ta: f64,
        tj: f64,
        rv: f64,
        ra: f64,
        rj: f64,
        /// If positive, stretch the move to take this long.
        time: f64,
        end: Pose,
    },
    /// Same shape as MoveWorld with the goal in the tool frame.
    MoveTool {
        id: i32,
        kind: WorldMoveKind,
        tv: f64,
        ta: f64,
        tj: f64,
        rv: f64,
        ra: f64,
        rj: f64,
        time: f64,
        end: Pose,
    },
    MoveJoint {
        id: i32,
        d: [f64; MAX_JOINTS],
        v: [f64; MAX_JOINTS],
        a: [f64; MAX_JOINTS],
        j: [f64; MAX_JOINTS],
        time: f64,
    },
    /// Uncoordinated per-axis moves, optionally homing.
    MoveUjoint {
        id: i32,
        d: [f64; MAX_JOINTS],
        v: [f64; MAX_JOINTS],
        a: [f64; MAX_JOINTS],
        j: [f64; MAX_JOINTS],
        home: [bool; MAX_JOINTS],
    },
    /// Immediate pose following, no profiling.
    TrackWorld { position: Pose },
    /// Immediate joint following, no profiling.
    TrackJoint { joints: [f64; MAX_JOINTS] },
    TeleopJoint {
        v: [f64; MAX_JOINTS],
        a: [f64; MAX_JOINTS],
        j: [f64; MAX_JOINTS],
    },
    TeleopWorld { tv: Twist, ta: f64, tj: f64, ra: f64, rj: f64 },
    TeleopTool { tv: Twist, ta: f64, tj: f64, ra: f64, rj: f64 },
    /// Declare the current pose and become homed.
    Here { here: Pose },
}

impl TrajCmd {
    /// Discriminant for status echo.
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Nop => 0,
            Self::Init => 1,
            Self::Abort => 2,
            Self::Halt => 3,
            Self::Shutdown => 4,
            Self::Stop => 5,
            Self::MoveWorld { .. } => 6,
            Self::MoveTool { .. } => 7,
            Self::MoveJoint { .. } => 8,
            Self::MoveUjoint { .. } => 9,
            Self::TrackWorld { .. } => 10,
            Self::TrackJoint { .. } => 11,
            Self::TeleopJoint { .. } => 12,
            Self::TeleopWorld { .. } => 13,
            Self::TeleopTool { .. } => 14,
            Self::Here { .. } => 15,
        }
    }
}

/// Traj loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TrajState {
    #[default]
    Uninit = 0,
    Init = 1,
    Ready = 2,
    Executing = 3,
    Stopping = 4,
    Stopped = 5,
    Teleop = 6,
    Aborted = 7,
    Fault = 8,
    Shutdown = 9,
}

impl TrajState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Uninit),
            1 => Some(Self::Init),
            2 => Some(Self::Ready),
            3 => Some(Self::Executing),
            4 => Some(Self::Stopping),
            5 => Some(Self::Stopped),
            6 => Some(Self::Teleop),
            7 => Some(Self::Aborted),
            8 => Some(Self::Fault),
            9 => Some(Self::Shutdown),
            _ => None,
        }
    }
}

/// Reference frame of the last motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Frame {
    #[default]
    World = 0,
    Joint = 1,
}

/// Which per-cycle series the status log samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TrajLogSeries {
    #[default]
    None = 0,
    /// Commanded joint position.
    CmdPos = 1,
    /// Actual joint position.
    ActPos = 2,
    /// Joint following error.
    Ferror = 3,
    /// Commanded Cartesian component.
    CmdWorld = 4,
    /// Actual Cartesian component.
    ActWorld = 5,
}

/// Command record: one writer (the user shell), traj reads one per cycle.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct TrajCmdMsg {
    pub serial: u32,
    pub cmd: TrajCmd,
}

/// Status record written by traj every cycle.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TrajStatMsg {
    /// Serial of the last command consumed, echoed even when rejected.
    pub echo_serial: u32,
    /// Tag of that command.
    pub echo_tag: u8,
    pub state: TrajState,
    pub frame: Frame,
    pub heartbeat: u64,
    /// All configured joints homed.
    pub homed: bool,
    /// Active move finished and queue drained.
    pub inpos: bool,
    /// Measured cycle time [s].
    pub cycle_time: f64,
    /// Commanded end control point.
    pub ecp: Pose,
    /// Actual end control point from forward kinematics.
    pub ecp_act: Pose,
    /// Commanded kinematic control point.
    pub kcp: Pose,
    /// Pose correction currently applied.
    pub xinv: Pose,
    pub joints: [f64; MAX_JOINTS],
    pub joints_act: [f64; MAX_JOINTS],
    pub joints_ferror: [f64; MAX_JOINTS],
    /// input_latch - nominal home, per joint; published together with
    /// `homed` so the pair is atomic.
    pub joint_offsets: [f64; MAX_JOINTS],
    /// Motions waiting on the queue.
    pub queue_count: usize,
    /// Id of the segment being interpolated, or of the last one finished.
    pub motion_id: i32,
}

impl Default for TrajStatMsg {
    fn default() -> Self {
        Self {
            echo_serial: 0,
            echo_tag: 0,
            state: TrajState::default(),
            frame: Frame::default(),
            heartbeat: 0,
            homed: false,
            inpos: true,
            cycle_time: 0.0,
            ecp: Pose::IDENTITY,
            ecp_act: Pose::IDENTITY,
            kcp: Pose::IDENTITY,
            xinv: Pose::IDENTITY,
            joints: [0.0; MAX_JOINTS],
            joints_act: [0.0; MAX_JOINTS],
            joints_ferror: [0.0; MAX_JOINTS],
            joint_offsets: [0.0; MAX_JOINTS],
            queue_count: 0,
            motion_id: 0,
        }
    }
}

/// Config command variants for the traj loop.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TrajCfg {
    #[default]
    Nop,
    CycleTime(f64),
    Debug(u32),
    /// Nominal home pose.
    Home(Pose),
    /// Cartesian travel limits.
    Limit { min: Pose, max: Pose },
    /// Profile maxima for world moves.
    Profile {
        max_tvel: f64,
        max_tacc: f64,
        max_tjerk: f64,
        max_rvel: f64,
        max_racc: f64,
        max_rjerk: f64,
    },
    /// Link parameters handed to the kinematics implementation.
    Kinematics { links: [Link; MAX_JOINTS], num: usize },
    /// Walked-in time scale request.
    Scale { scale: f64, v: f64, a: f64 },
    MaxScale { scale: f64, v: f64, a: f64 },
    /// Select what the in-memory log samples.
    Log { series: TrajLogSeries, which: usize, size: usize },
    LogStart,
    LogStop,
    /// ECP with respect to KCP.
    ToolTransform(Pose),
}

/// Config record for traj.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct TrajCfgMsg {
    pub serial: u32,
    pub cfg: TrajCfg,
}

/// Settings echo: the traj configuration actually in effect.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TrajSetMsg {
    pub echo_serial: u32,
    pub cycle_time: f64,
    pub debug: u32,
    pub joint_num: usize,
    pub home: Pose,
    pub tool_transform: Pose,
    pub tool_transform_inv: Pose,
    pub min_limit: Pose,
    pub max_limit: Pose,
    pub max_tvel: f64,
    pub max_tacc: f64,
    pub max_tjerk: f64,
    pub max_rvel: f64,
    pub max_racc: f64,
    pub max_rjerk: f64,
    pub scale: f64,
    pub scale_v: f64,
    pub scale_a: f64,
    pub max_scale: f64,
    pub max_scale_v: f64,
    pub max_scale_a: f64,
    pub queue_size: usize,
    pub log_series: TrajLogSeries,
    pub log_which: usize,
    pub log_size: usize,
    pub log_logging: bool,
}

impl Default for TrajSetMsg {
    fn default() -> Self {
        Self {
            echo_serial: 0,
            cycle_time: crate::consts::DEFAULT_TRAJ_CYCLE_TIME,
            debug: 0,
            joint_num: 0,
            home: Pose::IDENTITY,
            tool_transform: Pose::IDENTITY,
            tool_transform_inv: Pose::IDENTITY,
            min_limit: Pose::IDENTITY,
            max_limit: Pose::IDENTITY,
            max_tvel: 1.0,
            max_tacc: 1.0,
            max_tjerk: 1.0,
            max_rvel: 1.0,
            max_racc: 1.0,
            max_rjerk: 1.0,
            scale: 1.0,
            scale_v: 1.0,
            scale_a: 1.0,
            max_scale: 1.0,
            max_scale_v: 1.0,
            max_scale_a: 1.0,
            queue_size: crate::consts::DEFAULT_QUEUE_SIZE,
            log_series: TrajLogSeries::None,
            log_which: 0,
            log_size: 0,
            log_logging: false,
        }
    }
}

/// Optional pose-correction record from an external measurement system.
///
/// Identity is the safe default; traj must not require the writer to
/// exist.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct TrajRefMsg {
    pub xinv: Pose,
}

impl Default for TrajRefMsg {
    fn default() -> Self {
        Self { xinv: Pose::IDENTITY }
    }
}

/// The full comm block set for the traj loop.
pub struct TrajComm {
    pub cmd: CommCell<TrajCmdMsg>,
    pub stat: CommCell<TrajStatMsg>,
    pub cfg: CommCell<TrajCfgMsg>,
    pub set: CommCell<TrajSetMsg>,
    pub reference: CommCell<TrajRefMsg>,
}

impl TrajComm {
    pub fn new() -> Self {
        Self {
            cmd: CommCell::new(TrajCmdMsg::default()),
            stat: CommCell::new(TrajStatMsg::default()),
            cfg: CommCell::new(TrajCfgMsg::default()),
            set: CommCell::new(TrajSetMsg::default()),
            reference: CommCell::new(TrajRefMsg::default()),
        }
    }
}

impl Default for TrajComm {
    fn default() -> Self {
        Self::new()
    }
}
