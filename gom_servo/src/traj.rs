//! The coordinated traj loop.
//!
//! Sits above the per-joint servos: consumes at most one command per
//! cycle, builds motion-queue segments, interpolates one step, applies
//! the external pose correction, runs inverse kinematics, and emits
//! per-joint setpoints in the servos' raw coordinates.
//!
//! ## Frames and offsets
//!
//! Servos never leave their startup coordinates. When joint `i` homes,
//! the latched raw position defines the offset
//! `joint_offsets[i] = input_latch[i] - nominal_home[i]`, and from then
//! on `joints_act[i] = servo_input[i] - joint_offsets[i]` while setpoints
//! go out as `joints[i] + joint_offsets[i]`. The offset and the homed
//! flag are read from one servo status record, so the pair is atomic.
//!
//! ## Cartesian pipeline
//!
//! Queue interpolation yields the commanded ECP. The measured-world
//! correction applies first (`ecp' = xinv * ecp`), then the tool
//! transform comes off (`kcp = ecp' * tool^-1`), then inverse kinematics
//! seeded with the current joints produces the setpoints. Any math error
//! in that chain stops the active move and latches the fault state.

use gom_common::comm::{
    Frame, PingPongReader, ServoCmdMsg, ServoCmdType, ServoComm, ServoStatMsg, TrajCfg,
    TrajCfgMsg, TrajCmd, TrajCmdMsg, TrajComm, TrajLogSeries, TrajRefMsg, TrajSetMsg, TrajState,
    TrajStatMsg, WorldMoveKind,
};
use gom_common::config::GomConfig;
use gom_common::consts::MAX_JOINTS;
use gom_kin::Kinematics;
use gom_math::{GoResult, Pose, Rvec, Twist};
use gom_motion::{MotionQueue, MotionSpec, MotionType, Position, QueueType};
use tracing::{debug, info, warn};

/// What drives the setpoints this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ControlMode {
    /// Hold the current joints.
    Idle,
    /// Interpolate the motion queue.
    Queue,
    /// Immediate pose following, no profiling.
    TrackWorld(Pose),
    /// Immediate joint following, no profiling.
    TrackJoint([f64; MAX_JOINTS]),
    /// Integrate joint rates.
    TeleopJoint([f64; MAX_JOINTS]),
    /// Integrate a world-frame twist.
    TeleopWorld(Twist),
    /// Integrate a tool-frame twist.
    TeleopTool(Twist),
}

/// Bounded sample log selected by the LOG config commands.
struct TrajLog {
    series: TrajLogSeries,
    which: usize,
    size: usize,
    data: Vec<f64>,
    head: usize,
    logging: bool,
}

impl TrajLog {
    fn new() -> Self {
        Self {
            series: TrajLogSeries::None,
            which: 0,
            size: 0,
            data: Vec::new(),
            head: 0,
            logging: false,
        }
    }

    fn configure(&mut self, series: TrajLogSeries, which: usize, size: usize) {
        self.series = series;
        self.which = which;
        self.size = size;
        self.data = Vec::with_capacity(size);
        self.head = 0;
        self.logging = false;
    }

    fn push(&mut self, value: f64) {
        if !self.logging || self.size == 0 {
            return;
        }
        if self.data.len() < self.size {
            self.data.push(value);
        } else {
            // Ring over the oldest sample.
            self.data[self.head] = value;
            self.head = (self.head + 1) % self.size;
        }
    }
}

/// The traj task state.
pub struct TrajLoop {
    state: TrajState,
    mode: ControlMode,
    set: TrajSetMsg,
    queue: MotionQueue,
    kin: Box<dyn Kinematics>,
    joint_num: usize,

    nominal_home: [f64; MAX_JOINTS],
    joint_min: [f64; MAX_JOINTS],
    joint_max: [f64; MAX_JOINTS],
    max_jvel: [f64; MAX_JOINTS],
    max_jacc: [f64; MAX_JOINTS],
    max_jjerk: [f64; MAX_JOINTS],

    homed: [bool; MAX_JOINTS],
    joint_offsets: [f64; MAX_JOINTS],
    home_request: [bool; MAX_JOINTS],

    joints: [f64; MAX_JOINTS],
    prev_joints: [f64; MAX_JOINTS],
    prev_jvel: [f64; MAX_JOINTS],
    joints_act: [f64; MAX_JOINTS],
    servo_input: [f64; MAX_JOINTS],
    servo_ferror: [f64; MAX_JOINTS],

    ecp: Pose,
    kcp: Pose,
    ecp_act: Pose,
    xinv: Pose,
    frame: Frame,
    heartbeat: u64,

    servo_cmd_serial: u32,
    servo_override: Option<ServoCmdType>,
    /// Every subordinate has published at least one status record.
    synced: bool,
    stat_readers: Vec<PingPongReader<ServoStatMsg>>,
    cmd_reader: PingPongReader<TrajCmdMsg>,
    cfg_reader: PingPongReader<TrajCfgMsg>,
    ref_reader: PingPongReader<TrajRefMsg>,
    last_cmd_serial: u32,
    last_cmd_tag: u8,
    last_cfg_serial: u32,

    log: TrajLog,
}

impl TrajLoop {
    /// Build the loop from validated configuration.
    pub fn new(cfg: &GomConfig) -> GoResult<TrajLoop> {
        let joint_num = cfg.joint_num();
        let mut kin = gom_kin::select(&cfg.traj.kinematics)?;
        let links: Vec<gom_math::Link> = cfg.servo.iter().map(|s| s.link).collect();
        kin.set_parameters(&links)?;

        let mut queue = MotionQueue::new(cfg.traj.queue_size, cfg.traj.cycle_time)?;
        queue.set_joint_number(joint_num)?;
        queue.set_type(QueueType::Joint);

        let mut set = TrajSetMsg {
            cycle_time: cfg.traj.cycle_time,
            debug: cfg.traj.debug,
            joint_num,
            home: cfg.traj.home.to_pose(),
            tool_transform: cfg.traj.tool_transform.to_pose(),
            tool_transform_inv: cfg.traj.tool_transform.to_pose().inv(),
            min_limit: cfg.traj.min_limit.to_pose(),
            max_limit: cfg.traj.max_limit.to_pose(),
            max_tvel: cfg.traj.max_tvel,
            max_tacc: cfg.traj.max_tacc,
            max_tjerk: cfg.traj.max_tjerk,
            max_rvel: cfg.traj.max_rvel,
            max_racc: cfg.traj.max_racc,
            max_rjerk: cfg.traj.max_rjerk,
            max_scale: cfg.traj.max_scale,
            max_scale_v: cfg.traj.max_scale_v,
            max_scale_a: cfg.traj.max_scale_a,
            queue_size: cfg.traj.queue_size,
            ..Default::default()
        };
        set.scale = 1.0;

        let mut nominal_home = [0.0; MAX_JOINTS];
        let mut joint_min = [f64::NEG_INFINITY; MAX_JOINTS];
        let mut joint_max = [f64::INFINITY; MAX_JOINTS];
        let mut max_jvel = [1.0; MAX_JOINTS];
        let mut max_jacc = [1.0; MAX_JOINTS];
        let mut max_jjerk = [1.0; MAX_JOINTS];
        for (i, s) in cfg.servo.iter().enumerate() {
            nominal_home[i] = s.home;
            joint_min[i] = s.min_limit;
            joint_max[i] = s.max_limit;
            max_jvel[i] = s.max_vel;
            max_jacc[i] = s.max_acc;
            max_jjerk[i] = s.max_jerk;
        }

        Ok(TrajLoop {
            state: TrajState::Uninit,
            mode: ControlMode::Idle,
            set,
            queue,
            kin,
            joint_num,
            nominal_home,
            joint_min,
            joint_max,
            max_jvel,
            max_jacc,
            max_jjerk,
            homed: [false; MAX_JOINTS],
            joint_offsets: [0.0; MAX_JOINTS],
            home_request: [false; MAX_JOINTS],
            joints: [0.0; MAX_JOINTS],
            prev_joints: [0.0; MAX_JOINTS],
            prev_jvel: [0.0; MAX_JOINTS],
            joints_act: [0.0; MAX_JOINTS],
            servo_input: [0.0; MAX_JOINTS],
            servo_ferror: [0.0; MAX_JOINTS],
            ecp: Pose::IDENTITY,
            kcp: Pose::IDENTITY,
            ecp_act: Pose::IDENTITY,
            xinv: Pose::IDENTITY,
            frame: Frame::Joint,
            heartbeat: 0,
            servo_cmd_serial: 0,
            servo_override: None,
            synced: false,
            stat_readers: vec![PingPongReader::new(ServoStatMsg::default()); joint_num],
            cmd_reader: PingPongReader::new(TrajCmdMsg::default()),
            cfg_reader: PingPongReader::new(TrajCfgMsg::default()),
            ref_reader: PingPongReader::new(TrajRefMsg::default()),
            last_cmd_serial: 0,
            last_cmd_tag: 0,
            last_cfg_serial: 0,
            log: TrajLog::new(),
        })
    }

    pub fn state(&self) -> TrajState {
        self.state
    }

    /// Everything configured is homed.
    pub fn all_homed(&self) -> bool {
        self.homed[..self.joint_num].iter().all(|&h| h)
    }

    /// The logged samples so far, oldest first.
    pub fn log_samples(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.log.data.len());
        for k in 0..self.log.data.len() {
            out.push(self.log.data[(self.log.head + k) % self.log.data.len()]);
        }
        out
    }

    fn commands_blocked(&self) -> bool {
        matches!(self.state, TrajState::Aborted | TrajState::Fault)
    }

    // ── Queue space switching ───────────────────────────────────────

    fn enter_joint_space(&mut self, utype: bool) -> GoResult<()> {
        let want = if utype { QueueType::Ujoint } else { QueueType::Joint };
        if self.queue.queue_type() != want || !matches!(self.queue.here(), Position::Joint(_)) {
            self.queue.set_type(want);
            self.queue.set_here(&Position::Joint(self.joints))?;
        } else if self.queue.is_empty() {
            self.queue.set_here(&Position::Joint(self.joints))?;
        }
        Ok(())
    }

    fn enter_world_space(&mut self) -> GoResult<()> {
        if self.queue.queue_type() != QueueType::World {
            self.queue.set_type(QueueType::World);
            self.queue.set_here(&Position::Pose(self.ecp))?;
        } else if self.queue.is_empty() {
            self.queue.set_here(&Position::Pose(self.ecp))?;
        }
        Ok(())
    }

    // ── Command dispatch ────────────────────────────────────────────

    fn dispatch(&mut self, cmd: &TrajCmd) {
        if self.commands_blocked() && !matches!(cmd, TrajCmd::Init | TrajCmd::Shutdown) {
            debug!(tag = cmd.tag(), "command ignored while aborted/faulted");
            return;
        }

        match *cmd {
            TrajCmd::Nop => {}
            TrajCmd::Init => {
                self.queue.reset();
                self.mode = ControlMode::Idle;
                self.joints = self.joints_act;
                self.prev_joints = self.joints_act;
                self.servo_override = Some(ServoCmdType::Init);
                self.state = TrajState::Ready;
                info!("traj initialized");
            }
            TrajCmd::Abort => {
                self.queue.reset();
                self.mode = ControlMode::Idle;
                self.joints = self.joints_act;
                self.prev_joints = self.joints_act;
                self.servo_override = Some(ServoCmdType::Abort);
                self.state = TrajState::Aborted;
                warn!("traj aborted");
            }
            TrajCmd::Halt | TrajCmd::Stop => {
                if self.mode == ControlMode::Queue && !self.queue.is_empty() {
                    if self.queue.stop().is_err() {
                        self.state = TrajState::Fault;
                        return;
                    }
                    self.state = TrajState::Stopping;
                } else {
                    self.mode = ControlMode::Idle;
                    self.state = TrajState::Stopped;
                }
            }
            TrajCmd::Shutdown => {
                self.servo_override = Some(ServoCmdType::Shutdown);
                self.state = TrajState::Shutdown;
            }
            TrajCmd::MoveWorld { id, kind, tv, ta, tj, rv, ra, rj, time, end } => {
                self.move_world(id, kind, [tv, ta, tj], [rv, ra, rj], time, end, false);
            }
            TrajCmd::MoveTool { id, kind, tv, ta, tj, rv, ra, rj, time, end } => {
                self.move_world(id, kind, [tv, ta, tj], [rv, ra, rj], time, end, true);
            }
            TrajCmd::MoveJoint { id, d, v, a, j, time } => {
                if self.enter_joint_space(false).is_err() {
                    return;
                }
                let mut spec = MotionSpec::new();
                spec.set_type(MotionType::Joint);
                spec.set_id(id);
                spec.set_time(time);
                for i in 0..self.joint_num {
                    let vel = clamp_limit(v[i], self.max_jvel[i]);
                    let acc = clamp_limit(a[i], self.max_jacc[i]);
                    let jerk = clamp_limit(j[i], self.max_jjerk[i]);
                    if spec.set_jpar(i, vel, acc, jerk).is_err() {
                        return;
                    }
                }
                let mut end = self.joints;
                end[..self.joint_num].copy_from_slice(&d[..self.joint_num]);
                spec.set_end_position(Position::Joint(end));
                match self.queue.append(&spec) {
                    Ok(()) => {
                        self.mode = ControlMode::Queue;
                        self.frame = Frame::Joint;
                        self.state = TrajState::Executing;
                    }
                    Err(e) => warn!(id, ?e, "joint move rejected"),
                }
            }
            TrajCmd::MoveUjoint { id, d, v, a, j, home } => {
                if self.enter_joint_space(true).is_err() {
                    return;
                }
                let mut spec = MotionSpec::new();
                spec.set_type(MotionType::Ujoint);
                spec.set_id(id);
                for i in 0..self.joint_num {
                    let vel = clamp_limit(v[i], self.max_jvel[i]);
                    let acc = clamp_limit(a[i], self.max_jacc[i]);
                    let jerk = clamp_limit(j[i], self.max_jjerk[i]);
                    if spec.set_jpar(i, vel, acc, jerk).is_err() {
                        return;
                    }
                }
                let mut end = self.joints;
                end[..self.joint_num].copy_from_slice(&d[..self.joint_num]);
                spec.set_end_position(Position::Joint(end));
                match self.queue.append(&spec) {
                    Ok(()) => {
                        for i in 0..self.joint_num {
                            if home[i] {
                                // Re-home: the move is the search motion.
                                self.home_request[i] = true;
                                self.homed[i] = false;
                            }
                        }
                        self.mode = ControlMode::Queue;
                        self.frame = Frame::Joint;
                        self.state = TrajState::Executing;
                    }
                    Err(e) => warn!(id, ?e, "ujoint move rejected"),
                }
            }
            TrajCmd::TrackWorld { position } => {
                if !self.all_homed() {
                    warn!("track world needs a homed mechanism");
                    return;
                }
                self.mode = ControlMode::TrackWorld(position);
                self.frame = Frame::World;
                self.state = TrajState::Executing;
            }
            TrajCmd::TrackJoint { joints } => {
                self.mode = ControlMode::TrackJoint(joints);
                self.frame = Frame::Joint;
                self.state = TrajState::Executing;
            }
            TrajCmd::TeleopJoint { v, a: _, j: _ } => {
                self.mode = ControlMode::TeleopJoint(v);
                self.frame = Frame::Joint;
                self.state = TrajState::Teleop;
            }
            TrajCmd::TeleopWorld { tv, .. } => {
                if !self.all_homed() {
                    warn!("teleop world needs a homed mechanism");
                    return;
                }
                self.mode = ControlMode::TeleopWorld(tv);
                self.frame = Frame::World;
                self.state = TrajState::Teleop;
            }
            TrajCmd::TeleopTool { tv, .. } => {
                if !self.all_homed() {
                    warn!("teleop tool needs a homed mechanism");
                    return;
                }
                self.mode = ControlMode::TeleopTool(tv);
                self.frame = Frame::World;
                self.state = TrajState::Teleop;
            }
            TrajCmd::Here { here } => {
                self.declare_here(&here);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn move_world(
        &mut self,
        id: i32,
        kind: WorldMoveKind,
        tpar: [f64; 3],
        rpar: [f64; 3],
        time: f64,
        end: Pose,
        tool_frame: bool,
    ) {
        if !self.all_homed() {
            warn!(id, "world move needs a homed mechanism");
            return;
        }
        if self.enter_world_space().is_err() {
            return;
        }
        let end_ecp = if tool_frame {
            // Tool-frame goals are incremental from where the queued
            // motion will leave the tool.
            match self.queue.there() {
                Position::Pose(p) => p.compose(&end),
                Position::Joint(_) => return,
            }
        } else {
            end
        };

        let mut spec = MotionSpec::new();
        spec.set_id(id);
        spec.set_time(time);
        spec.set_tpar(
            clamp_limit(tpar[0], self.set.max_tvel),
            clamp_limit(tpar[1], self.set.max_tacc),
            clamp_limit(tpar[2], self.set.max_tjerk),
        );
        spec.set_rpar(
            clamp_limit(rpar[0], self.set.max_rvel),
            clamp_limit(rpar[1], self.set.max_racc),
            clamp_limit(rpar[2], self.set.max_rjerk),
        );
        spec.set_end_pose(end_ecp);
        match kind {
            WorldMoveKind::Linear => spec.set_type(MotionType::Linear),
            WorldMoveKind::Circular { center, normal, turns } => {
                spec.set_type(MotionType::Circular);
                spec.set_cpar(center, normal, turns);
            }
        }
        match self.queue.append(&spec) {
            Ok(()) => {
                self.mode = ControlMode::Queue;
                self.frame = Frame::World;
                self.state = TrajState::Executing;
            }
            Err(e) => warn!(id, ?e, "world move rejected"),
        }
    }

    /// HERE: declare the current ECP and become homed everywhere.
    fn declare_here(&mut self, here: &Pose) {
        let kcp = here.compose(&self.set.tool_transform_inv);
        let mut joints = self.joints;
        if self.kin.inv(&kcp, &mut joints[..self.joint_num]).is_err() {
            warn!("here pose is not reachable");
            return;
        }
        for i in 0..self.joint_num {
            self.joint_offsets[i] = self.servo_input[i] - joints[i];
            self.homed[i] = true;
            self.home_request[i] = false;
        }
        self.joints = joints;
        self.prev_joints = joints;
        self.ecp = *here;
        self.kcp = kcp;
        self.mode = ControlMode::Idle;
        self.frame = Frame::World;
        if self.state == TrajState::Uninit {
            self.state = TrajState::Ready;
        }
        info!("here declared; all joints homed");
    }

    // ── Config dispatch ─────────────────────────────────────────────

    fn apply_config(&mut self, cfg: &TrajCfg) {
        match *cfg {
            TrajCfg::Nop => {}
            TrajCfg::CycleTime(dt) => {
                if dt > 0.0 && self.queue.set_cycle_time(dt).is_ok() {
                    self.set.cycle_time = dt;
                }
            }
            TrajCfg::Debug(mask) => self.set.debug = mask,
            TrajCfg::Home(pose) => self.set.home = pose,
            TrajCfg::Limit { min, max } => {
                self.set.min_limit = min;
                self.set.max_limit = max;
            }
            TrajCfg::Profile { max_tvel, max_tacc, max_tjerk, max_rvel, max_racc, max_rjerk } => {
                self.set.max_tvel = max_tvel;
                self.set.max_tacc = max_tacc;
                self.set.max_tjerk = max_tjerk;
                self.set.max_rvel = max_rvel;
                self.set.max_racc = max_racc;
                self.set.max_rjerk = max_rjerk;
            }
            TrajCfg::Kinematics { links, num } => {
                let n = num.min(MAX_JOINTS);
                if let Err(e) = self.kin.set_parameters(&links[..n]) {
                    warn!(?e, "kinematics parameters rejected");
                }
            }
            TrajCfg::Scale { scale, v, a } => {
                let scale = clamp_limit(scale, self.set.max_scale);
                let v = clamp_limit(v, self.set.max_scale_v);
                let a = clamp_limit(a, self.set.max_scale_a);
                if self.queue.set_scale(scale, v, a).is_ok() {
                    self.set.scale = scale;
                    self.set.scale_v = v;
                    self.set.scale_a = a;
                }
            }
            TrajCfg::MaxScale { scale, v, a } => {
                if scale > 0.0 {
                    self.set.max_scale = scale;
                }
                if v > 0.0 {
                    self.set.max_scale_v = v;
                }
                if a > 0.0 {
                    self.set.max_scale_a = a;
                }
            }
            TrajCfg::Log { series, which, size } => {
                self.log.configure(series, which.min(MAX_JOINTS - 1), size);
                self.set.log_series = series;
                self.set.log_which = which;
                self.set.log_size = size;
            }
            TrajCfg::LogStart => {
                self.log.logging = true;
                self.set.log_logging = true;
            }
            TrajCfg::LogStop => {
                self.log.logging = false;
                self.set.log_logging = false;
            }
            TrajCfg::ToolTransform(pose) => {
                self.set.tool_transform = pose;
                self.set.tool_transform_inv = pose.inv();
            }
        }
    }

    // ── Cartesian pipeline ──────────────────────────────────────────

    /// Commanded ECP to joint setpoints through correction, tool and
    /// inverse kinematics.
    fn world_to_joints(&mut self, ecp_cmd: &Pose) -> GoResult<()> {
        self.ecp = *ecp_cmd;
        let corrected = self.xinv.compose(ecp_cmd);
        self.kcp = corrected.compose(&self.set.tool_transform_inv);
        let mut joints = self.joints;
        self.kin.inv(&self.kcp, &mut joints[..self.joint_num])?;
        self.joints = joints;
        Ok(())
    }

    fn clamp_pose_to_limits(&self, pose: &mut Pose) {
        pose.tran.x = pose.tran.x.clamp(self.set.min_limit.tran.x, self.set.max_limit.tran.x);
        pose.tran.y = pose.tran.y.clamp(self.set.min_limit.tran.y, self.set.max_limit.tran.y);
        pose.tran.z = pose.tran.z.clamp(self.set.min_limit.tran.z, self.set.max_limit.tran.z);
    }

    fn clamp_joints_to_limits(&self, joints: &mut [f64; MAX_JOINTS]) {
        for i in 0..self.joint_num {
            joints[i] = joints[i].clamp(self.joint_min[i], self.joint_max[i]);
        }
    }

    /// Generate this cycle's desired joints from the active mode.
    fn generate_motion(&mut self) {
        match self.mode {
            ControlMode::Idle => {}
            ControlMode::Queue => {
                let pos = match self.queue.interp() {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(?e, "queue interpolation failed");
                        let _ = self.queue.stop();
                        self.state = TrajState::Fault;
                        return;
                    }
                };
                match pos {
                    Position::Joint(j) => {
                        self.joints[..self.joint_num].copy_from_slice(&j[..self.joint_num]);
                    }
                    Position::Pose(ecp) => {
                        if self.world_to_joints(&ecp).is_err() {
                            warn!("inverse kinematics failed mid-move");
                            let _ = self.queue.stop();
                            self.state = TrajState::Fault;
                        }
                    }
                }
                if self.queue.is_empty() {
                    self.state = match self.state {
                        TrajState::Stopping => TrajState::Stopped,
                        TrajState::Executing => TrajState::Ready,
                        s => s,
                    };
                }
            }
            ControlMode::TrackWorld(mut target) => {
                self.clamp_pose_to_limits(&mut target);
                if self.world_to_joints(&target).is_err() {
                    warn!("track target unreachable; holding");
                }
            }
            ControlMode::TrackJoint(mut target) => {
                self.clamp_joints_to_limits(&mut target);
                self.joints[..self.joint_num].copy_from_slice(&target[..self.joint_num]);
            }
            ControlMode::TeleopJoint(v) => {
                let dt = self.set.cycle_time;
                let mut next = self.joints;
                for i in 0..self.joint_num {
                    let rate = v[i].clamp(-self.max_jvel[i], self.max_jvel[i]);
                    next[i] += rate * dt;
                }
                self.clamp_joints_to_limits(&mut next);
                self.joints = next;
            }
            ControlMode::TeleopWorld(tv) | ControlMode::TeleopTool(tv) => {
                let dt = self.set.cycle_time;
                let world_v = if matches!(self.mode, ControlMode::TeleopTool(_)) {
                    Twist { v: self.ecp.rot.rotate(&tv.v), w: self.ecp.rot.rotate(&tv.w) }
                } else {
                    tv
                };
                let mut target = self.ecp;
                target.tran = target.tran.add(&world_v.v.scale(dt));
                let dw = world_v.w.scale(dt);
                let dq = Rvec::new(dw.x, dw.y, dw.z).to_quat();
                target.rot = dq.mul(&target.rot);
                self.clamp_pose_to_limits(&mut target);
                if self.world_to_joints(&target).is_err() {
                    warn!("teleop target unreachable; holding");
                }
            }
        }
    }

    // ── The cycle ───────────────────────────────────────────────────

    /// Run one traj cycle against the servo comm trios. Returns `false`
    /// once the loop has shut down.
    pub fn cycle(&mut self, comm: &TrajComm, servos: &[ServoComm]) -> bool {
        let n = self.joint_num.min(servos.len());

        // ── Subordinate status ──────────────────────────────────────
        let mut any_fault = false;
        for i in 0..n {
            self.stat_readers[i].update(&servos[i].stat);
            let stat = *self.stat_readers[i].get();
            self.servo_input[i] = stat.input;
            self.servo_ferror[i] = stat.ferror;
            if !stat.faults.is_empty() {
                any_fault = true;
            }
            if self.home_request[i] && stat.homed {
                // homed and input_latch arrived in one record. The frame
                // for this joint moves by the offset change, so desired
                // positions rebase to keep the raw setpoints continuous.
                let old = self.joint_offsets[i];
                self.joint_offsets[i] = stat.input_latch - self.nominal_home[i];
                let delta = self.joint_offsets[i] - old;
                self.homed[i] = true;
                self.home_request[i] = false;
                self.joints[i] -= delta;
                self.prev_joints[i] -= delta;
                let _ = self.queue.stop_joint(i);
                let _ = self.queue.rebase_joint(i, -delta);
                info!(joint = i, offset = self.joint_offsets[i], "joint homed");
            }
            self.joints_act[i] = if self.homed[i] {
                stat.input - self.joint_offsets[i]
            } else {
                stat.input
            };
        }

        // Until every servo has published live feedback, commands stay
        // pending in their cell: acting on zeroed status records would
        // command a jump to wherever the defaults happen to sit.
        if !self.synced {
            self.synced = (0..n).all(|i| self.stat_readers[i].get().heartbeat > 0);
            if !self.synced {
                self.heartbeat += 1;
                let mut stat = TrajStatMsg { heartbeat: self.heartbeat, ..Default::default() };
                stat.state = self.state;
                comm.stat.write(&stat);
                return true;
            }
            self.joints = self.joints_act;
            self.prev_joints = self.joints_act;
        }

        if any_fault && !matches!(self.state, TrajState::Aborted | TrajState::Shutdown) {
            warn!("servo fault; aborting coordinated motion");
            let _ = self.queue.stop();
            self.queue.reset();
            self.mode = ControlMode::Idle;
            self.joints = self.joints_act;
            self.prev_joints = self.joints_act;
            self.servo_override = Some(ServoCmdType::Abort);
            self.state = TrajState::Aborted;
        }

        // ── Command intake: at most one per cycle ───────────────────
        self.cmd_reader.update(&comm.cmd);
        let cmd = *self.cmd_reader.get();
        if cmd.serial != self.last_cmd_serial {
            self.last_cmd_serial = cmd.serial;
            self.last_cmd_tag = cmd.cmd.tag();
            self.dispatch(&cmd.cmd);
        }

        // ── Config intake ───────────────────────────────────────────
        self.cfg_reader.update(&comm.cfg);
        let cfg = *self.cfg_reader.get();
        if cfg.serial != self.last_cfg_serial {
            self.last_cfg_serial = cfg.serial;
            self.apply_config(&cfg.cfg);
            self.set.echo_serial = cfg.serial;
            comm.set.write(&self.set);
        }

        // ── Reference correction: identity unless someone writes it ─
        self.ref_reader.update(&comm.reference);
        self.xinv = self.ref_reader.get().xinv;

        // ── Actual-side kinematics ──────────────────────────────────
        let mut kcp_act = self.ecp_act.compose(&self.set.tool_transform_inv);
        if self.kin.fwd(&self.joints_act[..self.joint_num], &mut kcp_act).is_ok() {
            self.ecp_act = kcp_act.compose(&self.set.tool_transform);
        }

        // ── Desired-side motion ─────────────────────────────────────
        if !matches!(self.state, TrajState::Uninit | TrajState::Shutdown) {
            self.generate_motion();
        }

        // ── Setpoints out ───────────────────────────────────────────
        let dt = self.set.cycle_time;
        let override_type = self.servo_override.take();
        self.servo_cmd_serial = self.servo_cmd_serial.wrapping_add(1);
        for i in 0..n {
            let vel = if dt > 0.0 { (self.joints[i] - self.prev_joints[i]) / dt } else { 0.0 };
            let acc = if dt > 0.0 { (vel - self.prev_jvel[i]) / dt } else { 0.0 };
            let msg = ServoCmdMsg {
                serial: self.servo_cmd_serial,
                cmd_type: override_type.unwrap_or(ServoCmdType::Servo),
                setpoint: self.joints[i] + self.joint_offsets[i],
                ff_vel: vel,
                ff_acc: acc,
                home: self.home_request[i],
                enable: true,
            };
            servos[i].cmd.write(&msg);
            self.prev_jvel[i] = vel;
        }
        self.prev_joints = self.joints;

        // ── Status out, last ────────────────────────────────────────
        self.heartbeat += 1;
        let inpos = self.queue.is_empty()
            && matches!(self.mode, ControlMode::Idle | ControlMode::Queue);
        let mut ferror = [0.0; MAX_JOINTS];
        ferror[..n].copy_from_slice(&self.servo_ferror[..n]);

        self.log.push(match self.log.series {
            TrajLogSeries::None => 0.0,
            TrajLogSeries::CmdPos => self.joints[self.log.which],
            TrajLogSeries::ActPos => self.joints_act[self.log.which],
            TrajLogSeries::Ferror => ferror[self.log.which],
            TrajLogSeries::CmdWorld => world_component(&self.ecp, self.log.which),
            TrajLogSeries::ActWorld => world_component(&self.ecp_act, self.log.which),
        });

        comm.stat.write(&TrajStatMsg {
            echo_serial: self.last_cmd_serial,
            echo_tag: self.last_cmd_tag,
            state: self.state,
            frame: self.frame,
            heartbeat: self.heartbeat,
            homed: self.all_homed(),
            inpos,
            cycle_time: self.set.cycle_time,
            ecp: self.ecp,
            ecp_act: self.ecp_act,
            kcp: self.kcp,
            xinv: self.xinv,
            joints: self.joints,
            joints_act: self.joints_act,
            joints_ferror: ferror,
            joint_offsets: self.joint_offsets,
            queue_count: self.queue.number(),
            motion_id: self.queue.motion_id(),
        });

        self.state != TrajState::Shutdown
    }
}

#[inline]
fn clamp_limit(value: f64, max: f64) -> f64 {
    if value <= 0.0 || value > max { max } else { value }
}

fn world_component(pose: &Pose, which: usize) -> f64 {
    match which {
        0 => pose.tran.x,
        1 => pose.tran.y,
        2 => pose.tran.z,
        _ => pose.rot.mag(),
    }
}
