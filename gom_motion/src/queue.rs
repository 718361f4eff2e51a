//! The motion queue: a bounded FIFO of planned segments consumed one
//! interpolation step per cycle.
//!
//! Joint and ujoint segments carry one constant-jerk profile per joint;
//! world segments carry one profile for translation (or arc length) and
//! one for rotation, time-aligned so the slower of the two gates the
//! move. The queue's cycle clock advances by `deltat` times the walked-in
//! time scale.

use gom_common::consts::MAX_JOINTS;
use gom_math::{Cart, GoError, GoResult, Pose, Quat};

use crate::profile::CjProfile;
use crate::scale::TimeScale;

const DIST_FUZZ: f64 = 1.0e-10;

/// Joint-space or Cartesian position, depending on the queue type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    Joint([f64; MAX_JOINTS]),
    Pose(Pose),
}

impl Position {
    pub fn zero_joints() -> Position {
        Position::Joint([0.0; MAX_JOINTS])
    }

    pub fn identity_pose() -> Position {
        Position::Pose(Pose::IDENTITY)
    }

    pub fn as_joints(&self) -> GoResult<&[f64; MAX_JOINTS]> {
        match self {
            Position::Joint(j) => Ok(j),
            Position::Pose(_) => Err(GoError::BadArgs),
        }
    }

    pub fn as_pose(&self) -> GoResult<&Pose> {
        match self {
            Position::Pose(p) => Ok(p),
            Position::Joint(_) => Err(GoError::BadArgs),
        }
    }
}

/// What kind of motions the queue is interpolating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueType {
    #[default]
    None,
    Joint,
    Ujoint,
    World,
}

/// Kind of one motion segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionType {
    Joint,
    Ujoint,
    Linear,
    Circular,
    /// Rotary-as-linear axis; interpolated like a linear move.
    Wrapped,
}

/// Per-axis motion limits. For world moves index 0 is translation and
/// index 1 is rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionParams {
    pub vel: f64,
    pub acc: f64,
    pub jerk: f64,
}

/// Derived geometry of a linear world segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearParams {
    /// Unit vector along the translation; zero for a pure rotation.
    pub uvec: Cart,
}

/// Derived geometry of a circular world segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularParams {
    pub center: Cart,
    /// Unit normal defining the circle plane.
    pub normal: Cart,
    /// Unit vector from center to start, projected into the plane.
    pub urcsp: Cart,
    /// Starting radius.
    pub rstart: f64,
    /// Off-plane offset of the start point.
    pub zstart: f64,
    /// Signed total angle about the normal, including full turns.
    pub thtot: f64,
    /// Signed radius change from start to end.
    pub rtot: f64,
    /// Signed off-plane change from start to end.
    pub ztot: f64,
    /// Inverse of the approximate arc length, 0 when the path has no
    /// translation.
    pub stotinv: f64,
    pub turns: i32,
}

impl Default for CircularParams {
    fn default() -> Self {
        Self {
            center: Cart::ZERO,
            normal: Cart::new(0.0, 0.0, 1.0),
            urcsp: Cart::new(1.0, 0.0, 0.0),
            rstart: 0.0,
            zstart: 0.0,
            thtot: 0.0,
            rtot: 0.0,
            ztot: 0.0,
            stotinv: 0.0,
            turns: 0,
        }
    }
}

/// Derived world-move geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum WorldGeom {
    #[default]
    None,
    Linear(LinearParams),
    Circular(CircularParams),
}

/// One motion segment. Callers fill the request fields through the
/// setters; `MotionQueue::append` computes the rest.
#[derive(Debug, Clone, Copy)]
pub struct MotionSpec {
    pub id: i32,
    pub mtype: MotionType,
    /// Planned duration; set at append time.
    pub totalt: f64,
    /// Where the segment begins; the previous segment's end.
    pub start: Position,
    /// Target position.
    pub end: Position,
    /// Requested minimum duration; 0 means as fast as the limits allow.
    pub time: f64,
    pub par: [MotionParams; MAX_JOINTS],
    /// Circle request fields, used when `mtype` is `Circular`.
    pub center: Cart,
    pub cnormal: Cart,
    pub turns: i32,
    // Derived at append time.
    pub sign: [f64; MAX_JOINTS],
    /// Unit rotation from start to end, in the start frame.
    pub uquat: Quat,
    /// Total rotation angle.
    pub rot_angle: f64,
    /// 1 / rot_angle, 0 for no rotation.
    pub rot_inv: f64,
    pub geom: WorldGeom,
    /// Per-axis profiles; for world moves [0] is translation, [1] rotation.
    pub cj: [CjProfile; MAX_JOINTS],
}

impl Default for MotionSpec {
    fn default() -> Self {
        Self {
            id: 0,
            mtype: MotionType::Joint,
            totalt: 0.0,
            start: Position::zero_joints(),
            end: Position::zero_joints(),
            time: 0.0,
            par: [MotionParams::default(); MAX_JOINTS],
            center: Cart::ZERO,
            cnormal: Cart::new(0.0, 0.0, 1.0),
            turns: 0,
            sign: [1.0; MAX_JOINTS],
            uquat: Quat::IDENTITY,
            rot_angle: 0.0,
            rot_inv: 0.0,
            geom: WorldGeom::None,
            cj: [CjProfile::default(); MAX_JOINTS],
        }
    }
}

impl MotionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type(&mut self, mtype: MotionType) {
        self.mtype = mtype;
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    /// Limits for one joint of a joint/ujoint move.
    pub fn set_jpar(&mut self, i: usize, vel: f64, acc: f64, jerk: f64) -> GoResult<()> {
        if i >= MAX_JOINTS {
            return Err(GoError::RangeError);
        }
        self.par[i] = MotionParams { vel, acc, jerk };
        Ok(())
    }

    /// Translational limits of a world move.
    pub fn set_tpar(&mut self, vel: f64, acc: f64, jerk: f64) {
        self.par[0] = MotionParams { vel, acc, jerk };
    }

    /// Rotational limits of a world move.
    pub fn set_rpar(&mut self, vel: f64, acc: f64, jerk: f64) {
        self.par[1] = MotionParams { vel, acc, jerk };
    }

    /// Circle request: center, plane normal and extra turns.
    pub fn set_cpar(&mut self, center: Cart, normal: Cart, turns: i32) {
        self.center = center;
        self.cnormal = normal;
        self.turns = turns;
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time.max(0.0);
    }

    pub fn set_end_position(&mut self, end: Position) {
        self.end = end;
    }

    pub fn set_end_pose(&mut self, end: Pose) {
        self.end = Position::Pose(end);
    }
}

/// The queue itself. Segment storage is allocated once at init and reused
/// as a ring; the interp path never allocates.
pub struct MotionQueue {
    qtype: QueueType,
    here: Position,
    there: Position,
    space: Box<[MotionSpec]>,
    head: usize,
    number: usize,
    joint_num: usize,
    last_id: i32,
    deltat: f64,
    time: f64,
    timescale: TimeScale,
}

impl MotionQueue {
    /// Create a queue over `size` segment slots at cycle time `deltat`.
    pub fn new(size: usize, deltat: f64) -> GoResult<MotionQueue> {
        if size < 2 || deltat <= 0.0 {
            return Err(GoError::BadArgs);
        }
        Ok(MotionQueue {
            qtype: QueueType::None,
            here: Position::zero_joints(),
            there: Position::zero_joints(),
            space: vec![MotionSpec::default(); size].into_boxed_slice(),
            head: 0,
            number: 0,
            joint_num: MAX_JOINTS,
            last_id: 0,
            deltat,
            time: 0.0,
            timescale: TimeScale::new(1.0)?,
        })
    }

    /// Discard all motions and restart the clock; `here` is retained.
    pub fn reset(&mut self) {
        self.number = 0;
        self.time = 0.0;
        self.there = self.here;
    }

    /// Select the interpolation space. Resets the queue and re-seats the
    /// origin in the matching representation.
    pub fn set_type(&mut self, qtype: QueueType) {
        self.qtype = qtype;
        self.here = match qtype {
            QueueType::World => Position::identity_pose(),
            _ => Position::zero_joints(),
        };
        self.reset();
    }

    pub fn queue_type(&self) -> QueueType {
        self.qtype
    }

    pub fn set_joint_number(&mut self, joints: usize) -> GoResult<()> {
        if joints == 0 || joints > MAX_JOINTS {
            return Err(GoError::RangeError);
        }
        self.joint_num = joints;
        Ok(())
    }

    pub fn joint_number(&self) -> usize {
        self.joint_num
    }

    pub fn set_cycle_time(&mut self, deltat: f64) -> GoResult<()> {
        if deltat <= 0.0 {
            return Err(GoError::BadArgs);
        }
        self.deltat = deltat;
        Ok(())
    }

    /// Move the interpolation origin. Only legal with no queued motion.
    pub fn set_here(&mut self, here: &Position) -> GoResult<()> {
        if self.number != 0 {
            return Err(GoError::BadArgs);
        }
        match (self.qtype, here) {
            (QueueType::World, Position::Pose(_)) => {}
            (QueueType::Joint | QueueType::Ujoint, Position::Joint(_)) => {}
            _ => return Err(GoError::BadArgs),
        }
        self.here = *here;
        self.there = *here;
        Ok(())
    }

    /// Request a walked-in time scale change.
    pub fn set_scale(&mut self, scale: f64, v: f64, a: f64) -> GoResult<()> {
        self.timescale.set(scale, v, a)
    }

    pub fn scale(&self) -> f64 {
        self.timescale.scale()
    }

    pub fn is_empty(&self) -> bool {
        self.number == 0
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn size(&self) -> usize {
        self.space.len()
    }

    pub fn last_id(&self) -> i32 {
        self.last_id
    }

    /// Seed the id counter, e.g. after a restart.
    pub fn set_id(&mut self, id: i32) {
        self.last_id = id;
    }

    pub fn head(&self) -> Option<&MotionSpec> {
        if self.number == 0 { None } else { Some(&self.space[self.head]) }
    }

    /// Id of the motion being interpolated, or the last id when idle.
    pub fn motion_id(&self) -> i32 {
        self.head().map_or(self.last_id, |spec| spec.id)
    }

    pub fn here(&self) -> Position {
        self.here
    }

    pub fn there(&self) -> Position {
        self.there
    }

    /// Enqueue one segment. The segment's start is the queue's `there`;
    /// all derived geometry and profiles are computed here, so a bad
    /// request fails at append time rather than mid-motion.
    pub fn append(&mut self, request: &MotionSpec) -> GoResult<()> {
        if self.number >= self.space.len() {
            return Err(GoError::BadArgs);
        }
        let ok = matches!(
            (self.qtype, request.mtype),
            (QueueType::Joint, MotionType::Joint)
                | (QueueType::Ujoint, MotionType::Ujoint)
                | (
                    QueueType::World,
                    MotionType::Linear | MotionType::Circular | MotionType::Wrapped
                )
        );
        if !ok {
            return Err(GoError::BadArgs);
        }

        let mut spec = *request;
        spec.start = self.there;

        match spec.mtype {
            MotionType::Joint | MotionType::Ujoint => self.plan_joint(&mut spec)?,
            MotionType::Linear | MotionType::Wrapped => Self::plan_linear(&mut spec)?,
            MotionType::Circular => Self::plan_circular(&mut spec)?,
        }

        let slot = (self.head + self.number) % self.space.len();
        self.space[slot] = spec;
        self.number += 1;
        self.last_id = spec.id;
        self.there = spec.end;
        Ok(())
    }

    fn plan_joint(&self, spec: &mut MotionSpec) -> GoResult<()> {
        let s = *spec.start.as_joints()?;
        let e = *spec.end.as_joints()?;
        let mut totalt = 0.0f64;
        for i in 0..self.joint_num {
            let d = e[i] - s[i];
            spec.sign[i] = if d < 0.0 { -1.0 } else { 1.0 };
            spec.cj[i] = if d.abs() < DIST_FUZZ {
                CjProfile::default()
            } else {
                let p = spec.par[i];
                CjProfile::compute(d.abs(), p.vel, p.acc, p.jerk)?
            };
            totalt = totalt.max(spec.cj[i].tend);
        }
        // Coordinated joint moves stretch every joint to the slowest; a
        // requested duration stretches further. Uncoordinated moves each
        // run at their own pace.
        if spec.mtype == MotionType::Joint && totalt > 0.0 {
            if spec.time > totalt {
                totalt = spec.time;
            }
            for i in 0..self.joint_num {
                if spec.cj[i].tend > 0.0 {
                    spec.cj[i] = spec.cj[i].scale(totalt)?;
                }
            }
        }
        spec.totalt = totalt;
        Ok(())
    }

    fn plan_rotation(spec: &mut MotionSpec) -> GoResult<()> {
        let s = spec.start.as_pose()?;
        let e = spec.end.as_pose()?;
        let delta = s.rot.inv().mul(&e.rot);
        spec.uquat = delta;
        spec.rot_angle = delta.mag();
        spec.rot_inv = if spec.rot_angle > DIST_FUZZ { 1.0 / spec.rot_angle } else { 0.0 };
        spec.cj[1] = if spec.rot_angle < DIST_FUZZ {
            CjProfile::default()
        } else {
            let p = spec.par[1];
            CjProfile::compute(spec.rot_angle, p.vel, p.acc, p.jerk)?
        };
        Ok(())
    }

    fn align_world_times(spec: &mut MotionSpec) -> GoResult<()> {
        let mut totalt = spec.cj[0].tend.max(spec.cj[1].tend);
        if totalt > 0.0 && spec.time > totalt {
            totalt = spec.time;
        }
        for i in 0..2 {
            if spec.cj[i].tend > 0.0 {
                spec.cj[i] = spec.cj[i].scale(totalt)?;
            }
        }
        spec.totalt = totalt;
        Ok(())
    }

    fn plan_linear(spec: &mut MotionSpec) -> GoResult<()> {
        Self::plan_rotation(spec)?;
        let s = *spec.start.as_pose()?;
        let e = *spec.end.as_pose()?;
        let dvec = e.tran.sub(&s.tran);
        let dist = dvec.mag();
        if dist < DIST_FUZZ && spec.rot_angle > DIST_FUZZ {
            // No direction to ride the rotation along.
            return Err(GoError::BadArgs);
        }
        let uvec = if dist < DIST_FUZZ { Cart::ZERO } else { dvec.scale(1.0 / dist) };
        spec.geom = WorldGeom::Linear(LinearParams { uvec });
        spec.cj[0] = if dist < DIST_FUZZ {
            CjProfile::default()
        } else {
            let p = spec.par[0];
            CjProfile::compute(dist, p.vel, p.acc, p.jerk)?
        };
        Self::align_world_times(spec)
    }

    fn plan_circular(spec: &mut MotionSpec) -> GoResult<()> {
        let s = *spec.start.as_pose()?;
        let e = *spec.end.as_pose()?;
        let n = spec.cnormal;
        if !n.is_norm() {
            return Err(GoError::BadArgs);
        }

        let vs = s.tran.sub(&spec.center);
        let zstart = vs.dot(&n);
        let rv_s = vs.sub(&n.scale(zstart));
        let rstart = rv_s.mag();

        let ve = e.tran.sub(&spec.center);
        let zend = ve.dot(&n);
        let rv_e = ve.sub(&n.scale(zend));
        let rend = rv_e.mag();

        if rstart < DIST_FUZZ || rend < DIST_FUZZ {
            // Center in line with the endpoints: no circle plane is
            // determined, fall back to a straight move between them.
            spec.mtype = MotionType::Linear;
            return Self::plan_linear(spec);
        }

        let urcsp = rv_s.scale(1.0 / rstart);
        let urce = rv_e.scale(1.0 / rend);
        let partial = n.dot(&urcsp.cross(&urce)).atan2(urcsp.dot(&urce));
        let two_pi = gom_math::scalar::TWO_PI;
        let thtot = if spec.turns >= 0 {
            let p = if partial < 0.0 { partial + two_pi } else { partial };
            p + spec.turns as f64 * two_pi
        } else {
            let p = if partial > 0.0 { partial - two_pi } else { partial };
            p + (spec.turns + 1) as f64 * two_pi
        };
        let rtot = rend - rstart;
        let ztot = zend - zstart;
        let ravg = 0.5 * (rstart + rend);
        let arc = (thtot * ravg).hypot(rtot.hypot(ztot));
        let stotinv = if arc > DIST_FUZZ { 1.0 / arc } else { 0.0 };

        spec.geom = WorldGeom::Circular(CircularParams {
            center: spec.center,
            normal: n,
            urcsp,
            rstart,
            zstart,
            thtot,
            rtot,
            ztot,
            stotinv,
            turns: spec.turns,
        });

        Self::plan_rotation(spec)?;
        spec.cj[0] = if arc < DIST_FUZZ {
            CjProfile::default()
        } else {
            let p = spec.par[0];
            CjProfile::compute(arc, p.vel, p.acc, p.jerk)?
        };
        Self::align_world_times(spec)
    }

    /// Sample a segment at segment-local time `t`.
    fn sample(&self, spec: &MotionSpec, t: f64) -> Position {
        match spec.mtype {
            MotionType::Joint | MotionType::Ujoint => {
                let mut out = match spec.start {
                    Position::Joint(j) => j,
                    Position::Pose(_) => [0.0; MAX_JOINTS],
                };
                for i in 0..self.joint_num {
                    out[i] += spec.sign[i] * spec.cj[i].interp(t).d;
                }
                Position::Joint(out)
            }
            MotionType::Linear | MotionType::Wrapped | MotionType::Circular => {
                let start = match spec.start {
                    Position::Pose(p) => p,
                    Position::Joint(_) => Pose::IDENTITY,
                };
                let tran = match &spec.geom {
                    WorldGeom::Linear(lin) => {
                        let d = spec.cj[0].interp(t).d;
                        start.tran.add(&lin.uvec.scale(d))
                    }
                    WorldGeom::Circular(c) => {
                        let sfrac = spec.cj[0].interp(t).d * c.stotinv;
                        let theta = sfrac * c.thtot;
                        let r = c.rstart + sfrac * c.rtot;
                        let z = c.zstart + sfrac * c.ztot;
                        let radial = c
                            .urcsp
                            .scale(theta.cos())
                            .add(&c.normal.cross(&c.urcsp).scale(theta.sin()));
                        c.center.add(&radial.scale(r)).add(&c.normal.scale(z))
                    }
                    WorldGeom::None => start.tran,
                };
                let frac = spec.cj[1].interp(t).d * spec.rot_inv;
                let rot = start.rot.mul(&spec.uquat.pow(frac));
                Position::Pose(Pose { tran, rot })
            }
        }
    }

    /// Advance one cycle of scaled time and return the interpolated
    /// position. Completed segments retire, carrying leftover time into
    /// the next one.
    pub fn interp(&mut self) -> GoResult<Position> {
        if self.number == 0 {
            return Ok(self.here);
        }

        let scale = self.timescale.eval(self.deltat);
        self.time += self.deltat * scale;

        while self.number > 0 {
            let spec = self.space[self.head];
            if self.time < spec.totalt {
                return Ok(self.sample(&spec, self.time));
            }
            // Retire; the profile's own terminal position is the new
            // origin (a stopped segment ends short of its request).
            self.here = spec.end;
            self.time -= spec.totalt;
            self.head = (self.head + 1) % self.space.len();
            self.number -= 1;
        }
        self.time = 0.0;
        self.there = self.here;
        Ok(self.here)
    }

    /// Replan the active segment to brake now and drop everything queued
    /// behind it.
    pub fn stop(&mut self) -> GoResult<()> {
        if self.number == 0 {
            return Ok(());
        }
        let t = self.time;
        let joint_num = self.joint_num;
        let spec = &mut self.space[self.head];
        let active: usize = match spec.mtype {
            MotionType::Joint | MotionType::Ujoint => joint_num,
            _ => 2,
        };
        let mut totalt = 0.0f64;
        for i in 0..active {
            if spec.cj[i].tend > 0.0 {
                spec.cj[i] = spec.cj[i].stop(t)?;
            }
            totalt = totalt.max(spec.cj[i].tend);
        }
        spec.totalt = totalt;
        let spec = self.space[self.head];
        let end = self.sample(&spec, f64::INFINITY);
        self.space[self.head].end = end;
        self.number = 1;
        self.there = end;
        Ok(())
    }

    /// Replan a single joint of the active ujoint segment to brake now,
    /// leaving the other joints running. Used when a homing joint finds
    /// its latch mid-move.
    pub fn stop_joint(&mut self, joint: usize) -> GoResult<()> {
        if joint >= self.joint_num {
            return Err(GoError::RangeError);
        }
        if self.number == 0 {
            return Ok(());
        }
        let t = self.time;
        let spec = &mut self.space[self.head];
        if !matches!(spec.mtype, MotionType::Joint | MotionType::Ujoint) {
            return Err(GoError::BadArgs);
        }
        if spec.cj[joint].tend > 0.0 {
            spec.cj[joint] = spec.cj[joint].stop(t)?;
        }
        let mut totalt = 0.0f64;
        for i in 0..self.joint_num {
            totalt = totalt.max(spec.cj[i].tend);
        }
        spec.totalt = totalt;
        let spec = self.space[self.head];
        let end = self.sample(&spec, f64::INFINITY);
        self.space[self.head].end = end;
        if self.number == 1 {
            self.there = end;
        }
        Ok(())
    }

    /// Shift one joint's coordinates by `delta` across the origin, the
    /// target and everything queued. The traj loop uses this when a
    /// homing latch redefines a joint's frame mid-motion: the queued
    /// positions move into the new frame so the raw setpoints stay
    /// continuous.
    pub fn rebase_joint(&mut self, joint: usize, delta: f64) -> GoResult<()> {
        if joint >= self.joint_num {
            return Err(GoError::RangeError);
        }
        let shift = |pos: &mut Position| {
            if let Position::Joint(j) = pos {
                j[joint] += delta;
            }
        };
        shift(&mut self.here);
        shift(&mut self.there);
        for k in 0..self.number {
            let slot = (self.head + k) % self.space.len();
            shift(&mut self.space[slot].start);
            shift(&mut self.space[slot].end);
        }
        Ok(())
    }

    /// Drop everything behind the active segment.
    pub fn drop_pending(&mut self) {
        if self.number > 1 {
            self.number = 1;
        }
        self.there = if self.number == 1 { self.space[self.head].end } else { self.here };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gom_math::Rvec;

    fn joint_queue(n: usize) -> MotionQueue {
        let mut q = MotionQueue::new(8, 0.01).unwrap();
        q.set_type(QueueType::Joint);
        q.set_joint_number(n).unwrap();
        q
    }

    fn world_queue() -> MotionQueue {
        let mut q = MotionQueue::new(8, 0.01).unwrap();
        q.set_type(QueueType::World);
        q
    }

    fn joint_move(id: i32, target: &[f64]) -> MotionSpec {
        let mut spec = MotionSpec::new();
        spec.set_type(MotionType::Joint);
        spec.set_id(id);
        let mut end = [0.0; MAX_JOINTS];
        end[..target.len()].copy_from_slice(target);
        for i in 0..MAX_JOINTS {
            spec.set_jpar(i, 1.0, 1.0, 1.0).unwrap();
        }
        spec.set_end_position(Position::Joint(end));
        spec
    }

    #[test]
    fn composition_visits_targets_in_order() {
        let mut q = joint_queue(2);
        let targets = [[1.0, -0.5], [2.0, 0.5], [0.0, 0.0]];
        for (k, t) in targets.iter().enumerate() {
            q.append(&joint_move(k as i32 + 1, t)).unwrap();
        }
        assert_eq!(q.number(), 3);
        assert_eq!(q.last_id(), 3);

        let mut visited = Vec::new();
        let mut guard = 0;
        while !q.is_empty() {
            let pos = q.interp().unwrap();
            let j = *pos.as_joints().unwrap();
            visited.push(j);
            guard += 1;
            assert!(guard < 100_000, "queue never drained");
        }
        // The final position is the last target.
        let last = visited.last().unwrap();
        assert!((last[0] - 0.0).abs() < 1e-6);
        assert!((last[1] - 0.0).abs() < 1e-6);
        // Each intermediate target is passed through (within a cycle).
        for t in &targets {
            let hit = visited
                .iter()
                .any(|j| (j[0] - t[0]).abs() < 2e-2 && (j[1] - t[1]).abs() < 2e-2);
            assert!(hit, "target {t:?} never approached");
        }
        assert!(q.is_empty());
        assert_eq!(q.last_id(), 3);
    }

    #[test]
    fn joint_axes_time_aligned() {
        let mut q = joint_queue(2);
        // Joint 0 moves 4 units, joint 1 moves 1: both must finish
        // together, so joint 1 runs slower than its limits allow.
        q.append(&joint_move(1, &[4.0, 1.0])).unwrap();
        let spec = *q.head().unwrap();
        assert!((spec.cj[0].tend - spec.cj[1].tend).abs() < 1e-9);
        assert!((spec.totalt - spec.cj[0].tend).abs() < 1e-9);
    }

    #[test]
    fn zero_length_segment_retires_in_one_cycle() {
        let mut q = joint_queue(1);
        q.append(&joint_move(1, &[0.0])).unwrap();
        assert!(!q.is_empty());
        let pos = q.interp().unwrap();
        assert!((pos.as_joints().unwrap()[0]).abs() < 1e-12);
        assert!(q.is_empty());
    }

    #[test]
    fn full_queue_rejected() {
        let mut q = MotionQueue::new(2, 0.01).unwrap();
        q.set_type(QueueType::Joint);
        q.set_joint_number(1).unwrap();
        q.append(&joint_move(1, &[1.0])).unwrap();
        q.append(&joint_move(2, &[2.0])).unwrap();
        assert_eq!(q.append(&joint_move(3, &[3.0])).unwrap_err(), GoError::BadArgs);
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut q = world_queue();
        assert_eq!(q.append(&joint_move(1, &[1.0])).unwrap_err(), GoError::BadArgs);
    }

    #[test]
    fn set_here_requires_empty_queue_and_matching_space() {
        let mut q = joint_queue(1);
        let mut j = [0.0; MAX_JOINTS];
        j[0] = 0.25;
        q.set_here(&Position::Joint(j)).unwrap();
        assert_eq!(q.here().as_joints().unwrap()[0], 0.25);
        assert!(q.set_here(&Position::identity_pose()).is_err());
        q.append(&joint_move(1, &[1.0])).unwrap();
        assert!(q.set_here(&Position::Joint(j)).is_err());
    }

    fn linear_move(id: i32, end: Pose) -> MotionSpec {
        let mut spec = MotionSpec::new();
        spec.set_type(MotionType::Linear);
        spec.set_id(id);
        spec.set_tpar(1.0, 1.0, 1.0);
        spec.set_rpar(1.0, 1.0, 1.0);
        spec.set_end_pose(end);
        spec
    }

    #[test]
    fn linear_move_stays_on_the_line() {
        let mut q = world_queue();
        let end = Pose::new(Cart::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        q.append(&linear_move(1, end)).unwrap();
        let mut guard = 0;
        while !q.is_empty() {
            let pose = *q.interp().unwrap().as_pose().unwrap();
            // On the x axis, rotation stays identity.
            assert!(pose.tran.y.abs() < 1e-9);
            assert!(pose.tran.z.abs() < 1e-9);
            assert!(pose.tran.x >= -1e-9 && pose.tran.x <= 1.0 + 1e-9);
            assert!(pose.rot.is_close(&Quat::IDENTITY));
            guard += 1;
            assert!(guard < 100_000);
        }
        assert!(q.here().as_pose().unwrap().tran.is_close(&end.tran));
    }

    #[test]
    fn linear_move_slerps_rotation() {
        let mut q = world_queue();
        let end_rot = Rvec::new(0.0, 0.0, 1.0).to_quat();
        let end = Pose::new(Cart::new(1.0, 0.0, 0.0), end_rot);
        q.append(&linear_move(1, end)).unwrap();
        let mut guard = 0;
        while !q.is_empty() {
            let pose = *q.interp().unwrap().as_pose().unwrap();
            // Rotation axis is always z; fraction matches translation
            // progress because both profiles are time-aligned over equal
            // distances (1 m and 1 rad).
            let rv = pose.rot.to_rvec();
            assert!(rv.x.abs() < 1e-9 && rv.y.abs() < 1e-9);
            assert!((rv.z - pose.tran.x).abs() < 1e-6);
            guard += 1;
            assert!(guard < 100_000);
        }
        assert!(q.here().as_pose().unwrap().rot.is_close(&end_rot));
    }

    #[test]
    fn pure_rotation_linear_move_rejected() {
        let mut q = world_queue();
        let end = Pose::new(Cart::ZERO, Rvec::new(0.0, 0.0, 1.0).to_quat());
        assert_eq!(q.append(&linear_move(1, end)).unwrap_err(), GoError::BadArgs);
    }

    #[test]
    fn circular_move_stays_on_the_circle() {
        let mut q = world_queue();
        let mut start_pose = Pose::new(Cart::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        q.set_here(&Position::Pose(start_pose)).unwrap();

        let mut spec = MotionSpec::new();
        spec.set_type(MotionType::Circular);
        spec.set_id(1);
        spec.set_tpar(1.0, 1.0, 1.0);
        spec.set_rpar(1.0, 1.0, 1.0);
        spec.set_cpar(Cart::ZERO, Cart::new(0.0, 0.0, 1.0), 0);
        spec.set_end_pose(Pose::new(Cart::new(-1.0, 0.0, 0.0), Quat::IDENTITY));
        q.append(&spec).unwrap();

        let mut max_theta: f64 = 0.0;
        let mut guard = 0;
        while !q.is_empty() {
            let pose = *q.interp().unwrap().as_pose().unwrap();
            let r = (pose.tran.x * pose.tran.x + pose.tran.y * pose.tran.y).sqrt();
            assert!((r - 1.0).abs() < 1e-6, "left the unit circle: r = {r}");
            assert!(pose.tran.z.abs() < 1e-9);
            // CCW half circle: y stays non-negative.
            assert!(pose.tran.y > -1e-9);
            max_theta = max_theta.max(pose.tran.y.atan2(pose.tran.x));
            start_pose = pose;
            guard += 1;
            assert!(guard < 100_000);
        }
        assert!(start_pose.tran.is_close(&Cart::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn degenerate_circle_falls_back_to_linear() {
        let mut q = world_queue();
        let start = Pose::new(Cart::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        q.set_here(&Position::Pose(start)).unwrap();
        let mut spec = MotionSpec::new();
        spec.set_type(MotionType::Circular);
        spec.set_tpar(1.0, 1.0, 1.0);
        spec.set_rpar(1.0, 1.0, 1.0);
        // Center on the start point.
        spec.set_cpar(Cart::new(1.0, 0.0, 0.0), Cart::new(0.0, 0.0, 1.0), 0);
        spec.set_end_pose(Pose::new(Cart::new(2.0, 0.0, 0.0), Quat::IDENTITY));
        q.append(&spec).unwrap();
        assert_eq!(q.head().unwrap().mtype, MotionType::Linear);
    }

    #[test]
    fn nonunit_normal_rejected() {
        let mut q = world_queue();
        let start = Pose::new(Cart::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        q.set_here(&Position::Pose(start)).unwrap();
        let mut spec = MotionSpec::new();
        spec.set_type(MotionType::Circular);
        spec.set_tpar(1.0, 1.0, 1.0);
        spec.set_rpar(1.0, 1.0, 1.0);
        spec.set_cpar(Cart::ZERO, Cart::new(0.0, 0.0, 2.0), 0);
        spec.set_end_pose(Pose::new(Cart::new(-1.0, 0.0, 0.0), Quat::IDENTITY));
        assert_eq!(q.append(&spec).unwrap_err(), GoError::BadArgs);
    }

    #[test]
    fn stop_in_flight_halts_between_endpoints() {
        let mut q = joint_queue(1);
        q.append(&joint_move(1, &[10.0])).unwrap();
        q.append(&joint_move(2, &[20.0])).unwrap();
        let planned = q.head().unwrap().totalt;

        // Run half the move, then stop.
        let half_cycles = (0.5 * planned / 0.01) as usize;
        for _ in 0..half_cycles {
            q.interp().unwrap();
        }
        q.stop().unwrap();
        assert_eq!(q.number(), 1, "pending motion must be dropped");

        let mut last = [0.0; MAX_JOINTS];
        let mut guard = 0;
        while !q.is_empty() {
            last = *q.interp().unwrap().as_joints().unwrap();
            guard += 1;
            assert!(guard < 100_000);
        }
        assert!(last[0] > 0.0 && last[0] < 10.0, "stopped at {}", last[0]);
        // The queue's resting point agrees with where it stopped.
        assert!((q.here().as_joints().unwrap()[0] - last[0]).abs() < 1e-9);
    }

    #[test]
    fn time_scale_slows_motion_without_changing_path() {
        let mut q = joint_queue(1);
        q.append(&joint_move(1, &[1.0])).unwrap();
        let nominal = q.head().unwrap().totalt;
        q.set_scale(0.5, 50.0, 50.0).unwrap();

        let mut cycles = 0;
        let mut last = [0.0; MAX_JOINTS];
        while !q.is_empty() {
            last = *q.interp().unwrap().as_joints().unwrap();
            cycles += 1;
            assert!(cycles < 100_000);
        }
        // Total distance unchanged; duration roughly doubled.
        assert!((last[0] - 1.0).abs() < 1e-6);
        let elapsed = cycles as f64 * 0.01;
        assert!(elapsed > 1.8 * nominal, "scale had no effect: {elapsed} vs {nominal}");
    }

    #[test]
    fn requested_time_stretches_move() {
        let mut q = joint_queue(1);
        let mut spec = joint_move(1, &[1.0]);
        spec.set_time(10.0);
        q.append(&spec).unwrap();
        assert!((q.head().unwrap().totalt - 10.0).abs() < 1e-9);
    }
}
