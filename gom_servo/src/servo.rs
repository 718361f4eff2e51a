//! The per-joint servo loop.
//!
//! A periodic state machine over one joint: read the command record, read
//! the measured position from the external interface, run homing if
//! requested, close the loop with PID + feedforward, write the raw
//! output, and publish status last. Faults latch until an explicit init.
//!
//! The servo works entirely in its raw startup coordinates; the traj
//! loop owns the homed frame and applies the joint offsets on both
//! sides.

use gom_common::comm::{
    PingPongReader, ServoCfg, ServoCfgMsg, ServoCmdMsg, ServoCmdType, ServoComm, ServoFaultFlags,
    ServoSetMsg, ServoState, ServoStatMsg,
};
use gom_common::config::ServoSection;
use gom_hal::ExtInterface;
use tracing::{debug, info, warn};

use crate::pid::{Pid, PidGains};

/// One joint's servo task state.
pub struct ServoLoop {
    joint: usize,
    state: ServoState,
    cycle_time: f64,

    gains: PidGains,
    pid: Pid,
    min_limit: f64,
    max_limit: f64,
    ferror_limit: f64,

    setpoint: f64,
    ff_vel: f64,
    ff_acc: f64,
    input: f64,
    prev_input: f64,
    input_vel: f64,
    homing: bool,
    homed: bool,
    input_latch: f64,
    faults: ServoFaultFlags,
    heartbeat: u64,

    cmd_reader: PingPongReader<ServoCmdMsg>,
    cfg_reader: PingPongReader<ServoCfgMsg>,
    last_cmd_serial: u32,
    last_cfg_serial: u32,
}

impl ServoLoop {
    /// Build the loop for `joint` from its config section. The external
    /// interface joint must already be initialized by the harness.
    pub fn new(joint: usize, section: &ServoSection, cycle_time: f64) -> Self {
        let gains = PidGains {
            kp: section.pid.p,
            ki: section.pid.i,
            kd: section.pid.d,
            vff: section.pid.vff,
            aff: section.pid.aff,
            i_max: section.pid.i_max,
            out_max: section.pid.out_max,
            tf: section.pid.tf,
        };
        Self {
            joint,
            state: ServoState::Uninit,
            cycle_time,
            gains,
            pid: Pid::default(),
            min_limit: section.min_limit,
            max_limit: section.max_limit,
            ferror_limit: section.ferror_limit,
            setpoint: 0.0,
            ff_vel: 0.0,
            ff_acc: 0.0,
            input: 0.0,
            prev_input: 0.0,
            input_vel: 0.0,
            homing: false,
            homed: false,
            input_latch: 0.0,
            faults: ServoFaultFlags::empty(),
            heartbeat: 0,
            cmd_reader: PingPongReader::new(ServoCmdMsg::default()),
            cfg_reader: PingPongReader::new(ServoCfgMsg::default()),
            last_cmd_serial: 0,
            last_cfg_serial: 0,
        }
    }

    pub fn state(&self) -> ServoState {
        self.state
    }

    fn fault(&mut self, flag: ServoFaultFlags) {
        if !self.faults.contains(flag) {
            warn!(joint = self.joint, ?flag, "servo fault latched");
        }
        self.faults |= flag;
        self.state = ServoState::Fault;
    }

    fn apply_config(&mut self, cfg: &ServoCfg, ext: &mut dyn ExtInterface) {
        match *cfg {
            ServoCfg::Nop => {}
            ServoCfg::CycleTime(dt) => {
                if dt > 0.0 {
                    self.cycle_time = dt;
                }
            }
            ServoCfg::Pid { p, i, d, vff, aff, i_max, out_max, tf } => {
                self.gains = PidGains { kp: p, ki: i, kd: d, vff, aff, i_max, out_max, tf };
                self.pid.reset();
            }
            ServoCfg::Limit { min, max } => {
                if min < max {
                    self.min_limit = min;
                    self.max_limit = max;
                }
            }
            ServoCfg::FerrorLimit(limit) => {
                self.ferror_limit = limit.max(0.0);
            }
            ServoCfg::Parameters { values, num } => {
                let n = num.min(values.len());
                if ext.set_parameters(self.joint, &values[..n]).is_err() {
                    self.fault(ServoFaultFlags::EXT_FAULT);
                }
            }
        }
    }

    fn publish_set(&self, comm: &ServoComm, echo_serial: u32) {
        comm.set.write(&ServoSetMsg {
            echo_serial,
            cycle_time: self.cycle_time,
            p: self.gains.kp,
            i: self.gains.ki,
            d: self.gains.kd,
            vff: self.gains.vff,
            aff: self.gains.aff,
            i_max: self.gains.i_max,
            out_max: self.gains.out_max,
            tf: self.gains.tf,
            min_limit: self.min_limit,
            max_limit: self.max_limit,
            ferror_limit: self.ferror_limit,
        });
    }

    /// Run one servo cycle. Returns `false` once the loop has shut down.
    pub fn cycle(&mut self, comm: &ServoComm, ext: &mut dyn ExtInterface) -> bool {
        // ── Command intake ──────────────────────────────────────────
        self.cmd_reader.update(&comm.cmd);
        let cmd = *self.cmd_reader.get();
        let fresh = cmd.serial != self.last_cmd_serial;
        if fresh {
            self.last_cmd_serial = cmd.serial;
        }

        // ── Measured input ──────────────────────────────────────────
        self.prev_input = self.input;
        if ext.read_pos(self.joint, &mut self.input).is_err() {
            self.fault(ServoFaultFlags::EXT_FAULT);
        }
        if self.heartbeat > 0 && self.cycle_time > 0.0 {
            self.input_vel = (self.input - self.prev_input) / self.cycle_time;
        }

        match cmd.cmd_type {
            ServoCmdType::Init if fresh => {
                // Explicit init is the only way out of a latched fault.
                self.faults = ServoFaultFlags::empty();
                self.pid.reset();
                self.setpoint = self.input;
                self.ff_vel = 0.0;
                self.ff_acc = 0.0;
                self.homing = false;
                let _ = ext.joint_enable(self.joint);
                self.state = ServoState::Enabled;
                info!(joint = self.joint, "servo initialized");
            }
            ServoCmdType::Abort if fresh => {
                let _ = ext.write_vel(self.joint, 0.0);
                let _ = ext.joint_disable(self.joint);
                self.pid.reset();
                self.state = ServoState::Init;
            }
            ServoCmdType::Halt if fresh => {
                self.setpoint = self.input;
                self.ff_vel = 0.0;
                self.ff_acc = 0.0;
            }
            ServoCmdType::Shutdown if fresh => {
                let _ = ext.write_vel(self.joint, 0.0);
                let _ = ext.joint_quit(self.joint);
                self.state = ServoState::Shutdown;
            }
            ServoCmdType::Servo if !cmd.enable => {
                // Tracking command with the drive enable cleared: drop
                // back to the disabled state without latching a fault.
                if fresh && self.state.is_active() {
                    let _ = ext.write_vel(self.joint, 0.0);
                    let _ = ext.joint_disable(self.joint);
                    self.pid.reset();
                    self.state = ServoState::Init;
                }
            }
            ServoCmdType::Servo => {
                if self.state.is_active() && !cmd.home {
                    self.setpoint = cmd.setpoint;
                    self.ff_vel = cmd.ff_vel;
                    self.ff_acc = cmd.ff_acc;
                }
                // ── Homing handshake ────────────────────────────────
                if cmd.home && self.state.is_active() {
                    if !self.homing {
                        self.homing = true;
                        self.homed = false;
                        if ext.joint_home(self.joint).is_err() {
                            self.fault(ServoFaultFlags::HOME_FAILED);
                        } else {
                            self.state = ServoState::Homing;
                            debug!(joint = self.joint, "homing requested");
                        }
                    }
                    // During the search the setpoint keeps tracking so the
                    // homing move commanded by traj actually happens.
                    self.setpoint = cmd.setpoint;
                    self.ff_vel = cmd.ff_vel;
                    self.ff_acc = cmd.ff_acc;
                    if self.state == ServoState::Homing && ext.joint_is_home(self.joint) {
                        let mut latch = 0.0;
                        if ext.joint_home_latch(self.joint, &mut latch).is_ok() {
                            // homed and input_latch go out in one status
                            // record, so readers see them together.
                            self.input_latch = latch;
                            self.homed = true;
                            self.state = ServoState::Homed;
                            info!(joint = self.joint, latch, "servo homed");
                        } else {
                            self.fault(ServoFaultFlags::HOME_FAILED);
                        }
                    }
                } else if !cmd.home && self.homing {
                    // Traj abandoned or acknowledged the homing cycle.
                    self.homing = false;
                    if self.state == ServoState::Homing {
                        self.state = ServoState::Enabled;
                    }
                }
            }
            _ => {}
        }

        // ── Config intake ───────────────────────────────────────────
        self.cfg_reader.update(&comm.cfg);
        let cfg = *self.cfg_reader.get();
        if cfg.serial != self.last_cfg_serial {
            self.last_cfg_serial = cfg.serial;
            self.apply_config(&cfg.cfg, ext);
            self.publish_set(comm, cfg.serial);
        }

        // ── Control ─────────────────────────────────────────────────
        let ferror = self.setpoint - self.input;
        if self.state.is_active() {
            if self.ferror_limit > 0.0 && ferror.abs() > self.ferror_limit {
                self.fault(ServoFaultFlags::FERROR);
            }
            if self.input < self.min_limit || self.input > self.max_limit {
                self.fault(ServoFaultFlags::OVERTRAVEL);
            }
        }

        if self.state.is_active() {
            let out = self.pid.compute(
                &self.gains,
                ferror,
                self.input,
                self.ff_vel,
                self.ff_acc,
                self.cycle_time,
            );
            if ext.write_vel(self.joint, out).is_err() {
                self.fault(ServoFaultFlags::EXT_FAULT);
            }
        } else if self.state == ServoState::Fault {
            let _ = ext.write_vel(self.joint, 0.0);
        }

        // ── Status out, last ────────────────────────────────────────
        self.heartbeat += 1;
        comm.stat.write(&ServoStatMsg {
            echo_serial: self.last_cmd_serial,
            state: self.state,
            heartbeat: self.heartbeat,
            input: self.input,
            input_vel: self.input_vel,
            homing: self.homing,
            homed: self.homed,
            input_latch: self.input_latch,
            ferror,
            faults: self.faults,
            cycle_time: self.cycle_time,
        });

        self.state != ServoState::Shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gom_common::config::{PidCfg, ServoSection};
    use gom_hal::stub::StubInterface;

    fn section(p: f64) -> ServoSection {
        ServoSection {
            pid: PidCfg { p, out_max: 100.0, ..Default::default() },
            ferror_limit: 0.0,
            ..Default::default()
        }
    }

    fn send_cmd(comm: &ServoComm, serial: u32, cmd_type: ServoCmdType, setpoint: f64, home: bool) {
        comm.cmd.write(&ServoCmdMsg {
            serial,
            cmd_type,
            setpoint,
            ff_vel: 0.0,
            ff_acc: 0.0,
            home,
            enable: true,
        });
    }

    fn make_ready(loopp: &mut ServoLoop, comm: &ServoComm, ext: &mut StubInterface) {
        send_cmd(comm, 1, ServoCmdType::Init, 0.0, false);
        loopp.cycle(comm, ext);
        assert_eq!(loopp.state(), ServoState::Enabled);
    }

    #[test]
    fn init_enables_and_holds_position() {
        let mut ext = StubInterface::new();
        ext.init("").unwrap();
        ext.joint_init(0, 0.001).unwrap();
        ext.write_pos(0, 0.5).unwrap();

        let comm = ServoComm::new();
        let mut servo = ServoLoop::new(0, &section(100.0), 0.001);
        make_ready(&mut servo, &comm, &mut ext);

        // With no new command the servo holds where it initialized.
        for _ in 0..100 {
            servo.cycle(&comm, &mut ext);
        }
        let mut reader = PingPongReader::new(ServoStatMsg::default());
        reader.update(&comm.stat);
        let stat = reader.get();
        assert!((stat.input - 0.5).abs() < 1e-3, "drifted to {}", stat.input);
    }

    #[test]
    fn tracks_setpoint() {
        let mut ext = StubInterface::new();
        ext.init("").unwrap();
        ext.joint_init(0, 0.001).unwrap();

        let comm = ServoComm::new();
        let mut servo = ServoLoop::new(0, &section(100.0), 0.001);
        make_ready(&mut servo, &comm, &mut ext);

        send_cmd(&comm, 2, ServoCmdType::Servo, 1.0, false);
        for _ in 0..2000 {
            servo.cycle(&comm, &mut ext);
        }
        let mut pos = 0.0;
        ext.read_pos(0, &mut pos).unwrap();
        assert!((pos - 1.0).abs() < 1e-2, "did not converge: {pos}");
    }

    #[test]
    fn homing_latches_and_publishes_atomically() {
        let mut ext = StubInterface::new();
        ext.init("").unwrap();
        ext.joint_init(0, 0.001).unwrap();
        ext.write_pos(0, 0.37).unwrap();

        let comm = ServoComm::new();
        let mut servo = ServoLoop::new(0, &section(100.0), 0.001);
        make_ready(&mut servo, &comm, &mut ext);

        send_cmd(&comm, 2, ServoCmdType::Servo, 0.37, true);
        for _ in 0..5 {
            servo.cycle(&comm, &mut ext);
        }
        let mut reader = PingPongReader::new(ServoStatMsg::default());
        reader.update(&comm.stat);
        let stat = *reader.get();
        assert!(stat.homed);
        assert!((stat.input_latch - 0.37).abs() < 1e-9);
        assert_eq!(stat.state, ServoState::Homed);
    }

    #[test]
    fn ferror_fault_latches_until_init() {
        let mut ext = StubInterface::new();
        ext.init("").unwrap();
        ext.joint_init(0, 0.001).unwrap();

        let mut sec = section(0.0); // no drive at all
        sec.ferror_limit = 0.1;
        let comm = ServoComm::new();
        let mut servo = ServoLoop::new(0, &sec, 0.001);
        make_ready(&mut servo, &comm, &mut ext);

        // Command far away; with no gains the error cannot close.
        send_cmd(&comm, 2, ServoCmdType::Servo, 5.0, false);
        for _ in 0..10 {
            servo.cycle(&comm, &mut ext);
        }
        assert_eq!(servo.state(), ServoState::Fault);

        // Still faulted on further cycles.
        send_cmd(&comm, 3, ServoCmdType::Servo, 0.0, false);
        servo.cycle(&comm, &mut ext);
        assert_eq!(servo.state(), ServoState::Fault);

        // Init clears.
        send_cmd(&comm, 4, ServoCmdType::Init, 0.0, false);
        servo.cycle(&comm, &mut ext);
        assert_eq!(servo.state(), ServoState::Enabled);
    }

    #[test]
    fn config_echoes_settings() {
        let mut ext = StubInterface::new();
        ext.init("").unwrap();
        ext.joint_init(0, 0.001).unwrap();

        let comm = ServoComm::new();
        let mut servo = ServoLoop::new(0, &section(1.0), 0.001);
        make_ready(&mut servo, &comm, &mut ext);

        comm.cfg.write(&ServoCfgMsg {
            serial: 1,
            cfg: ServoCfg::Pid {
                p: 42.0,
                i: 1.0,
                d: 0.5,
                vff: 0.1,
                aff: 0.0,
                i_max: 10.0,
                out_max: 20.0,
                tf: 0.01,
            },
        });
        servo.cycle(&comm, &mut ext);

        let mut reader = PingPongReader::new(ServoSetMsg::default());
        reader.update(&comm.set);
        let set = reader.get();
        assert_eq!(set.echo_serial, 1);
        assert_eq!(set.p, 42.0);
        assert_eq!(set.out_max, 20.0);
    }

    #[test]
    fn clearing_enable_disables_drive() {
        let mut ext = StubInterface::new();
        ext.init("").unwrap();
        ext.joint_init(0, 0.001).unwrap();

        let comm = ServoComm::new();
        let mut servo = ServoLoop::new(0, &section(100.0), 0.001);
        make_ready(&mut servo, &comm, &mut ext);

        comm.cmd.write(&ServoCmdMsg {
            serial: 2,
            cmd_type: ServoCmdType::Servo,
            setpoint: 1.0,
            enable: false,
            ..Default::default()
        });
        servo.cycle(&comm, &mut ext);
        assert_eq!(servo.state(), ServoState::Init);

        // Re-init brings the drive back.
        send_cmd(&comm, 3, ServoCmdType::Init, 0.0, false);
        servo.cycle(&comm, &mut ext);
        assert_eq!(servo.state(), ServoState::Enabled);
    }

    #[test]
    fn shutdown_ends_the_loop() {
        let mut ext = StubInterface::new();
        ext.init("").unwrap();
        ext.joint_init(0, 0.001).unwrap();

        let comm = ServoComm::new();
        let mut servo = ServoLoop::new(0, &section(1.0), 0.001);
        make_ready(&mut servo, &comm, &mut ext);

        send_cmd(&comm, 2, ServoCmdType::Shutdown, 0.0, false);
        assert!(!servo.cycle(&comm, &mut ext));
        assert_eq!(servo.state(), ServoState::Shutdown);
    }
}
