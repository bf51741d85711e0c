//! End-to-end: host bytes in, board responses and actuator calls out, with the
//! watchdog running against the same supervisor.

use crate::mock_hw::{ActuatorCall, HostLink, RecordingActuator, ScriptedSensors};
use propulsion_supervisor::{
    Dispatcher, LifecycleState, PulseCommand, SensorCache, SensorSnapshot, Supervisor,
    SupervisorConfig, Telemetry, Watchdog, link::protocol::write_request,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

const WAKE_UP: Duration = Duration::from_millis(30);
const WATCHDOG: Duration = Duration::from_millis(150);
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

struct Board {
    host: HostLink,
    supervisor: Supervisor<RecordingActuator>,
    telemetry: Arc<Telemetry>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Board {
    fn boot(readings: Vec<SensorSnapshot>) -> Self {
        let telemetry = Arc::new(Telemetry::new());
        let config = SupervisorConfig::default()
            .with_wake_up_duration(WAKE_UP)
            .with_watchdog_timeout(WATCHDOG)
            .with_link_idle_sleep(Duration::from_millis(1));
        let supervisor = Supervisor::new(RecordingActuator::new(), &config, telemetry.clone());
        let cache = Arc::new(SensorCache::new(ScriptedSensors::new(readings)));
        cache.refresh();

        let running = Arc::new(AtomicBool::new(true));
        let (watchdog, feeder) =
            Watchdog::new(supervisor.clone(), config.watchdog_timeout, telemetry.clone());
        let watchdog_handle = watchdog.spawn(running.clone()).expect("watchdog spawns");

        let host = HostLink::new();
        let mut dispatcher = Dispatcher::new(
            host.clone(),
            supervisor.clone(),
            cache,
            feeder,
            telemetry.clone(),
            config.link_idle_sleep,
        );
        let flag = running.clone();
        let dispatcher_handle = thread::spawn(move || {
            dispatcher.run(&flag).expect("in-memory link never fails");
        });

        Self {
            host,
            supervisor,
            telemetry,
            running,
            handles: vec![watchdog_handle, dispatcher_handle],
        }
    }

    fn read_state(&self) -> u8 {
        self.host.send(&[0x02]);
        self.host.receive(1, REPLY_TIMEOUT).expect("state reply")[0]
    }

    fn wait_for_state(&self, want: LifecycleState, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.read_state() == want.as_byte() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn shutdown(self) {
        self.running.store(false, Ordering::Release);
        for h in self.handles {
            h.join().expect("task exits cleanly");
        }
    }
}

#[test]
fn host_session_arms_drives_and_suspends() {
    let board = Board::boot(vec![]);

    assert_eq!(board.read_state(), LifecycleState::Suspended.as_byte());

    board.host.send(&[0xFE]);
    assert!(board.wait_for_state(LifecycleState::Running, REPLY_TIMEOUT));

    let cmd = PulseCommand::new([(1500, 1200), (1510, 1300), (1520, 1400), (1530, 1500)]);
    board.host.send(&write_request(&cmd));
    // state read is ordered after the write on the link
    assert_eq!(board.read_state(), LifecycleState::Running.as_byte());
    assert_eq!(board.supervisor.with_driver(|hw| hw.last_powers()), Some(cmd));

    board.host.send(&[0xFF]);
    assert_eq!(board.read_state(), LifecycleState::Suspended.as_byte());
    assert!(!board.supervisor.with_driver(|hw| hw.powered()));

    board.shutdown();
}

#[test]
fn sensor_read_returns_cached_little_endian_packet() {
    let reading = SensorSnapshot::new(0x1234, 0xABCD, 0x0001, 0xFF00);
    let board = Board::boot(vec![reading]);

    board.host.send(&[0x01]);
    let reply = board.host.receive(8, REPLY_TIMEOUT).expect("sensor reply");
    assert_eq!(reply, vec![0x34, 0x12, 0xCD, 0xAB, 0x01, 0x00, 0x00, 0xFF]);

    board.shutdown();
}

#[test]
fn quiet_host_is_suspended_by_watchdog() {
    let board = Board::boot(vec![]);
    board.host.send(&[0xFE]);
    assert!(board.wait_for_state(LifecycleState::Running, REPLY_TIMEOUT));

    // no headers for several windows
    thread::sleep(WATCHDOG * 3);
    assert_eq!(board.supervisor.state(), LifecycleState::Suspended);
    assert!(board.telemetry.counters().watchdog_timeouts >= 1);

    board.shutdown();
}

#[test]
fn unknown_bytes_do_not_keep_the_board_alive() {
    let board = Board::boot(vec![]);
    board.host.send(&[0xFE]);
    assert!(board.wait_for_state(LifecycleState::Running, REPLY_TIMEOUT));

    let until = Instant::now() + WATCHDOG * 3;
    while Instant::now() < until {
        board.host.send(&[0x42]);
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(board.supervisor.state(), LifecycleState::Suspended);
    assert!(board.telemetry.counters().unknown_headers > 0);

    board.shutdown();
}

#[test]
fn write_while_suspended_is_consumed_and_dropped() {
    let board = Board::boot(vec![]);
    let cmd = PulseCommand::new([(1700, 1700); 4]);

    board.host.send(&write_request(&cmd));
    // follow-up read proves the 16 payload bytes were not taken as headers
    assert_eq!(board.read_state(), LifecycleState::Suspended.as_byte());
    assert_eq!(board.host.pending_to_board(), 0);
    assert!(
        !board
            .supervisor
            .with_driver(|hw| hw.calls.contains(&ActuatorCall::SetPowers(cmd)))
    );

    board.shutdown();
}
