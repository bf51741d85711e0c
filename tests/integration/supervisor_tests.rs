//! Driver call sequences produced by supervisor transitions.

use crate::mock_hw::{ActuatorCall, RecordingActuator};
use propulsion_supervisor::{
    LifecycleState, PulseCommand, Supervisor, SupervisorConfig, Telemetry, TelemetryEvent,
};
use std::{sync::Arc, time::Duration};

fn make_supervisor() -> (Supervisor<RecordingActuator>, Arc<Telemetry>) {
    let telemetry = Arc::new(Telemetry::new());
    let config = SupervisorConfig::default().with_wake_up_duration(Duration::from_millis(50));
    let sup = Supervisor::new(RecordingActuator::new(), &config, telemetry.clone());
    (sup, telemetry)
}

fn calls(sup: &Supervisor<RecordingActuator>) -> Vec<ActuatorCall> {
    sup.with_driver(|hw| hw.calls.clone())
}

#[test]
fn construction_leaves_outputs_neutral_and_unpowered() {
    let (sup, _) = make_supervisor();
    assert_eq!(sup.state(), LifecycleState::Suspended);
    assert_eq!(
        calls(&sup),
        vec![
            ActuatorCall::SetPowers(PulseCommand::NEUTRAL),
            ActuatorCall::Deactivate,
        ]
    );
}

#[test]
fn start_powers_up_then_finishes_wake_up() {
    let (sup, telemetry) = make_supervisor();
    let wake = sup.start().expect("start accepted");

    // before the wake-up delay elapses: powered, thrusters held quiescent
    assert_eq!(sup.state(), LifecycleState::Initializing);
    assert!(sup.with_driver(|hw| hw.powered()));

    assert!(wake.wait());
    assert_eq!(sup.state(), LifecycleState::Running);
    assert_eq!(
        calls(&sup)[2..],
        [
            ActuatorCall::SetPowers(PulseCommand::NEUTRAL),
            ActuatorCall::Activate,
            ActuatorCall::BeginWakeUp,
            ActuatorCall::FinishWakeUp,
        ]
    );

    let events = telemetry.drain();
    assert_eq!(
        events,
        vec![
            TelemetryEvent::StateChanged {
                from: LifecycleState::Suspended,
                to: LifecycleState::Initializing,
            },
            TelemetryEvent::StateChanged {
                from: LifecycleState::Initializing,
                to: LifecycleState::Running,
            },
        ]
    );
}

#[test]
fn suspend_resets_before_cutting_power() {
    let (sup, _) = make_supervisor();
    assert!(sup.start().expect("start accepted").wait());
    let before = calls(&sup).len();

    assert_eq!(sup.suspend(), LifecycleState::Running);
    assert_eq!(
        calls(&sup)[before..],
        [
            ActuatorCall::SetPowers(PulseCommand::NEUTRAL),
            ActuatorCall::Deactivate,
        ]
    );
    assert!(!sup.with_driver(|hw| hw.powered()));
}

#[test]
fn writes_reach_the_driver_only_while_running() {
    let (sup, telemetry) = make_supervisor();
    let cmd = PulseCommand::new([(1600, 1450); 4]);

    assert!(!sup.set_powers(&cmd));
    let wake = sup.start().expect("start accepted");
    assert!(!sup.set_powers(&cmd));
    assert!(wake.wait());
    assert!(sup.set_powers(&cmd));

    let applied: Vec<_> = calls(&sup)
        .into_iter()
        .filter(|c| *c == ActuatorCall::SetPowers(cmd))
        .collect();
    assert_eq!(applied.len(), 1);
    assert_eq!(telemetry.counters().writes_dropped, 2);
}

#[test]
fn suspend_mid_wake_up_never_finishes_it() {
    let (sup, _) = make_supervisor();
    let wake = sup.start().expect("start accepted");
    sup.suspend();

    assert!(!wake.wait());
    assert_eq!(sup.state(), LifecycleState::Suspended);
    assert!(!calls(&sup).contains(&ActuatorCall::FinishWakeUp));
}
