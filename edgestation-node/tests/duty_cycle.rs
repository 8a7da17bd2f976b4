//! Integration tests for the duty cycle
//!
//! Every test runs on paused tokio time, so deadlines of tens of seconds
//! and sleeps of minutes complete instantly and deterministically.

mod common;

use std::time::Duration;

use edgestation_core::{PhyMode, SleepDecision, SleepMode};
use edgestation_node::sim::SleepKind;
use edgestation_node::{CycleState, Wake};

use common::{query_param, BrokerBehaviour, EndpointBehaviour, StationBuilder, GLITCH, ROUND_TRIP, TOPIC};

const PERIOD: Duration = Duration::from_secs(15 * 60);
const RESTART_DELAY: Duration = Duration::from_secs(120);

#[tokio::test(start_paused = true)]
async fn round_trip_publishes_on_both_channels() {
    let mut station = StationBuilder::new().build();

    let report = station.node.run_cycle().await;

    assert_eq!(report.aborted, None);
    assert!(report.reading.valid);

    let publishes = station.broker.publishes();
    assert_eq!(
        publishes,
        vec![
            (format!("{}/temperature", TOPIC), "22.5".to_string()),
            (format!("{}/humidity", TOPIC), "45".to_string()),
            (format!("{}/pressure", TOPIC), "1013.25".to_string()),
        ]
    );
    assert!(station.broker.retained());
    assert_eq!(station.broker.sessions(), 1);
    assert_eq!(station.broker.closed(), 1);

    let queries = station.endpoint.queries();
    assert_eq!(queries.len(), 1);
    let query = &queries[0];
    assert_eq!(query_param(query, "tempf"), Some("72.5"));
    assert_eq!(query_param(query, "humidity"), Some("45.0"));
    assert_eq!(query_param(query, "baromin"), Some("29.92"));
    assert_eq!(query_param(query, "ID"), Some(common::STATION_ID));
    assert_eq!(query_param(query, "dateutc"), Some("now"));
    assert_eq!(query_param(query, "action"), Some("updateraw"));

    assert!(report.broker.unwrap().succeeded());
    assert!(report.http.unwrap().succeeded());
    assert!(!report.signals.serious_problem());
    assert_eq!(report.decision, SleepDecision::Deep(PERIOD - report.elapsed));
}

#[tokio::test(start_paused = true)]
async fn sensor_is_powered_off_after_publishing() {
    let mut station = StationBuilder::new().script(vec![GLITCH, GLITCH, GLITCH]).build();

    let report = station.node.run_cycle().await;

    assert!(report.reading.valid);
    assert_eq!(station.probe.measurements(), 4);
    assert_eq!(station.probe.power_cycles(), 1);
    assert!(!station.probe.is_powered());
    assert!(!station.probe.released_while_powered());
}

#[tokio::test(start_paused = true)]
async fn link_never_up_aborts_at_connect_link() {
    let mut station = StationBuilder::new().link_available(false).build();

    let report = station.node.run_cycle().await;

    assert_eq!(report.aborted, Some(CycleState::ConnectLink));
    assert!(report.elapsed >= Duration::from_secs(30) && report.elapsed < Duration::from_secs(31));
    assert_eq!(station.probe.power_cycles(), 0);
    assert_eq!(station.probe.measurements(), 0);
    assert_eq!(station.broker.sessions(), 0);
    assert!(station.endpoint.queries().is_empty());
    assert!(report.broker.is_none() && report.http.is_none());
    assert_eq!(report.decision, SleepDecision::Deep(RESTART_DELAY));

    assert_eq!(station.node.sleep(&report).await, Wake::Reboot);
    assert_eq!(station.power.sleeps(), vec![(SleepKind::Deep, RESTART_DELAY)]);
}

#[tokio::test(start_paused = true)]
async fn invalid_reading_aborts_at_acquire() {
    let mut station = StationBuilder::new().reading(GLITCH).build();

    let report = station.node.run_cycle().await;

    assert_eq!(report.aborted, Some(CycleState::Acquire));
    assert!(!report.reading.valid);
    assert_eq!(station.probe.measurements(), 11);
    assert!(!station.probe.is_powered());
    assert_eq!(station.broker.sessions(), 0);
    assert!(station.endpoint.queries().is_empty());
    assert_eq!(report.decision, SleepDecision::Deep(RESTART_DELAY));
}

#[tokio::test(start_paused = true)]
async fn unsupported_sleep_mode_aborts_at_validate() {
    let mut station = StationBuilder::new().config(|c| c.sleep_mode = SleepMode::ExternalTimer).build();

    let report = station.node.run_cycle().await;

    assert_eq!(report.aborted, Some(CycleState::Validate));
    assert_eq!(station.radio.starts(), 0);
    assert_eq!(station.probe.power_cycles(), 0);
    assert_eq!(report.decision, SleepDecision::Deep(RESTART_DELAY));
}

#[tokio::test(start_paused = true)]
async fn non_positive_period_aborts_at_validate() {
    let mut station = StationBuilder::new().config(|c| c.reporting_period_min = 0).build();

    let report = station.node.run_cycle().await;

    assert_eq!(report.aborted, Some(CycleState::Validate));
    assert_eq!(report.decision, SleepDecision::Deep(RESTART_DELAY));
}

#[tokio::test(start_paused = true)]
async fn switch_off_skips_http() {
    let mut station = StationBuilder::new().switch_on(false).build();

    let report = station.node.run_cycle().await;

    let http = report.http.unwrap();
    assert_eq!((http.attempted, http.completed, http.error), (false, true, false));
    assert!(station.endpoint.queries().is_empty());
    assert!(report.broker.unwrap().succeeded());
    assert!(!report.signals.http_error);
}

#[tokio::test(start_paused = true)]
async fn switch_is_read_every_cycle() {
    let mut station = StationBuilder::new().sleep_mode(SleepMode::AutomaticLight).build();

    let first = station.node.run_cycle().await;
    assert_eq!(station.node.sleep(&first).await, Wake::Resume);

    station.switch.set(false);
    let second = station.node.run_cycle().await;

    assert!(first.http.unwrap().attempted);
    assert!(!second.http.unwrap().attempted);
    assert_eq!(station.endpoint.queries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_broker_forces_deep_sleep() {
    let mut station = StationBuilder::new()
        .sleep_mode(SleepMode::AutomaticLight)
        .broker(BrokerBehaviour::NeverAck)
        .build();

    let report = station.node.run_cycle().await;

    let broker = report.broker.unwrap();
    assert!(broker.attempted && broker.error);
    assert!(report.http.unwrap().succeeded());
    assert_eq!(station.broker.sessions(), 1);
    assert_eq!(station.broker.closed(), 1);
    assert!(report.signals.broker_error);
    assert!(report.elapsed >= Duration::from_secs(30));
    assert!(matches!(report.decision, SleepDecision::Deep(_)));
}

#[tokio::test(start_paused = true)]
async fn partial_acknowledgement_is_an_error() {
    let mut station = StationBuilder::new().broker(BrokerBehaviour::AckFirst(2)).build();

    let report = station.node.run_cycle().await;

    assert!(report.broker.unwrap().error);
    assert_eq!(station.broker.publishes().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn dropped_sessions_are_retried() {
    let mut station = StationBuilder::new()
        .sleep_mode(SleepMode::AutomaticLight)
        .broker(BrokerBehaviour::DropSessions(2))
        .build();

    let report = station.node.run_cycle().await;

    assert!(report.broker.unwrap().succeeded());
    assert_eq!(station.broker.sessions(), 3);
    assert_eq!(station.broker.closed(), 3);
    assert!(matches!(report.decision, SleepDecision::LightAutomatic(_)));
}

#[tokio::test(start_paused = true)]
async fn session_attempts_are_bounded() {
    let mut station = StationBuilder::new().broker(BrokerBehaviour::DropSessions(5)).build();

    let report = station.node.run_cycle().await;

    assert!(report.broker.unwrap().error);
    assert_eq!(station.broker.sessions(), 3);
    assert_eq!(station.broker.closed(), 3);
}

#[tokio::test(start_paused = true)]
async fn http_failure_forces_deep_sleep() {
    for behaviour in [EndpointBehaviour::Reject, EndpointBehaviour::Hang] {
        let mut station = StationBuilder::new()
            .sleep_mode(SleepMode::AutomaticLight)
            .endpoint(behaviour)
            .build();

        let report = station.node.run_cycle().await;

        assert!(report.http.unwrap().error, "{:?}", behaviour);
        assert_eq!(station.endpoint.queries().len(), 1);
        assert!(report.broker.unwrap().succeeded());
        assert!(matches!(report.decision, SleepDecision::Deep(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn automatic_light_sleep_keeps_link_between_cycles() {
    let mut station = StationBuilder::new().sleep_mode(SleepMode::AutomaticLight).build();

    let first = station.node.run_cycle().await;
    assert!(first.signals.extended_wake);
    assert!(matches!(first.decision, SleepDecision::LightAutomatic(_)));
    assert_eq!(station.node.sleep(&first).await, Wake::Resume);

    let second = station.node.run_cycle().await;

    assert_eq!(second.number, 2);
    assert!(matches!(second.decision, SleepDecision::LightAutomatic(_)));
    assert_eq!(station.radio.starts(), 1);
    assert_eq!(station.radio.connects(), 1);
    assert_eq!(station.probe.power_cycles(), 2);
    assert_eq!(station.broker.sessions(), 2);
}

#[tokio::test(start_paused = true)]
async fn manual_light_sleep_reconnects_fast() {
    let mut station = StationBuilder::new().sleep_mode(SleepMode::ManualLight).build();

    let first = station.node.run_cycle().await;
    assert!(matches!(first.decision, SleepDecision::LightManual(_)));
    assert_eq!(station.node.sleep(&first).await, Wake::Resume);
    assert_eq!(station.radio.stops(), 1);

    let second = station.node.run_cycle().await;

    assert_eq!(second.aborted, None);
    assert_eq!(station.radio.starts(), 2);
    assert!(second.elapsed < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn legacy_phy_downgrades_to_deep_sleep() {
    let mut station = StationBuilder::new()
        .sleep_mode(SleepMode::ManualLight)
        .phy(PhyMode::Ht20)
        .build();

    let report = station.node.run_cycle().await;

    assert!(!report.signals.serious_problem());
    assert!(!report.signals.extended_wake);
    assert_eq!(station.radio.wake_requests(), 0);
    assert!(matches!(report.decision, SleepDecision::Deep(_)));
}

#[tokio::test(start_paused = true)]
async fn overrun_restarts_without_sleeping() {
    let mut station = StationBuilder::new()
        .config(|c| {
            c.reporting_period_min = 1;
            c.timeouts.mqtt_secs = 90;
        })
        .broker(BrokerBehaviour::NeverAck)
        .build();

    let report = station.node.run_cycle().await;

    assert!(report.elapsed >= Duration::from_secs(60));
    assert_eq!(report.decision, SleepDecision::RestartNow);
    assert_eq!(station.node.sleep(&report).await, Wake::Reboot);
    assert!(station.power.sleeps().is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapped_acquisition_reads_once() {
    let mut station = StationBuilder::new().config(|c| c.overlap_acquisition = true).build();

    let report = station.node.run_cycle().await;

    assert!(report.reading.valid);
    assert_eq!(report.reading.temperature, ROUND_TRIP.temperature);
    assert_eq!(station.probe.power_cycles(), 1);
    assert!(report.broker.unwrap().succeeded());
}

#[tokio::test(start_paused = true)]
async fn run_returns_after_deep_sleep() {
    let mut station = StationBuilder::new().build();

    let report = station.node.run().await;

    assert_eq!(report.number, 1);
    assert_eq!(station.node.cycles(), 1);
    let sleeps = station.power.sleeps();
    assert_eq!(sleeps.len(), 1);
    assert_eq!(sleeps[0], (SleepKind::Deep, report.decision.duration()));
}

#[tokio::test(start_paused = true)]
async fn broker_retry_waits_for_link_to_return() {
    let mut station = StationBuilder::new().link_drop(Some(Duration::from_secs(5))).build();

    let report = station.node.run_cycle().await;

    assert_eq!(report.aborted, None);
    assert!(report.broker.unwrap().succeeded());
    assert_eq!(station.broker.sessions(), 2);
    assert_eq!(station.broker.closed(), 2);
    assert_eq!(station.radio.connects(), 2);

    let dropped = station.broker.link_dropped_at().unwrap();
    let opened = station.broker.opened_at();
    assert!(opened[1] >= dropped + Duration::from_secs(5));
    assert!(report.signals.link_up);
    assert_eq!(station.node.broker_stats().sessions, 2);
}

#[tokio::test(start_paused = true)]
async fn link_lost_past_broker_deadline_is_an_error() {
    let mut station = StationBuilder::new().link_drop(None).build();

    let report = station.node.run_cycle().await;

    let broker = report.broker.unwrap();
    assert!(broker.attempted && broker.error);
    assert!(report.http.unwrap().succeeded());
    assert_eq!(station.broker.sessions(), 1);
    assert_eq!(station.broker.closed(), 1);
    assert!(!report.signals.link_up);
    assert!(report.elapsed >= Duration::from_secs(30));
    assert!(matches!(report.decision, SleepDecision::Deep(_)));
}

#[tokio::test(start_paused = true)]
async fn conversion_failure_mid_acquisition_powers_sensor_off() {
    let mut station = StationBuilder::new().reading(GLITCH).failing_force(4).build();

    let report = station.node.run_cycle().await;

    assert_eq!(report.aborted, Some(CycleState::Acquire));
    assert!(!report.reading.valid);
    assert_eq!(station.probe.measurements(), 3);
    assert!(!station.probe.is_powered());
    assert!(!station.probe.released_while_powered());
    assert_eq!(station.probe.releases(), 1);
    assert_eq!(station.broker.sessions(), 0);
    assert_eq!(report.decision, SleepDecision::Deep(RESTART_DELAY));
}
