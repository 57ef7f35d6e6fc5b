//! Boot-time mode decision and the setup-portal flow.
//!
//! Verifies the end-to-end sequence: stored credentials either join
//! within the deadline or the device falls back to the open setup AP,
//! where submitting the form persists credentials and schedules the
//! restart that re-runs the decision.

use std::net::Ipv4Addr;

use relaynode::adapters::captive_dns;
use relaynode::adapters::http;
use relaynode::adapters::wifi::{LinkRole, WifiAdapter};
use relaynode::app::ports::{ConfigPort, ConnectivityPort, TimePort};
use relaynode::config::{BusConfig, DeviceConfig, WifiCredentials};
use relaynode::network::mode::JOIN_TIMEOUT_MS;
use relaynode::network::provisioning::RESTART_DELAY_MS;
use relaynode::network::{
    ap_ssid, submit_credentials, JoinOutcome, ModeState, NetworkModeController, OperatingMode,
    ProvisioningError,
};

use crate::mock_hw::{MockClock, MockLink, MockNvs, MockSystem};

fn creds() -> WifiCredentials {
    WifiCredentials::new("HomeWiFi", "correct-horse").unwrap()
}

// ── Mode decision ─────────────────────────────────────────────

#[test]
fn joins_within_deadline() {
    let mut clock = MockClock::at(1_000);
    let mut link = MockLink::new(Some(4_000), &clock);
    let mut ctl = NetworkModeController::new();

    assert_eq!(ctl.boot(&creds(), &mut link, &mut clock), OperatingMode::Connected);
    assert_eq!(ctl.state(), ModeState::Connected);
    assert!(matches!(ctl.outcome(), Some(JoinOutcome::Joined { elapsed_ms }) if elapsed_ms <= 3_000));
    assert_eq!(link.leaves, 0);
}

#[test]
fn times_out_after_twenty_seconds() {
    let mut clock = MockClock::at(0);
    let mut link = MockLink::new(None, &clock);
    let mut ctl = NetworkModeController::new();

    assert_eq!(ctl.boot(&creds(), &mut link, &mut clock), OperatingMode::Provisioning);
    assert_eq!(ctl.outcome(), Some(JoinOutcome::TimedOut));
    assert_eq!(clock.now_ms(), JOIN_TIMEOUT_MS, "gives up exactly at the deadline");
    assert_eq!(link.leaves, 1);
}

#[test]
fn link_arriving_just_late_is_ignored() {
    let mut clock = MockClock::at(0);
    let mut link = MockLink::new(Some(JOIN_TIMEOUT_MS + 1), &clock);
    let mut ctl = NetworkModeController::new();
    assert_eq!(ctl.boot(&creds(), &mut link, &mut clock), OperatingMode::Provisioning);
}

#[test]
fn no_credentials_goes_straight_to_setup() {
    let mut clock = MockClock::at(0);
    let mut link = MockLink::new(Some(0), &clock);
    let mut ctl = NetworkModeController::new();

    let mode = ctl.boot(&WifiCredentials::default(), &mut link, &mut clock);
    assert_eq!(mode, OperatingMode::Provisioning);
    assert_eq!(link.join_requests, 0);
    assert_eq!(clock.now_ms(), 0, "no waiting");
}

#[test]
fn decision_is_made_once() {
    let mut clock = MockClock::at(0);
    let mut link = MockLink::new(None, &clock);
    let mut ctl = NetworkModeController::new();
    assert_eq!(ctl.boot(&creds(), &mut link, &mut clock), OperatingMode::Provisioning);

    link.join_at_ms = Some(0);
    assert_eq!(ctl.boot(&creds(), &mut link, &mut clock), OperatingMode::Provisioning);
    assert_eq!(link.join_requests, 1);
}

#[test]
fn sim_wifi_adapter_drives_mode_controller() {
    let mut clock = MockClock::at(0);
    let mut wifi = WifiAdapter::new(Some(3));
    wifi.set_hostname("relaynode-EFCAFE").unwrap();
    let mut ctl = NetworkModeController::new();

    assert_eq!(ctl.boot(&creds(), &mut wifi, &mut clock), OperatingMode::Connected);
    assert_eq!(wifi.role(), LinkRole::Station);
    assert!(wifi.ip_address().is_some());
}

// ── Setup portal ──────────────────────────────────────────────

#[test]
fn setup_ap_is_named_after_device() {
    assert_eq!(ap_ssid("esp32-EFCAFE"), "RelayNode-esp32-EFCAFE");
    let clock = MockClock::at(0);
    let mut link = MockLink::new(None, &clock);
    link.start_access_point(&ap_ssid("esp32-EFCAFE")).unwrap();
    assert_eq!(link.ip_address(), Some(Ipv4Addr::new(192, 168, 71, 1)));
}

#[test]
fn submission_keeps_bus_settings() {
    let bus = BusConfig {
        enabled: true,
        host: "broker.lan".into(),
        cmd_topic: "a/cmd".into(),
        ..BusConfig::default()
    };
    let store = MockNvs::with(DeviceConfig {
        bus: bus.clone(),
        ..DeviceConfig::default()
    });
    let mut system = MockSystem::default();

    submit_credentials(Some("HomeWiFi"), Some(""), &store, &mut system).unwrap();

    let saved = store.current().unwrap();
    assert_eq!(saved.wifi.ssid.as_str(), "HomeWiFi");
    assert!(saved.wifi.password.is_empty(), "open network");
    assert_eq!(saved.bus, bus);
    assert_eq!(system.restarts, vec![RESTART_DELAY_MS]);
}

#[test]
fn invalid_submissions_change_nothing() {
    let store = MockNvs::default();
    let mut system = MockSystem::default();

    assert_eq!(
        submit_credentials(None, Some("whatever1"), &store, &mut system),
        Err(ProvisioningError::SsidRequired)
    );
    assert_eq!(
        submit_credentials(Some(&"x".repeat(33)), None, &store, &mut system),
        Err(ProvisioningError::SsidInvalid)
    );
    assert_eq!(
        submit_credentials(Some("Home"), Some("short"), &store, &mut system),
        Err(ProvisioningError::PassInvalid)
    );
    assert_eq!(*store.saves.borrow(), 0);
    assert!(system.restarts.is_empty());
}

#[test]
fn restart_happens_even_if_storage_fails() {
    let store = MockNvs::failing();
    let mut system = MockSystem::default();
    submit_credentials(Some("HomeWiFi"), Some("password123"), &store, &mut system).unwrap();
    assert_eq!(system.restarts, vec![RESTART_DELAY_MS]);
}

#[test]
fn portal_form_round_trip_through_http_layer() {
    let store = MockNvs::default();
    let mut system = MockSystem::default();

    let reply = http::wifi_reply("ssid=My+Home%21&pass=p%40ssw0rd%21", &store, &mut system);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"ok":true,"reboot":true}"#);

    let saved = store.load().unwrap();
    assert_eq!(saved.wifi.ssid.as_str(), "My Home!");
    assert_eq!(saved.wifi.password.as_str(), "p@ssw0rd!");
}

#[test]
fn missing_ssid_reports_error_code() {
    let store = MockNvs::default();
    let mut system = MockSystem::default();
    let reply = http::wifi_reply("pass=abcdefgh", &store, &mut system);
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, r#"{"ok":false,"err":"ssid_required"}"#);
}

#[test]
fn captive_dns_points_everything_at_the_ap() {
    let ap = Ipv4Addr::new(192, 168, 71, 1);
    let mut q = vec![0xAB, 0xCD, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
    for label in ["connectivitycheck", "gstatic", "com"] {
        q.push(label.len() as u8);
        q.extend_from_slice(label.as_bytes());
    }
    q.extend_from_slice(&[0, 0, 1, 0, 1]);

    let r = captive_dns::answer(&q, ap).unwrap();
    assert_eq!(&r[..2], &[0xAB, 0xCD]);
    assert_eq!(&r[r.len() - 4..], &ap.octets());
}
