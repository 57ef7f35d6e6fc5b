//! RelayNode Firmware: Main Entry Point
//!
//! Hexagonal architecture with a single control-loop thread.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   Esp32Time       │
//! │  (Input+Relay)     (EventSink)    (Config)     (TimePort)      │
//! │  WifiAdapter       MqttBusClient  EspSystem    HTTP · DNS      │
//! │  (Connectivity)    (BusClient)    (Restart)    (driving)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Debounce · Relay master · Bus synchronizer            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  NetworkModeController (boot-time AP/STA decision)             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::net::Ipv4Addr;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::EspError;
use log::{error, info, warn};

use relaynode::adapters::captive_dns::CaptiveDns;
use relaynode::adapters::device_id;
use relaynode::adapters::hardware::HardwareAdapter;
use relaynode::adapters::http;
use relaynode::adapters::log_sink::LogEventSink;
use relaynode::adapters::mdns::MdnsAdapter;
use relaynode::adapters::mqtt::MqttBusClient;
use relaynode::adapters::nvs::NvsAdapter;
use relaynode::adapters::system::EspSystem;
use relaynode::adapters::time::Esp32TimeAdapter;
use relaynode::adapters::wifi::WifiAdapter;
use relaynode::app::channels::COMMAND_CHANNEL;
use relaynode::app::ports::{ConfigError, ConfigPort, ConnectivityPort, InputPort, TimePort};
use relaynode::app::service::AppService;
use relaynode::app::status::{self, StatusSnapshot};
use relaynode::config::DeviceConfig;
use relaynode::control::Polarity;
use relaynode::drivers::hw_init::{self, Gpio};
use relaynode::drivers::watchdog::Watchdog;
use relaynode::error::{self, Error};
use relaynode::network::{ap_ssid, NetworkModeController, OperatingMode};
use relaynode::pins;

/// Control loop period.
const TICK_MS: u32 = 10;

/// Station re-join cadence after the link drops in connected mode.
const REJOIN_INTERVAL_MS: u32 = 10_000;

/// Soft-AP address when the driver does not report one.
const DEFAULT_AP_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 71, 1);

// Every collaborator failure below is logged and the device carries on
// degraded; once reached, neither loop ever exits.
fn main() {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    // Without a logger there is nowhere to report the failure.
    let _ = esp_idf_logger::init();

    info!("╔══════════════════════════════════════╗");
    info!("║  RelayNode v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. GPIO ───────────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Keep going: the network surface still reports status.
        error!("GPIO init failed: {} (continuing degraded)", e);
    }

    // ── 3. Configuration ──────────────────────────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(|n| n.load()) {
        Some(Ok(cfg)) => {
            info!("Config loaded from NVS");
            cfg
        }
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
        None => DeviceConfig::default(),
    };

    // ── 4. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    let dev_hostname = device_id::hostname(&mac);
    let client_id = device_id::mqtt_client_id(&mac);
    info!("Device ID: {} (hostname: {})", dev_id, dev_hostname);

    // ── 5. Relay follows the input before any networking ──────
    let mut clock = Esp32TimeAdapter::new();
    let mut hw = HardwareAdapter::new(Gpio::new(pins::INPUT_GPIO), Gpio::new(pins::RELAY_GPIO));
    let mut sink = LogEventSink::new();
    let first_raw = hw.read();
    let mut app = AppService::new(
        config.clone(),
        Polarity::from_active_low(pins::RELAY_ACTIVE_LOW),
        client_id,
        first_raw,
        clock.now_ms(),
    );
    app.start(&mut hw, &mut sink);

    // ── 6. Network mode decision ──────────────────────────────
    let mut wifi = match bring_up_wifi(&dev_hostname) {
        Ok(w) => Some(w),
        Err(e) => {
            error!("WiFi unavailable: {} (relay control only)", e);
            None
        }
    };

    let mode = match wifi.as_mut() {
        Some(wifi) => NetworkModeController::new().boot(&config.wifi, wifi, &mut clock),
        // No radio means nothing to provision; run the relay loop offline.
        None => OperatingMode::Connected,
    };
    info!("Mode: {}", mode.as_str());

    // Subscribed only now: the join above blocks for up to 20 s.
    let watchdog = Watchdog::new();

    // ── 7a. Provisioning mode ─────────────────────────────────
    if let (OperatingMode::Provisioning, Some(wifi)) = (mode, wifi.as_mut()) {
        let ssid = ap_ssid(&dev_id);
        let ap_ip = match wifi.start_access_point(&ssid) {
            Ok(()) => wifi.ip_address().unwrap_or(DEFAULT_AP_ADDR),
            Err(e) => {
                error!("Setup AP: {}", Error::from(e));
                DEFAULT_AP_ADDR
            }
        };

        let dns = CaptiveDns::bind(ap_ip)
            .inspect_err(|e| warn!("DNS: captive responder unavailable: {}", e))
            .ok();
        let _server = match nvs {
            Some(store) => http::start_provisioning(store, EspSystem::new())
                .inspect_err(|e| error!("HTTP: setup portal unavailable: {:#}", e))
                .ok(),
            None => {
                error!("HTTP: setup portal disabled: {}", Error::Config("no credential store"));
                None
            }
        };
        info!("Setup portal: join '{}' and open http://{}/", ssid, ap_ip);

        loop {
            match &dns {
                // The socket read timeout paces this loop.
                Some(dns) => {
                    dns.process_next();
                }
                None => clock.sleep_ms(TICK_MS),
            }
            watchdog.feed();
        }
    }

    // ── 7b. Connected mode ────────────────────────────────────
    let mut mdns = MdnsAdapter::new(dev_hostname.clone(), dev_id.clone());
    if let Err(e) = mdns.start() {
        warn!("mDNS: {}", e);
    }

    let mut snapshot = StatusSnapshot::new(mode, device_id::fqdn(&mac));
    app.fill_snapshot(&mut snapshot);
    snapshot.ip = wifi.as_ref().and_then(|w| w.ip_address());
    let shared = status::shared(snapshot.clone());
    let _server = http::start_connected(shared.clone())
        .inspect_err(|e| error!("HTTP: server unavailable: {:#}", e))
        .ok();

    let mut mqtt = MqttBusClient::new();
    let mut last_rejoin_ms = clock.now_ms();
    let mut was_up = wifi.is_some();

    info!("Entering control loop ({} ms tick)", TICK_MS);
    loop {
        let now = clock.now_ms();

        // ── Commands from the HTTP task ──
        while let Ok(cmd) = COMMAND_CHANNEL.try_receive() {
            match &nvs {
                Some(store) => app.handle_command(cmd, store, &mut mqtt, &mut sink),
                None => app.handle_command(cmd, &NullStore, &mut mqtt, &mut sink),
            }
        }

        // ── Station upkeep ──
        let link_up = wifi.as_mut().is_some_and(|w| w.is_joined());
        if link_up != was_up {
            if link_up {
                info!("WiFi: link up");
            } else {
                warn!("WiFi: link lost");
            }
            was_up = link_up;
        }
        if let Some(w) = wifi.as_mut() {
            if !link_up && now.wrapping_sub(last_rejoin_ms) > REJOIN_INTERVAL_MS {
                last_rejoin_ms = now;
                if let Err(e) = w.begin_join(&config.wifi) {
                    warn!("WiFi: re-join failed: {}", e);
                }
            }
        }

        app.tick(now, &mut hw, &mut mqtt, link_up, &mut sink);

        app.fill_snapshot(&mut snapshot);
        snapshot.ip = wifi.as_ref().and_then(|w| w.ip_address());
        status::publish(&shared, snapshot.clone());

        watchdog.feed();
        clock.sleep_ms(TICK_MS);
    }
}

/// Take the radio and its system services, then bring up the driver.
fn bring_up_wifi(hostname: &str) -> error::Result<WifiAdapter> {
    let peripherals = Peripherals::take().map_err(init_failed("peripherals"))?;
    let sysloop = EspSystemEventLoop::take().map_err(init_failed("event loop"))?;
    let nvs_partition = EspDefaultNvsPartition::take().map_err(init_failed("nvs partition"))?;
    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, nvs_partition)
        .map_err(init_failed("wifi driver"))?;
    if let Err(e) = wifi.set_hostname(hostname) {
        warn!("WiFi: hostname not set: {}", e);
    }
    Ok(wifi)
}

fn init_failed(what: &'static str) -> impl FnOnce(EspError) -> Error {
    move |e| {
        warn!("{}: {}", what, e);
        Error::Init(what)
    }
}

/// Stand-in store when NVS could not be initialised: bus settings still
/// apply for this session, they just are not persisted.
struct NullStore;

impl ConfigPort for NullStore {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        Ok(DeviceConfig::default())
    }

    fn save(&self, _config: &DeviceConfig) -> Result<(), ConfigError> {
        Err(ConfigError::IoError)
    }
}
