//! HTTP status/command surface.
//!
//! Two servers, one per operating mode:
//!
//! | Mode         | Routes                                                        |
//! |--------------|---------------------------------------------------------------|
//! | Connected    | `GET /`, `GET /settings`, `GET /api/status`, `POST /api/relay`,|
//! |              | `GET /api/mqtt`, `POST /api/mqtt`                             |
//! | Provisioning | `POST /api/wifi`, any other `GET` serves the setup page       |
//!
//! Handlers never touch the control core.  Writes become [`AppCommand`]s
//! on the command queue; reads clone the published [`StatusSnapshot`].
//! Request parsing and response shaping live in plain functions returning
//! [`Reply`] so they run on the host; the ESP-IDF server only routes.
//!
//! [`StatusSnapshot`]: crate::app::status::StatusSnapshot

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::adapters::utils::parse_flag;
use crate::app::channels::{self, CommandQueue};
use crate::app::commands::{AppCommand, BusConfigUpdate, CommandSource, RelayIntent};
use crate::app::ports::{ConfigPort, SystemPort};
use crate::app::status::{self, SharedStatus};
use crate::config::is_valid_topic;
use crate::control::RelayState;
use crate::network::{submit_credentials, OperatingMode};

#[cfg(target_os = "espidf")]
use std::sync::{Arc, Mutex};

#[cfg(target_os = "espidf")]
use embedded_svc::{
    http::{Headers, Method},
    io::{Read, Write},
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request};
#[cfg(target_os = "espidf")]
use log::info;

/// Form bodies larger than this are rejected.
pub const MAX_BODY_LEN: usize = 1024;

const JSON: &str = "application/json; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";

// ───────────────────────────────────────────────────────────────
// Form decoding
// ───────────────────────────────────────────────────────────────

/// `POST /api/relay` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RelayForm {
    pub state: Option<String>,
}

/// `POST /api/mqtt` body.  `port` stays text so an out-of-range value
/// falls back to the default instead of rejecting the whole form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MqttForm {
    pub enabled: String,
    pub host: String,
    pub port: String,
    pub user: String,
    /// Absent and empty both keep the stored password.
    pub pass: Option<String>,
    #[serde(rename = "cmdTopic")]
    pub cmd_topic: String,
    #[serde(rename = "stateTopic")]
    pub state_topic: String,
}

/// `POST /api/wifi` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WifiForm {
    pub ssid: Option<String>,
    pub pass: Option<String>,
}

/// Decode an `application/x-www-form-urlencoded` body.  Bodies that do
/// not fit the form (repeated fields) read as empty.
pub fn decode_form<T: DeserializeOwned + Default>(body: &str) -> T {
    serde_urlencoded::from_str(body).unwrap_or_else(|e| {
        debug!("HTTP: undecodable form ({})", e);
        T::default()
    })
}

// ───────────────────────────────────────────────────────────────
// Responses
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn json<T: Serialize>(status: u16, payload: &T) -> Self {
        // Plain structs of strings/bools/ints cannot fail to serialise.
        let body = serde_json::to_string(payload).unwrap_or_else(|_| String::from("{}"));
        Self {
            status,
            content_type: JSON,
            body,
        }
    }

    fn ok() -> Self {
        Self::json(200, &Ack { ok: true })
    }

    fn error(status: u16, err: &'static str) -> Self {
        Self::json(status, &ErrorBody { ok: false, err })
    }

    fn html(page: &'static str) -> Self {
        Self {
            status: 200,
            content_type: HTML,
            body: page.to_owned(),
        }
    }
}

#[derive(Serialize)]
struct Ack {
    ok: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    err: &'static str,
}

#[derive(Serialize)]
struct RebootAck {
    ok: bool,
    reboot: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub ok: bool,
    pub ip: String,
    pub mdns: String,
    pub relay: bool,
    pub input_pressed: bool,
    pub mqtt_enabled: bool,
    pub mqtt_connected: bool,
    pub cmd_topic: String,
    pub mode: OperatingMode,
}

#[derive(Debug, Serialize)]
pub struct MqttSettingsBody {
    pub ok: bool,
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass_set: bool,
    #[serde(rename = "cmdTopic")]
    pub cmd_topic: String,
    #[serde(rename = "stateTopic")]
    pub state_topic: String,
}

// ───────────────────────────────────────────────────────────────
// Request handling
// ───────────────────────────────────────────────────────────────

/// `GET /api/status`
pub fn status_reply(shared: &SharedStatus) -> Reply {
    let snap = status::read(shared);
    Reply::json(
        200,
        &StatusBody {
            ok: true,
            ip: snap.ip.map(|ip| ip.to_string()).unwrap_or_default(),
            mdns: snap.mdns,
            relay: snap.relay.is_on(),
            input_pressed: snap.input.is_closed(),
            mqtt_enabled: snap.bus.enabled,
            mqtt_connected: snap.bus_state.is_connected(),
            cmd_topic: snap.bus.cmd_topic,
            mode: snap.mode,
        },
    )
}

/// `GET /api/mqtt`.  The password is reduced to `pass_set`.
pub fn mqtt_settings_reply(shared: &SharedStatus) -> Reply {
    let bus = status::read(shared).bus;
    Reply::json(
        200,
        &MqttSettingsBody {
            ok: true,
            enabled: bus.enabled,
            host: bus.host,
            port: bus.port,
            user: bus.user,
            pass_set: bus.pass_set,
            cmd_topic: bus.cmd_topic,
            state_topic: bus.state_topic,
        },
    )
}

pub fn relay_command(body: &str) -> Result<AppCommand, &'static str> {
    let form: RelayForm = decode_form(body);
    let state = form.state.ok_or("missing_state")?;
    Ok(AppCommand::SetRelay(RelayIntent {
        state: RelayState::from_bool(parse_flag(&state)),
        source: CommandSource::Http,
    }))
}

pub fn mqtt_update(body: &str) -> Result<AppCommand, &'static str> {
    let form: MqttForm = decode_form(body);
    if !is_valid_topic(&form.cmd_topic) || !is_valid_topic(&form.state_topic) {
        return Err("invalid_topic");
    }
    Ok(AppCommand::UpdateBusConfig(BusConfigUpdate {
        enabled: parse_flag(&form.enabled),
        host: form.host,
        port: form.port.trim().parse::<u16>().ok(),
        user: form.user,
        pass: form.pass,
        cmd_topic: form.cmd_topic,
        state_topic: form.state_topic,
    }))
}

fn enqueue(queue: &CommandQueue, parsed: Result<AppCommand, &'static str>) -> Reply {
    match parsed {
        Ok(cmd) => {
            if channels::submit(queue, cmd) {
                Reply::ok()
            } else {
                Reply::error(503, "busy")
            }
        }
        Err(code) => Reply::error(400, code),
    }
}

/// `POST /api/relay`.  The control loop may still override the intent.
pub fn relay_reply(body: &str, queue: &CommandQueue) -> Reply {
    enqueue(queue, relay_command(body))
}

/// `POST /api/mqtt`
pub fn mqtt_reply(body: &str, queue: &CommandQueue) -> Reply {
    enqueue(queue, mqtt_update(body))
}

/// `POST /api/wifi` (provisioning mode).  On success a restart is
/// already scheduled when this returns.
pub fn wifi_reply(body: &str, store: &impl ConfigPort, system: &mut impl SystemPort) -> Reply {
    let form: WifiForm = decode_form(body);
    match submit_credentials(form.ssid.as_deref(), form.pass.as_deref(), store, system) {
        Ok(()) => Reply::json(
            200,
            &RebootAck {
                ok: true,
                reboot: true,
            },
        ),
        Err(e) => Reply::error(400, e.code()),
    }
}

pub fn index_page() -> Reply {
    Reply::html(INDEX_HTML)
}

pub fn settings_page() -> Reply {
    Reply::html(SETTINGS_HTML)
}

pub fn setup_page() -> Reply {
    Reply::html(SETUP_HTML)
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF servers
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
type HttpRequest<'r, 'c> = Request<&'r mut EspHttpConnection<'c>>;

#[cfg(target_os = "espidf")]
fn read_body(req: &mut HttpRequest<'_, '_>) -> anyhow::Result<Option<String>> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len > MAX_BODY_LEN {
        return Ok(None);
    }
    let mut body = vec![0u8; len];
    if len > 0 {
        req.read_exact(&mut body)?;
    }
    Ok(Some(String::from_utf8_lossy(&body).into_owned()))
}

#[cfg(target_os = "espidf")]
fn send(req: HttpRequest<'_, '_>, reply: &Reply) -> anyhow::Result<()> {
    req.into_response(reply.status, None, &[("Content-Type", reply.content_type)])?
        .write_all(reply.body.as_bytes())?;
    Ok(())
}

/// Serve a form POST: read the body, then hand it to `handle`.
#[cfg(target_os = "espidf")]
fn serve_form(
    mut req: HttpRequest<'_, '_>,
    handle: impl FnOnce(&str) -> Reply,
) -> anyhow::Result<()> {
    let reply = match read_body(&mut req)? {
        Some(body) => handle(&body),
        None => Reply::error(413, "too_large"),
    };
    send(req, &reply)
}

#[cfg(target_os = "espidf")]
fn server_config(wildcard: bool) -> HttpConfiguration {
    HttpConfiguration {
        stack_size: 10 * 1024,
        uri_match_wildcard: wildcard,
        ..Default::default()
    }
}

/// Start the connected-mode server.
#[cfg(target_os = "espidf")]
pub fn start_connected(shared: SharedStatus) -> anyhow::Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&server_config(false))?;

    server.fn_handler::<anyhow::Error, _>("/", Method::Get, |req| send(req, &index_page()))?;
    server.fn_handler::<anyhow::Error, _>("/settings", Method::Get, |req| {
        send(req, &settings_page())
    })?;
    {
        let shared = shared.clone();
        server.fn_handler::<anyhow::Error, _>("/api/status", Method::Get, move |req| {
            send(req, &status_reply(&shared))
        })?;
    }
    server.fn_handler::<anyhow::Error, _>("/api/relay", Method::Post, |req| {
        serve_form(req, |body| relay_reply(body, &channels::COMMAND_CHANNEL))
    })?;
    server.fn_handler::<anyhow::Error, _>("/api/mqtt", Method::Get, move |req| {
        send(req, &mqtt_settings_reply(&shared))
    })?;
    server.fn_handler::<anyhow::Error, _>("/api/mqtt", Method::Post, |req| {
        serve_form(req, |body| mqtt_reply(body, &channels::COMMAND_CHANNEL))
    })?;

    info!("HTTP: connected-mode server up");
    Ok(server)
}

/// Start the provisioning-mode server.  `store` and `system` move into
/// the handler; nothing else runs against them in this mode.
#[cfg(target_os = "espidf")]
pub fn start_provisioning<C, S>(store: C, system: S) -> anyhow::Result<EspHttpServer<'static>>
where
    C: ConfigPort + Send + 'static,
    S: SystemPort + Send + 'static,
{
    let mut server = EspHttpServer::new(&server_config(true))?;
    let backend = Arc::new(Mutex::new((store, system)));

    server.fn_handler::<anyhow::Error, _>("/api/wifi", Method::Post, move |req| {
        serve_form(req, |body| {
            let mut guard = backend.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let (store, system) = &mut *guard;
            wifi_reply(body, store, system)
        })
    })?;
    // Registered last so the POST route above wins.
    server.fn_handler::<anyhow::Error, _>("/*", Method::Get, |req| send(req, &setup_page()))?;

    info!("HTTP: provisioning server up");
    Ok(server)
}

// ───────────────────────────────────────────────────────────────
// Pages
// ───────────────────────────────────────────────────────────────

const INDEX_HTML: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>RelayNode</title></head>
<body style="font-family:sans-serif;max-width:28em;margin:auto">
<h1>RelayNode</h1>
<p>Relay: <b id="relay">?</b> &middot; Input: <b id="input">?</b></p>
<p><button onclick="set(1)">On</button> <button onclick="set(0)">Off</button></p>
<p id="note"></p>
<p>MQTT: <span id="mqtt">?</span> &middot; <a href="/settings">Settings</a></p>
<script>
function refresh(){fetch('/api/status').then(r=>r.json()).then(s=>{
relay.textContent=s.relay?'ON':'OFF';input.textContent=s.input_pressed?'closed':'open';
mqtt.textContent=s.mqtt_enabled?(s.mqtt_connected?'connected':'offline'):'disabled';
note.textContent=s.input_pressed!==s.relay?'':'The dry contact has priority over these buttons.';});}
function set(v){fetch('/api/relay',{method:'POST',headers:{'Content-Type':'application/x-www-form-urlencoded'},body:'state='+v}).then(()=>setTimeout(refresh,100));}
refresh();setInterval(refresh,2000);
</script></body></html>
"#;

const SETTINGS_HTML: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>RelayNode settings</title></head>
<body style="font-family:sans-serif;max-width:28em;margin:auto">
<h1>MQTT</h1>
<form id="f">
<p><label><input type="checkbox" name="enabled" value="1"> Enabled</label></p>
<p>Host <input name="host"></p>
<p>Port <input name="port" type="number" min="1" max="65535"></p>
<p>User <input name="user"></p>
<p>Password <input name="pass" type="password" placeholder="unchanged"></p>
<p>Command topic <input name="cmdTopic"></p>
<p>State topic <input name="stateTopic"></p>
<p><button>Save</button> <span id="msg"></span></p>
</form>
<p><a href="/">Back</a></p>
<script>
fetch('/api/mqtt').then(r=>r.json()).then(c=>{
f.enabled.checked=c.enabled;f.host.value=c.host;f.port.value=c.port;f.user.value=c.user;
f.cmdTopic.value=c.cmdTopic;f.stateTopic.value=c.stateTopic;});
f.onsubmit=e=>{e.preventDefault();
fetch('/api/mqtt',{method:'POST',body:new URLSearchParams(new FormData(f))})
.then(r=>r.json()).then(j=>{msg.textContent=j.ok?'Saved':'Error: '+j.err;});};
</script></body></html>
"#;

const SETUP_HTML: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>RelayNode setup</title></head>
<body style="font-family:sans-serif;max-width:28em;margin:auto">
<h1>RelayNode WiFi setup</h1>
<form id="f">
<p>Network <input name="ssid" maxlength="32" required></p>
<p>Password <input name="pass" type="password" maxlength="64"></p>
<p><button>Save and restart</button></p>
</form>
<p id="msg"></p>
<script>
f.onsubmit=e=>{e.preventDefault();
fetch('/api/wifi',{method:'POST',body:new URLSearchParams(new FormData(f))})
.then(r=>r.json()).then(j=>{msg.textContent=j.ok?'Saved. The device is restarting.':'Error: '+j.err;});};
</script></body></html>
"#;

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
