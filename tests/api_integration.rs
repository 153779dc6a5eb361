//! Runs the binary with `--serve` and queries the REST API over TCP.

#![cfg(feature = "api")]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

const REPORT_KEYS: &[&str] = &[
    "tick",
    "stored",
    "max",
    "demand",
    "generated",
    "wasted",
    "idle_draw",
    "raw_powered",
    "powered",
    "members",
    "anomalies",
];

struct ChildGuard {
    child: Child,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn api_state_and_telemetry_answer_over_http() {
    let port = allocate_port();
    let addr = format!("127.0.0.1:{port}");
    let _child = spawn_api_process(port);

    wait_for_server(&addr, Duration::from_secs(8));

    let (state_status, state_body) =
        http_get(&addr, "/state").expect("/state request should succeed");
    assert_eq!(state_status, 200);

    let state: Value = serde_json::from_str(&state_body).expect("state body should be JSON");
    assert_eq!(state["summary"]["ticks"].as_u64(), Some(24));
    let latest = state["latest_tick"]
        .as_object()
        .expect("latest_tick should be an object");
    assert_has_report_keys(latest);
    assert_eq!(latest.get("tick").and_then(Value::as_u64), Some(24));

    let (telemetry_status, telemetry_body) =
        http_get(&addr, "/telemetry?from=2&to=4").expect("/telemetry request should succeed");
    assert_eq!(telemetry_status, 200);

    let telemetry: Value =
        serde_json::from_str(&telemetry_body).expect("telemetry body should be JSON");
    let rows = telemetry.as_array().expect("telemetry should be an array");
    let ticks: Vec<Option<u64>> = rows.iter().map(|r| r["tick"].as_u64()).collect();
    assert_eq!(ticks, vec![Some(2), Some(3), Some(4)]);
    for row in rows {
        assert_has_report_keys(row.as_object().expect("row should be an object"));
    }

    let (bad_status, _) =
        http_get(&addr, "/telemetry?from=4&to=2").expect("/telemetry request should succeed");
    assert_eq!(bad_status, 400);
}

fn allocate_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral port bind should succeed");
    let port = listener
        .local_addr()
        .expect("local_addr should be available")
        .port();
    drop(listener);
    port
}

fn spawn_api_process(port: u16) -> ChildGuard {
    let child = Command::new(env!("CARGO_BIN_EXE_energy-grid"))
        .args([
            "--preset",
            "baseline",
            "--ticks",
            "24",
            "--quiet",
            "--serve",
            "--port",
            &port.to_string(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("energy-grid process should spawn");

    ChildGuard { child }
}

fn wait_for_server(addr: &str, timeout: Duration) {
    let start = Instant::now();
    loop {
        if let Ok((200, _)) = http_get(addr, "/state") {
            return;
        }

        if start.elapsed() >= timeout {
            panic!("timed out waiting for API server on {addr}");
        }

        thread::sleep(Duration::from_millis(50));
    }
}

fn http_get(addr: &str, path: &str) -> Result<(u16, String), String> {
    let mut stream = TcpStream::connect(addr).map_err(|err| format!("connect: {err}"))?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .map_err(|err| format!("write: {err}"))?;

    let mut raw = String::new();
    stream
        .read_to_string(&mut raw)
        .map_err(|err| format!("read: {err}"))?;

    let (head, body) = raw
        .split_once("\r\n\r\n")
        .ok_or_else(|| "invalid HTTP response".to_string())?;
    let status_code = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| "missing status code".to_string())?
        .parse::<u16>()
        .map_err(|err| format!("invalid status code: {err}"))?;

    Ok((status_code, body.to_string()))
}

fn assert_has_report_keys(object: &serde_json::Map<String, Value>) {
    for key in REPORT_KEYS {
        assert!(object.contains_key(*key), "missing key: {key}");
    }
}
