//! Process-level startup behaviour of the `nexthop` binary.

use std::net::{SocketAddr, TcpStream};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nexthop::lifecycle::daemon::{SENTINEL_VALUE, SENTINEL_VAR};

mod common;

fn nexthop() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_nexthop"));
    command
        .env_remove(SENTINEL_VAR)
        .env_remove("NEXTHOP_HOST")
        .env_remove("NEXTHOP_URL")
        .env_remove("NEXTHOP_LISTEN")
        .env_remove("NEXTHOP_CA_FILE")
        .env_remove("NEXTHOP_CONFIG")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

fn wait_until_listening(addr: SocketAddr) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_ok() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn test_malformed_upstream_exits_non_zero() {
    let status = nexthop()
        .args(["--nexthop", "not a url", "--daemon", "--listen", "127.0.0.1:0"])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_bind_failure_exits_non_zero() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();

    let status = nexthop()
        .args(["--nexthop", "http://127.0.0.1:9/", "--listen", &addr.to_string()])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_launcher_exits_zero_without_binding() {
    // The port stays occupied, so a launcher that tried to bind would exit 1.
    // The relaunched worker fails to bind and exits on its own.
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();

    let status = nexthop()
        .args([
            "--daemon",
            "--nexthop",
            "http://127.0.0.1:9/",
            "--listen",
            &addr.to_string(),
        ])
        .status()
        .unwrap();

    assert!(status.success());
}

#[test]
fn test_worker_with_sentinel_binds_and_serves() {
    let addr = common::unused_addr();

    let mut child = nexthop()
        .env(SENTINEL_VAR, SENTINEL_VALUE)
        .args([
            "--daemon",
            "--nexthop",
            "http://127.0.0.1:9/",
            "--listen",
            &addr.to_string(),
        ])
        .spawn()
        .unwrap();

    let listening = wait_until_listening(addr);
    let still_running = child.try_wait().unwrap().is_none();

    let _ = child.kill();
    let _ = child.wait();

    assert!(listening, "worker never bound {addr}");
    assert!(still_running, "worker exited instead of serving");
}
