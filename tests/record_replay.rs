//! Cassette replay integration tests - zero network I/O beyond loopback.
//!
//! The gateway runs with `DREAMGATE_REPLAY` set so it never contacts the
//! remote Space; the client talks to it over localhost.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    assert_cmd::cargo::cargo_bin_cmd!("dreamgate")
}

/// Absolute path to the `test_fixtures` directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_fixtures")
}

/// A gateway process that is killed on drop.
struct Gateway {
    child: Child,
    addr: SocketAddr,
}

impl Gateway {
    fn start(cassette: &std::path::Path, token: Option<&str>) -> Self {
        let addr = {
            let free = TcpListener::bind("127.0.0.1:0").unwrap();
            free.local_addr().unwrap()
        };
        let mut command = StdCommand::new(env!("CARGO_BIN_EXE_dreamgate"));
        command
            .args(["serve", "--host", "127.0.0.1", "--port", &addr.port().to_string()])
            .env("DREAMGATE_REPLAY", cassette)
            .env("DREAMGATE_CONFIG", std::env::temp_dir().join("dreamgate_no_such_config.toml"))
            .env_remove("DREAMGATE_REC")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match token {
            Some(token) => command.env("HF_TOKEN", token),
            None => command.env_remove("HF_TOKEN"),
        };
        let child = command.spawn().unwrap();

        let deadline = Instant::now() + Duration::from_secs(15);
        while TcpStream::connect(addr).is_err() {
            assert!(Instant::now() < deadline, "gateway did not start listening");
            std::thread::sleep(Duration::from_millis(50));
        }
        Self { child, addr }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn png_fixture(dir_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("face.png");
    image::DynamicImage::new_rgb8(4, 4).save_with_format(&path, image::ImageFormat::Png).unwrap();
    path
}

#[test]
fn replayed_generation_prints_url_and_seed() {
    let gateway = Gateway::start(&fixtures_dir().join("dreamo_guitar.cassette.yaml"), Some("hf_test"));
    let image = png_fixture("dreamgate_replay_happy");

    cmd()
        .args(["generate", "--server", &gateway.url(), "--ref-image1"])
        .arg(&image)
        .arg("a person playing guitar in the street")
        .assert()
        .success()
        .stdout(predicate::str::contains("/gradio_api/file=/tmp/gradio/guitar.webp"))
        .stderr(predicate::str::contains("Seed: 8431092271"));

    let _ = std::fs::remove_dir_all(image.parent().unwrap());
}

#[test]
fn exhausted_cassette_surfaces_as_error() {
    let gateway = Gateway::start(&fixtures_dir().join("dreamo_guitar.cassette.yaml"), Some("hf_test"));
    let image = png_fixture("dreamgate_replay_exhausted");

    let generate = || {
        let mut command = cmd();
        command.args(["generate", "--server", &gateway.url(), "--ref-image1"]).arg(&image).arg("a cat");
        command
    };
    generate().assert().success();
    generate().assert().failure().stderr(predicate::str::contains("Cassette exhausted"));

    let _ = std::fs::remove_dir_all(image.parent().unwrap());
}

#[test]
fn gateway_without_token_refuses_generation() {
    let image = png_fixture("dreamgate_replay_no_token");

    // Absent, then present without the `hf_` prefix.
    for token in [None, Some("abc123")] {
        let gateway = Gateway::start(&fixtures_dir().join("dreamo_guitar.cassette.yaml"), token);
        cmd()
            .args(["generate", "--server", &gateway.url(), "--ref-image1"])
            .arg(&image)
            .arg("a cat")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing or invalid Hugging Face token"));
    }

    let _ = std::fs::remove_dir_all(image.parent().unwrap());
}

#[test]
fn replayed_error_is_forwarded() {
    let cassette_content = "name: quota\nrecorded_at: \"2026-02-01T00:00:00Z\"\ncommit: test\ninteractions:\n  - seq: 0\n    port: generation_model\n    method: predict\n    input: {}\n    output:\n      Err: You have exceeded your GPU quota\n";
    let cassette_path = std::env::temp_dir().join("dreamgate_test_quota.cassette.yaml");
    std::fs::write(&cassette_path, cassette_content).unwrap();

    let gateway = Gateway::start(&cassette_path, Some("hf_test"));
    let image = png_fixture("dreamgate_replay_quota");

    cmd()
        .args(["generate", "--server", &gateway.url(), "--ref-image1"])
        .arg(&image)
        .arg("a cat")
        .assert()
        .failure()
        .stderr(predicate::str::contains("You have exceeded your GPU quota"));

    drop(gateway);
    let _ = std::fs::remove_dir_all(image.parent().unwrap());
    let _ = std::fs::remove_file(&cassette_path);
}
