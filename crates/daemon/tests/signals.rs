#![cfg(unix)]

/// The `meshecho server` process against real OS signals

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_meshecho");

/// Kills the server if an assertion fails first
struct Server {
    child: Child,
    stderr: mpsc::Receiver<String>,
}

impl Server {
    fn spawn(identity_file: &Path, services: usize) -> Self {
        let mut command = Command::new(BIN);
        command.arg("--config").arg(identity_file).arg("server");
        for i in 0..services {
            command.arg("--hostedServices").arg(format!(
                r#"{{"Name":"greeter-{}","AddressByIdentity":true}}"#,
                i
            ));
        }

        let mut child = command
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let (tx, stderr) = mpsc::channel();
        let pipe = child.stderr.take().unwrap();
        thread::spawn(move || {
            for line in BufReader::new(pipe).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self { child, stderr }
    }

    fn wait_for_log(&self, needle: &str) {
        let deadline = Instant::now() + Duration::from_secs(20);
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match self.stderr.recv_timeout(left) {
                Ok(line) if line.contains(needle) => return,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        panic!("server never logged {:?}", needle);
    }

    fn signal(&self, name: &str) {
        let status = Command::new("kill")
            .arg(format!("-{}", name))
            .arg(self.child.id().to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    fn is_running(&mut self) -> bool {
        self.child.try_wait().unwrap().is_none()
    }

    fn exit_code(&mut self) -> Option<i32> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status.code();
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("server did not exit");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn enroll(dir: &Path) -> std::path::PathBuf {
    let identity_file = dir.join("alice.json");
    let status = Command::new(BIN)
        .args(["enroll", "--name", "alice", "--directory"])
        .arg(dir.join("directory"))
        .arg("--out")
        .arg(&identity_file)
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
    identity_file
}

#[test]
fn test_hangup_while_starting_does_not_kill_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let identity_file = enroll(dir.path());

    let mut server = Server::spawn(&identity_file, 20);
    server.wait_for_log("Signal handlers registered");
    server.signal("HUP");

    server.wait_for_log(" hosting ");
    thread::sleep(Duration::from_millis(200));
    assert!(server.is_running());

    server.signal("TERM");
    assert_eq!(server.exit_code(), Some(1));
}

#[test]
fn test_hangup_is_ignored_and_terminate_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let identity_file = enroll(dir.path());

    let mut server = Server::spawn(&identity_file, 2);
    server.wait_for_log(" hosting ");

    server.signal("HUP");
    server.signal("HUP");
    thread::sleep(Duration::from_millis(300));
    assert!(server.is_running());

    server.signal("TERM");
    assert_eq!(server.exit_code(), Some(1));
}

#[test]
fn test_interrupt_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let identity_file = enroll(dir.path());

    let mut server = Server::spawn(&identity_file, 1);
    server.wait_for_log(" hosting ");

    server.signal("INT");
    assert_eq!(server.exit_code(), Some(1));
}
