use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

struct ControllerProcess {
    child: Child,
    addr: String,
}

impl ControllerProcess {
    fn start() -> Self {
        let bin_path = env!("CARGO_BIN_EXE_vecu");

        // Reserve an ephemeral port, then hand it to the controller.
        let listener = TcpListener::bind("127.0.0.1:0")
            .expect("failed to bind ephemeral port for integration test");
        let port = listener.local_addr().expect("no local addr").port();
        let bind_addr = format!("127.0.0.1:{port}");
        drop(listener);

        let child = Command::new(bin_path)
            .args([
                "--bind",
                &bind_addr,
                "--no-sensor-feed",
                "--tick-ms",
                "100",
                "--run-seconds",
                "60",
            ])
            .spawn()
            .expect("failed to start vecu");

        // Wait for the panel port to open (up to 5s).
        let started = Instant::now();
        while started.elapsed() < Duration::from_secs(5) {
            if TcpStream::connect(&bind_addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }

        Self {
            child,
            addr: bind_addr,
        }
    }

    fn connect(&self) -> (TcpStream, BufReader<TcpStream>) {
        let stream = TcpStream::connect(&self.addr).expect("failed to connect to controller");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        (stream, reader)
    }
}

impl Drop for ControllerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Read JSON lines until `predicate` matches or the deadline passes.
fn wait_for_line(
    reader: &mut BufReader<TcpStream>,
    deadline: Duration,
    predicate: impl Fn(&serde_json::Value) -> bool,
) -> Option<serde_json::Value> {
    let started = Instant::now();
    let mut line = String::new();
    while started.elapsed() < deadline {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return None,
            Ok(_) => {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) {
                    if predicate(&value) {
                        return Some(value);
                    }
                }
            }
            Err(_) => return None,
        }
    }
    None
}

#[test]
fn panel_sees_status_and_command_effects() {
    let controller = ControllerProcess::start();
    let (mut stream, mut reader) = controller.connect();

    // The bridge publishes status unprompted.
    let status = wait_for_line(&mut reader, Duration::from_secs(5), |v| v["type"] == "status")
        .expect("no status message from controller");
    assert_eq!(status["lifecycle"], "running");
    assert_eq!(status["actuators"]["left_turn"], false);
    assert_eq!(status["engine_rpm"], 800.0);

    // An unknown action must be discarded without killing the stream.
    writeln!(stream, r#"{{"type":"command","action":"launch_missiles"}}"#).unwrap();

    writeln!(stream, r#"{{"type":"command","action":"left_turn_on"}}"#).unwrap();
    let status = wait_for_line(&mut reader, Duration::from_secs(5), |v| {
        v["type"] == "status" && v["actuators"]["left_turn"] == true
    });
    assert!(status.is_some(), "left turn indicator never switched on");

    // Pedal command: duty and derived sensors move together.
    writeln!(stream, r#"{{"type":"command","action":"accelerate"}}"#).unwrap();
    let status = wait_for_line(&mut reader, Duration::from_secs(5), |v| {
        v["type"] == "status" && v["motor_duty"] == 1
    })
    .expect("accelerate never applied");
    assert_eq!(status["direction"], "forward");
}

#[test]
fn terminate_command_notifies_and_stops_the_controller() {
    let mut controller = ControllerProcess::start();
    let (mut stream, mut reader) = controller.connect();

    // Wait until the controller is demonstrably alive.
    wait_for_line(&mut reader, Duration::from_secs(5), |v| v["type"] == "status")
        .expect("no status message from controller");

    writeln!(stream, r#"{{"type":"command","action":"terminate"}}"#).unwrap();

    let notice = wait_for_line(&mut reader, Duration::from_secs(5), |v| v["type"] == "notice")
        .expect("no termination notice from controller");
    assert_eq!(notice["reason"], "terminate");

    // The process must wind down on its own.
    let started = Instant::now();
    loop {
        if let Ok(Some(status)) = controller.child.try_wait() {
            assert!(status.success(), "controller exited with {status}");
            break;
        }
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "controller did not exit after terminate"
        );
        thread::sleep(Duration::from_millis(100));
    }
}
