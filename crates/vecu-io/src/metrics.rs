//! Prometheus metrics for the vehicle control core.
//!
//! Gauges mirror the live state store; counters mirror the control
//! loop's limiter and command tallies.

use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn gauge(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

fn counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

// ============================================================================
// State gauges
// ============================================================================

pub static SPEED_KMH: LazyLock<Gauge> =
    LazyLock::new(|| gauge("vecu_speed_kmh", "Current vehicle speed in km/h"));

pub static ENGINE_RPM: LazyLock<Gauge> =
    LazyLock::new(|| gauge("vecu_engine_rpm", "Current engine RPM"));

pub static ENGINE_TEMP_C: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "vecu_engine_temp_c",
        "Derived engine temperature in Celsius",
    )
});

pub static ODOMETER_KM: LazyLock<Gauge> =
    LazyLock::new(|| gauge("vecu_odometer_km", "Accumulated distance in km"));

/// Lifecycle state (0=running, 1=paused, 2=terminating)
pub static LIFECYCLE_STATE: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "vecu_lifecycle_state",
        "Lifecycle state (0=running,1=paused,2=terminating)",
    )
});

/// Panel connection status (1 = connected, 0 = disconnected)
pub static PANEL_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    gauge(
        "vecu_panel_connected",
        "Panel client connection status (1=connected, 0=disconnected)",
    )
});

// ============================================================================
// Limiter counters
// ============================================================================

pub static SPEED_HIGH_LIMITED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "vecu_speed_high_limited_total",
        "Cycles where speed was trimmed at the high threshold",
    )
});

pub static SPEED_LOW_LIMITED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "vecu_speed_low_limited_total",
        "Cycles where speed was boosted at the low threshold",
    )
});

pub static RPM_HIGH_LIMITED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "vecu_rpm_high_limited_total",
        "Cycles where engine RPM was trimmed at the high threshold",
    )
});

pub static RPM_STALLS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "vecu_rpm_stalls_total",
        "Engine stalls detected below the idle threshold",
    )
});

pub static OVERHEAT_ALERTS: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "vecu_overheat_alerts_total",
        "Cycles at or over the temperature ceiling",
    )
});

// ============================================================================
// Loop / channel counters
// ============================================================================

pub static CYCLES_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| counter("vecu_cycles_total", "Control loop cycles executed"));

pub static COMMANDS_DISCARDED: LazyLock<IntCounter> = LazyLock::new(|| {
    counter(
        "vecu_commands_discarded_total",
        "Panel messages rejected as malformed, unknown or oversized",
    )
});

// ============================================================================
// Metrics HTTP server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(server) => server,
            Err(error) => {
                tracing::error!(%bind_addr, %error, "failed to start metrics server");
                return;
            }
        };

        tracing::info!("metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let metric_families = REGISTRY.gather();
                    let mut buffer = Vec::new();

                    if let Err(error) = encoder.encode(&metric_families, &mut buffer) {
                        tracing::warn!(%error, "failed to encode metrics");
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let response = Response::from_data(buffer).with_header(
                        tiny_http::Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        )
                        .unwrap(),
                    );
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the control loop has completed a cycle.
                    if CYCLES_TOTAL.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = SPEED_KMH.get();
    let _ = ENGINE_RPM.get();
    let _ = ENGINE_TEMP_C.get();
    let _ = ODOMETER_KM.get();
    let _ = LIFECYCLE_STATE.get();
    let _ = PANEL_CONNECTED.get();
    let _ = SPEED_HIGH_LIMITED.get();
    let _ = SPEED_LOW_LIMITED.get();
    let _ = RPM_HIGH_LIMITED.get();
    let _ = RPM_STALLS.get();
    let _ = OVERHEAT_ALERTS.get();
    let _ = CYCLES_TOTAL.get();
    let _ = COMMANDS_DISCARDED.get();
}
