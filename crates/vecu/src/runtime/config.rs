/// The original controller attached to its panel queue under this key.
pub const DEFAULT_CHANNEL_KEY: u32 = 5678;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub panel_enabled: bool,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub tick_ms: u64,
    pub channel_key: u32,
    pub sensor_feed: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            bind_addr: "127.0.0.1:7700".to_string(),
            panel_enabled: true,
            json_logs: false,
            metrics_addr: None,
            tick_ms: 1000,
            channel_key: DEFAULT_CHANNEL_KEY,
            sensor_feed: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--bind" => {
                    if i + 1 < args.len() {
                        cfg.bind_addr = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--no-panel" => {
                    cfg.panel_enabled = false;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--tick-ms" => {
                    if i + 1 < args.len() {
                        cfg.tick_ms = args[i + 1].parse().unwrap_or(cfg.tick_ms);
                        i += 1;
                    }
                }
                "--channel-key" => {
                    if i + 1 < args.len() {
                        cfg.channel_key = args[i + 1].parse().unwrap_or(cfg.channel_key);
                        i += 1;
                    }
                }
                "--no-sensor-feed" => {
                    cfg.sensor_feed = false;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    pub fn print_help() {
        println!(
            r#"vecu - Vehicle control core simulator

USAGE:
    vecu [OPTIONS]

OPTIONS:
    --bind <ADDR>           Panel TCP bind address [default: 127.0.0.1:7700]
    --no-panel              Disable the panel bridge (standalone run)
    --run-seconds <SECS>    Run for a fixed duration then shut down
    --tick-ms <MS>          Control cycle period in milliseconds [default: 1000]
    --channel-key <KEY>     Command channel rendezvous key [default: 5678]
    --no-sensor-feed        Do not run the built-in ramp sensor feed
    --json-logs             Output logs in JSON format (for log aggregation)
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    -h, --help              Print this help message

SIGNALS:
    SIGUSR1                 Toggle pause/resume
    SIGUSR2, SIGINT         Graceful shutdown

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,vecu_core=trace)

EXAMPLES:
    # Demo run with the built-in sensor feed and metrics
    vecu --metrics-addr 0.0.0.0:9090

    # Short headless test run
    vecu --run-seconds 10 --no-panel
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("vecu")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_hold_without_flags() {
        let cfg = RuntimeConfig::from_args(&args(&[]));
        assert!(cfg.panel_enabled);
        assert!(cfg.sensor_feed);
        assert_eq!(cfg.tick_ms, 1000);
        assert_eq!(cfg.channel_key, DEFAULT_CHANNEL_KEY);
        assert_eq!(cfg.run_seconds, None);
    }

    #[test]
    fn flags_parse() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--bind",
            "127.0.0.1:9001",
            "--run-seconds",
            "5",
            "--tick-ms",
            "100",
            "--no-sensor-feed",
            "--json-logs",
        ]));
        assert_eq!(cfg.bind_addr, "127.0.0.1:9001");
        assert_eq!(cfg.run_seconds, Some(5));
        assert_eq!(cfg.tick_ms, 100);
        assert!(!cfg.sensor_feed);
        assert!(cfg.json_logs);
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let cfg = RuntimeConfig::from_args(&args(&["--tick-ms", "fast", "--channel-key", "x"]));
        assert_eq!(cfg.tick_ms, 1000);
        assert_eq!(cfg.channel_key, DEFAULT_CHANNEL_KEY);
    }

    #[test]
    fn help_short_circuits() {
        let cfg = RuntimeConfig::from_args(&args(&["--help", "--no-panel"]));
        assert!(cfg.show_help);
        // Parsing stopped at --help.
        assert!(cfg.panel_enabled);
    }
}
