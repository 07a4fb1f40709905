use gateway_config::{ConfigError, GatewayConfig};
use std::time::Duration;

// 环境变量为进程级共享状态，串行放在同一个测试中。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("GATEWAY_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("GATEWAY_QUEUE_CAPACITY", "16");
        std::env::set_var("GATEWAY_ENQUEUE_TIMEOUT_MS", "250");
        std::env::set_var("GATEWAY_AUTOSTART", "off");
    }

    let config = GatewayConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.queue_capacity, 16);
    assert_eq!(config.enqueue_timeout(), Duration::from_millis(250));
    assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    assert!(!config.autostart);
    assert!(config.bootstrap_file.is_none());

    unsafe {
        std::env::set_var("GATEWAY_QUEUE_CAPACITY", "0");
    }
    let err = GatewayConfig::from_env().expect_err("zero capacity");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "GATEWAY_QUEUE_CAPACITY"));

    unsafe {
        std::env::set_var("GATEWAY_QUEUE_CAPACITY", "many");
    }
    let err = GatewayConfig::from_env().expect_err("not a number");
    assert_eq!(err.to_string(), "invalid value for GATEWAY_QUEUE_CAPACITY: many");
}
