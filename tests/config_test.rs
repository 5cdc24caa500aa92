use task_logger::config::Config;
use uuid::Uuid;

// Environment variables are process-wide; keep every case in one test.
#[test]
fn config_from_env() {
    unsafe {
        std::env::remove_var("OTEL_ENDPOINT");
        std::env::remove_var("OTEL_SERVICE_NAME");
        std::env::remove_var("LOG_LEVEL");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.otel_endpoint, None);
    assert_eq!(config.service_name, "task-logger");
    assert_eq!(config.log_level, "info");

    unsafe {
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
        std::env::set_var("OTEL_SERVICE_NAME", "ingest");
        std::env::set_var("LOG_LEVEL", "task_logger=debug,warn");
    }
    let config = Config::from_env().unwrap();
    let telemetry = config.telemetry();
    assert_eq!(telemetry.endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(telemetry.service_name, "ingest");
    assert_eq!(telemetry.log_level, "task_logger=debug,warn");

    unsafe {
        std::env::set_var("OTEL_ENDPOINT", "  ");
        std::env::set_var("LOG_LEVEL", "task_logger=loud");
    }
    let result = Config::from_env();
    assert!(result.is_err());

    unsafe {
        std::env::remove_var("OTEL_ENDPOINT");
        std::env::remove_var("OTEL_SERVICE_NAME");
        std::env::remove_var("LOG_LEVEL");
    }

    // A .env file fills in whatever the process environment leaves unset.
    let path = std::env::temp_dir().join(format!("task-logger-{}.env", Uuid::new_v4()));
    std::fs::write(
        &path,
        "OTEL_SERVICE_NAME=from-dotenv\nLOG_LEVEL=debug\n",
    )
    .unwrap();
    dotenvy::from_path(&path).unwrap();
    let config = Config::from_env().unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.otel_endpoint, None);
    assert_eq!(config.service_name, "from-dotenv");
    assert_eq!(config.log_level, "debug");

    unsafe {
        std::env::remove_var("OTEL_SERVICE_NAME");
        std::env::remove_var("LOG_LEVEL");
    }
}
