use super::*;
use std::sync::Mutex;

fn capture(level: LogLevel) -> (Logger, Arc<Mutex<Vec<(LogLevel, String)>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);
    let logger = Logger::new(
        move |lvl: LogLevel, msg: &str| sink_lines.lock().unwrap().push((lvl, msg.to_string())),
        level,
    );
    (logger, lines)
}

#[test]
fn levels_are_ordered_by_verbosity() {
    assert!(LogLevel::Quiet < LogLevel::Panic);
    assert!(LogLevel::Error < LogLevel::Warning);
    assert!(LogLevel::Debug < LogLevel::Trace);
}

#[test]
fn logger_filters_by_level() {
    let (logger, lines) = capture(LogLevel::Warning);
    logger.error("e");
    logger.warning("w");
    logger.info("i");
    logger.debug("d");

    let lines = lines.lock().unwrap();
    assert_eq!(
        *lines,
        vec![
            (LogLevel::Error, "e".to_string()),
            (LogLevel::Warning, "w".to_string())
        ]
    );
}

#[test]
fn quiet_messages_are_never_delivered() {
    let (logger, lines) = capture(LogLevel::Trace);
    logger.emit(LogLevel::Quiet, "nothing");
    assert!(lines.lock().unwrap().is_empty());
}

#[test]
fn null_logger_is_default() {
    let logger = Logger::default();
    assert_eq!(logger.level(), LogLevel::Quiet);
    assert!(!logger.enabled(LogLevel::Panic));
}

#[test]
fn install_then_uninstall_round_trips() {
    let (logger, lines) = capture(LogLevel::Info);
    install(logger);
    installed().info("via registry");
    uninstall();
    installed().info("dropped");

    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].1, "via registry");
}

#[test]
fn level_names_serialize_lowercase() {
    assert_eq!(
        serde_json::to_string(&LogLevel::Warning).unwrap(),
        "\"warning\""
    );
}
