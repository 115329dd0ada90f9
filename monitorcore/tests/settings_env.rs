//! Environment layer of the settings. Kept in its own test binary because
//! the variables are process-wide.

use std::io::Write;
use std::path::PathBuf;

use monitorcore::Settings;

#[test]
fn test_environment_overrides_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[pipeline]
subscriber_queue = 8
decode_log_limit = 2

[log]
level = "warn"
"#
    )
    .unwrap();

    std::env::set_var("MONITORCORE_PRODUCER__SEARCH_PATHS", "x/monitor,y/monitor");
    std::env::set_var("MONITORCORE_PIPELINE__SUBSCRIBER_QUEUE", "3");
    std::env::set_var("MONITORCORE_WEB__LISTEN", "127.0.0.1:9999");

    let settings = Settings::load(Some(file.path())).unwrap();

    assert_eq!(
        settings.producer.search_paths,
        vec![PathBuf::from("x/monitor"), PathBuf::from("y/monitor")]
    );
    assert_eq!(settings.pipeline.subscriber_queue, 3);
    assert_eq!(settings.web.listen, "127.0.0.1:9999".parse().unwrap());
    // Keys only the file sets keep the file's value.
    assert_eq!(settings.pipeline.decode_log_limit, 2);
    assert_eq!(settings.log.level, "warn");
}
