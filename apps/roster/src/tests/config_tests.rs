use std::io::Write;

use super::*;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

#[test]
fn defaults_point_at_local_service() {
    let settings = Settings::default();
    assert_eq!(settings.api_base_url, "http://localhost:8080");
    assert_eq!(settings.request_timeout(), None);
    assert_eq!(settings.log_filter, "info");
    assert!(settings.validate().is_ok());
}

#[test]
fn explicit_file_overrides_defaults() {
    let file = write_config(
        r#"
api_base_url = "https://teams.example.com/api"
request_timeout_secs = 15
"#,
    );

    let settings = load_settings(Some(file.path())).expect("settings");
    assert_eq!(settings.api_base_url, "https://teams.example.com/api");
    assert_eq!(settings.request_timeout(), Some(Duration::from_secs(15)));
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().expect("dir");
    let path = dir.path().join("absent.toml");
    assert!(load_settings(Some(&path)).is_err());
}

#[test]
fn rejects_unusable_url() {
    let file = write_config(r#"api_base_url = "localhost:8080""#);
    let err = load_settings(Some(file.path())).expect_err("bad scheme");
    assert!(err.to_string().contains("http or https"));

    let settings = Settings {
        api_base_url: "not a url".into(),
        ..Settings::default()
    };
    assert!(settings.validate().is_err());
}

#[test]
fn zero_timeout_is_rejected() {
    let settings = Settings {
        request_timeout_secs: Some(0),
        ..Settings::default()
    };
    assert!(settings.validate().is_err());
}
