//! CLI end-to-end tests
//!
//! Tests for the digipack command-line interface.

use assert_cmd::prelude::*;
use dp_bag::{make_bag, BagInfo};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFID: &str = "2e9c6f0b1d7a4c3e8f5a6b7c8d9e0f1a";

/// Get a command for the digipack binary
#[allow(deprecated)]
fn digipack_cmd() -> Command {
    Command::cargo_bin("digipack").unwrap()
}

fn bag_info() -> BagInfo {
    BagInfo {
        archivesspace_uri: "/repositories/2/archival_objects/7".into(),
        start_date: "1950-01-01".into(),
        end_date: "1969-12-31".into(),
        origin: "digitization".into(),
        rights_ids: vec!["1".into()],
        profile_identifier: "zorya_bagit_profile.json".into(),
    }
}

fn write_config(dir: &Path, endpoint: &str) -> std::path::PathBuf {
    let config = format!(
        r#"
variant = "image"

[storage]
root = "{storage}"

[parameters]
root = "{parameters}"

[notifications]
endpoint = "{endpoint}"
"#,
        storage = dir.join("storage").display(),
        parameters = dir.join("parameters").display(),
    );
    let path = dir.join("digipack.toml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = digipack_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = digipack_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("digipack"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = digipack_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digipack "));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = digipack_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"));
}

#[test]
fn test_cli_run_help_lists_env_vars() {
    let mut cmd = digipack_cmd();
    cmd.args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("REFID"))
        .stdout(predicate::str::contains("AWS_DESTINATION_BUCKET"));
}

/// `run` without its required arguments is a usage error.
#[test]
fn test_cli_run_missing_args() {
    let mut cmd = digipack_cmd();
    cmd.arg("run")
        .env_remove("REFID")
        .env_remove("RIGHTS_IDS")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--refid"));
}

#[test]
fn test_cli_validate_config_file() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "http://localhost:9/events");

    let mut cmd = digipack_cmd();
    cmd.args(["validate", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Variant: image"));
}

#[test]
fn test_cli_validate_rejects_bad_endpoint() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "ftp://example.org");

    let mut cmd = digipack_cmd();
    cmd.args(["validate", config.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn test_cli_verify_bag() {
    let dir = tempdir().unwrap();
    let bag = dir.path().join("bag");
    fs::create_dir_all(&bag).unwrap();
    fs::write(bag.join("page_001.tif"), b"pixels").unwrap();
    make_bag(&bag, &bag_info()).unwrap();

    let mut cmd = digipack_cmd();
    cmd.args(["verify-bag", bag.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("is a valid bag"))
        .stdout(predicate::str::contains("Origin: digitization"));

    fs::write(bag.join("data/page_001.tif"), b"tampered").unwrap();
    let mut cmd = digipack_cmd();
    cmd.args(["verify-bag", bag.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page_001.tif"));
}

/// Full image run against a mocked registry and notification endpoint.
#[tokio::test(flavor = "multi_thread")]
async fn test_cli_run_image_package() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/packager/login"))
        .and(query_param("password", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "session": "token-123"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repositories/2/find_by_id/archival_objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "archival_objects": [{"ref": "/repositories/2/archival_objects/7"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repositories/2/archival_objects/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "dates": [{"date_type": "inclusive", "begin": "1950", "end": "1969"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &format!("{}/events", server.uri()));

    let params = dir.path().join("parameters/dev/digitized_image_packaging");
    fs::create_dir_all(&params).unwrap();
    fs::write(params.join("AS_BASEURL"), server.uri()).unwrap();
    fs::write(params.join("AS_REPO"), "2").unwrap();
    fs::write(params.join("AS_USERNAME"), "packager").unwrap();
    fs::write(params.join("AS_PASSWORD"), "secret\n").unwrap();

    let source = dir.path().join("source").join(REFID);
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("page_001.tif"), b"pixels").unwrap();

    let tmp = dir.path().join("tmp");
    let mut cmd = digipack_cmd();
    cmd.args(["--config", config.to_str().unwrap(), "run"])
        .args(["--refid", REFID, "--rights-ids", "1,2"])
        .args(["--tmp-dir", tmp.to_str().unwrap()])
        .args(["--source-dir", dir.path().join("source").to_str().unwrap()])
        .args(["--destination", "packages", "--topic", "packaging"])
        .args(["--env", "dev", "--app-config-path", "digitized_image_packaging"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Packaged {REFID} (image)")));

    let package = dir
        .path()
        .join("storage/packages")
        .join(format!("{REFID}.tar.gz"));
    assert!(package.is_file());
    assert_eq!(
        fs::read_to_string(dir.path().join("storage/packages/.meta").join(format!("{REFID}.tar.gz")))
            .unwrap(),
        "application/gzip"
    );
    assert!(!source.exists());

    let extracted = dir.path().join("extracted");
    let bag = dp_bag::extract(&package, &extracted).unwrap();
    let report = dp_bag::validate_bag(&bag).unwrap();
    assert_eq!(report.info["End-Date"], vec!["1969-12-31"]);
    assert_eq!(report.info["Rights-ID"], vec!["1", "2"]);

    let requests = server.received_requests().await.unwrap();
    let event = requests
        .iter()
        .find(|r| r.url.path() == "/events")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&event.body).unwrap();
    assert_eq!(body["topic"], "packaging");
    assert_eq!(body["attributes"]["outcome"], "SUCCESS");
    assert_eq!(body["attributes"]["format"], "image");
}

/// A missing source object fails the run and keeps the exit status non-zero.
#[tokio::test(flavor = "multi_thread")]
async fn test_cli_run_failure_exit_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users/packager/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "session": "token-123"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), &format!("{}/events", server.uri()));
    let params = dir.path().join("parameters/dev/app");
    fs::create_dir_all(&params).unwrap();
    for (name, value) in [
        ("AS_BASEURL", server.uri()),
        ("AS_REPO", "2".to_string()),
        ("AS_USERNAME", "packager".to_string()),
        ("AS_PASSWORD", "secret".to_string()),
    ] {
        fs::write(params.join(name), value).unwrap();
    }

    let mut cmd = digipack_cmd();
    cmd.args(["--config", config.to_str().unwrap(), "run"])
        .args(["--refid", REFID, "--rights-ids", "1"])
        .args(["--tmp-dir", dir.path().join("tmp").to_str().unwrap()])
        .args(["--source-dir", dir.path().join("source").to_str().unwrap()])
        .args(["--destination", "packages", "--topic", "packaging"])
        .args(["--env", "dev", "--app-config-path", "app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed after configured"));

    let requests = server.received_requests().await.unwrap();
    let event = requests
        .iter()
        .find(|r| r.url.path() == "/events")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&event.body).unwrap();
    assert_eq!(body["attributes"]["outcome"], "FAILURE");
    assert_eq!(body["attributes"]["format"], "image");
}
