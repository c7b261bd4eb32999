use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

fn cli(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("country-fx").unwrap();
    cmd.env_remove("DATABASE_URL")
        .env_remove("SUMMARY_IMAGE_PATH")
        .env("RUST_LOG", "warn")
        .arg("--database")
        .arg(db);
    cmd
}

fn stdout_json(cmd: &mut Command) -> Value {
    let out = cmd.output().unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("country-fx").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("country-fx"))
        .stdout(predicate::str::contains("refresh"));
}

#[test]
fn offline_create_get_list_delete() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("countries.db");

    let created = stdout_json(cli(&db).args([
        "create",
        "--name",
        "Testland",
        "--currency",
        "tst",
        "--population",
        "1000",
        "--rate",
        "2.5",
        "--region",
        "Nowhere",
    ]));
    assert_eq!(created["currency_code"], "TST");
    assert_eq!(created["estimated_gdp"].as_f64(), Some(2500.0));

    stdout_json(cli(&db).args([
        "create", "--name", "Bigland", "--currency", "BIG", "--population", "5000", "--rate",
        "1",
    ]));

    let got = stdout_json(cli(&db).args(["get", "TESTLAND"]));
    assert_eq!(got["name"], "Testland");
    assert_eq!(got["region"], "Nowhere");

    let listed = stdout_json(cli(&db).args(["list", "sort=gdp_desc"]));
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Bigland", "Testland"]);

    let filtered = stdout_json(cli(&db).args(["list", "region=nowhere&min_population=10"]));
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let updated = stdout_json(cli(&db).args(["update", "Testland", "--population", "2000"]));
    assert_eq!(updated["estimated_gdp"].as_f64(), Some(5000.0));

    let status = stdout_json(cli(&db).arg("status"));
    assert_eq!(status["total_countries"], 2);

    stdout_json(cli(&db).args(["delete", "testland"]));
    cli(&db)
        .args(["get", "Testland"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(r#""error":"not_found""#))
        .stderr(predicate::str::contains(r#""status":404"#));
}

#[test]
fn client_errors_are_reported_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("countries.db");
    let create = [
        "create", "--name", "Testland", "--currency", "TST", "--population", "1", "--rate", "1",
    ];
    cli(&db).args(create).assert().success();
    cli(&db)
        .args(create)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("duplicate_key"));

    cli(&db)
        .args(["list", "color=blue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid_query"));

    cli(&db)
        .args(["list", "sort=gdp_sideways"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(r#""status":400"#));
}

#[test]
fn list_words_are_taken_literally() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("countries.db");
    for (name, region) in [("Plusland", "Bosnia+Herzegovina"), ("Spaceland", "Bosnia Herzegovina")] {
        cli(&db)
            .args(["create", "--name", name, "--currency", "BAM", "--population", "1"])
            .args(["--rate", "1.8", "--region", region])
            .assert()
            .success();
    }

    let plus = stdout_json(cli(&db).args(["list", "region=Bosnia+Herzegovina"]));
    assert_eq!(plus.as_array().unwrap().len(), 1);
    assert_eq!(plus[0]["name"], "Plusland");

    let encoded = stdout_json(cli(&db).args(["list", "region=Bosnia+Herzegovina&limit=5"]));
    assert_eq!(encoded[0]["name"], "Spaceland");
}

#[test]
fn export_and_image_from_stored_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("countries.db");
    cli(&db)
        .args([
            "create", "--name", "Testland", "--currency", "TST", "--population", "1000",
            "--rate", "2.5",
        ])
        .assert()
        .success();

    let csv = dir.path().join("out.csv");
    cli(&db)
        .args(["export", "--out"])
        .arg(&csv)
        .assert()
        .success();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert!(text.lines().nth(1).unwrap().starts_with("Testland,"));

    let svg = dir.path().join("img/summary.svg");
    cli(&db)
        .args(["image", "--out"])
        .arg(&svg)
        .assert()
        .success();
    assert!(std::fs::read_to_string(&svg).unwrap().contains("Testland"));
}

#[test]
fn refresh_against_unreachable_upstream_fails_with_503() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("countries.db");
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    cli(&db)
        .args(["--countries-url", &format!("http://127.0.0.1:{port}/")])
        .args(["--timeout", "2", "refresh"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("upstream_unavailable"))
        .stderr(predicate::str::contains(r#""status":503"#));
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn refresh_online() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("countries.db");
    let img = dir.path().join("summary.png");
    let report = stdout_json(
        cli(&db)
            .arg("--summary-image")
            .arg(&img)
            .arg("refresh"),
    );
    assert!(report["countries_processed"].as_u64().unwrap() > 100);
    assert!(img.exists());
}
