use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// `irrigation` with settings isolated to `home`.
fn irrigation(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("irrigation").unwrap();
    cmd.env("HOME", home.path())
        .env("IRRIGATION_CONFIG", home.path().join("absent.toml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

const VALID_MODELS: &str = r#"
[[data_models]]
alias = "readings"
collectionType = "moisture"
dependencies = ["view:page"]
criteria = { pagination = { page = 1, pageSize = 5 } }

[[data_models]]
alias = "latest"
modelType = "moisture"
criteria = { sorting = { column = "created_at", direction = "desc" }, pagination = { pageSize = 1 } }
"#;

#[test]
fn test_list_first_page() {
    let home = TempDir::new().unwrap();
    irrigation(&home)
        .args(["list", "--readings", "12", "--page-size", "5"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Moisture readings: page 1 of 3 (12 total)"))
        .stdout(predicate::str::contains("#5 "))
        .stdout(predicate::str::contains("#6 ").not());
}

#[test]
fn test_list_later_page() {
    let home = TempDir::new().unwrap();
    irrigation(&home)
        .args(["list", "--readings", "12", "--page-size", "5", "--page", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("page 3 of 3"))
        .stdout(predicate::str::contains("#12 "))
        .stdout(predicate::str::contains("#1 ").not());
}

#[test]
fn test_list_uses_settings_file() {
    let home = TempDir::new().unwrap();
    let settings = home.path().join("settings.toml");
    fs::write(&settings, "page_size = 4\nreadings = 8\n").unwrap();

    irrigation(&home)
        .arg("--config")
        .arg(&settings)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("page 1 of 2 (8 total)"));
}

#[test]
fn test_missing_settings_file_fails() {
    let home = TempDir::new().unwrap();
    irrigation(&home)
        .arg("--config")
        .arg(home.path().join("nope.toml"))
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Settings file not found"));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    let home = TempDir::new().unwrap();
    irrigation(&home)
        .args(["--verbose", "--quiet", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_validate_valid_file() {
    let home = TempDir::new().unwrap();
    let models = home.path().join("models.toml");
    fs::write(&models, VALID_MODELS).unwrap();

    irrigation(&home)
        .arg("validate")
        .arg(&models)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓"))
        .stdout(predicate::str::contains("is valid (2 aliases)"))
        .stdout(predicate::str::contains("view\n└── readings (on page)\n"))
        .stdout(predicate::str::contains("latest\n"));
}

#[test]
fn test_validate_json_output() {
    let home = TempDir::new().unwrap();
    let models = home.path().join("models.toml");
    fs::write(&models, VALID_MODELS).unwrap();

    let output = irrigation(&home)
        .arg("validate")
        .arg(&models)
        .args(["--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let results: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(results["valid"], true);
    assert_eq!(results["aliases"], serde_json::json!(["readings", "latest"]));
    assert_eq!(results["roots"], serde_json::json!(["latest"]));
}

#[test]
fn test_validate_reports_every_problem() {
    let home = TempDir::new().unwrap();
    let models = home.path().join("models.toml");
    fs::write(
        &models,
        r#"
[[data_models]]
alias = "readings"
collectionType = "moisure"

[[data_models]]
alias = "orphan"

[[data_models]]
alias = "child"
modelType = "moisture"
idProperty = "parnet:id"
"#,
    )
    .unwrap();

    irrigation(&home)
        .arg("validate")
        .arg(&models)
        .assert()
        .failure()
        .stdout(predicate::str::contains("✗"))
        .stdout(predicate::str::contains("did you mean \"moisture\"?"))
        .stdout(predicate::str::contains("dataModel \"orphan\""))
        .stdout(predicate::str::contains("unknown alias \"parnet\""))
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_validate_rejects_unknown_keys() {
    let home = TempDir::new().unwrap();
    let models = home.path().join("models.toml");
    fs::write(&models, "[[data_models]]\nalias = \"x\"\nmodel_type = \"moisture\"\n").unwrap();

    irrigation(&home)
        .arg("validate")
        .arg(&models)
        .assert()
        .failure()
        .stdout(predicate::str::contains("model_type"));
}
