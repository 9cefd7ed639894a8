//! Integration tests for the mirrorcache CLI

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn mirrorcache() -> Command {
        let mut cmd = cargo_bin_cmd!("mirrorcache");
        cmd.env_remove("MIRRORCACHE_CONFIG").env("MIRRORCACHE_PLAIN", "1");
        cmd
    }

    /// A config using a file store and a JSON-lines source inside `dir`
    fn workspace(records: usize) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();

        let lines: Vec<String> = (0..records)
            .map(|i| format!(r#"{{"id":{},"title":"design {}","owner":"ops"}}"#, i, i))
            .collect();
        std::fs::write(data.join("designs.jsonl"), lines.join("\n")).unwrap();

        let config = format!(
            r#"[general]
event_log = false

[store]
backend = "file"
path = "{store}"

[source]
path = "{data}"

[engine]
page_delay_ms = 0
lock_retry_delay_ms = 0

[[resources]]
name = "designs"
table = "designs"
page_size = 2
fields = ["id", "title"]
"#,
            store = dir.path().join("store").display(),
            data = data.display(),
        );
        let path = dir.path().join("config.toml");
        std::fs::write(&path, config).unwrap();
        (dir, path)
    }

    #[test]
    fn help_displays() {
        mirrorcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("resumable cache population"));
    }

    #[test]
    fn version_displays() {
        mirrorcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("mirrorcache"));
    }

    #[test]
    fn config_path_honors_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        mirrorcache()
            .args(["config", "path", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let dir = TempDir::new().unwrap();
        mirrorcache()
            .args(["config", "show", "--config"])
            .arg(dir.path().join("missing.toml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]"))
            .stdout(predicate::str::contains("[[resources]]"));
    }

    #[test]
    fn config_init_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        mirrorcache()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success();
        assert!(path.exists());
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "resources = []\n").unwrap();
        mirrorcache()
            .args(["status", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn read_scans_and_projects() {
        let (_dir, config) = workspace(5);
        mirrorcache()
            .args(["read", "designs", "--format", "json", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"total\": 5"))
            .stdout(predicate::str::contains("\"isComplete\": true"))
            .stdout(predicate::str::contains("design 4"))
            .stdout(predicate::str::contains("owner").not());
    }

    #[test]
    fn read_pages_with_limit() {
        let (_dir, config) = workspace(5);
        mirrorcache()
            .args(["read", "designs", "--limit", "2", "--format", "json", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("lastEvaluatedKey"));
    }

    #[test]
    fn read_unknown_resource_fails_with_hint() {
        let (_dir, config) = workspace(1);
        mirrorcache()
            .args(["read", "widgets", "--config"])
            .arg(&config)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown resource: widgets"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn run_then_status_reports_complete() {
        let (_dir, config) = workspace(7);
        mirrorcache()
            .args(["run", "--format", "plain", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("designs complete 7"));

        mirrorcache()
            .args(["status", "--format", "plain", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("designs complete complete"));
    }

    #[test]
    fn run_reports_missing_table() {
        let (dir, config) = workspace(3);
        std::fs::remove_file(dir.path().join("data").join("designs.jsonl")).unwrap();
        mirrorcache()
            .args(["run", "--format", "plain", "--config"])
            .arg(&config)
            .assert()
            .failure()
            .stdout(predicate::str::contains("designs error"))
            .stderr(predicate::str::contains("Fetch of designs failed"));
    }

    #[test]
    fn pause_then_resume() {
        let (_dir, config) = workspace(3);
        mirrorcache()
            .args(["pause", "designs", "--config"])
            .arg(&config)
            .assert()
            .success();

        mirrorcache()
            .args(["run", "--format", "plain", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("designs paused"));

        mirrorcache()
            .args(["resume", "designs", "--config"])
            .arg(&config)
            .assert()
            .success();

        mirrorcache()
            .args(["run", "--format", "plain", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("designs complete 3"));
    }

    #[test]
    fn invalidate_is_idempotent() {
        let (_dir, config) = workspace(3);
        for _ in 0..2 {
            mirrorcache()
                .args(["invalidate", "designs", "--config"])
                .arg(&config)
                .assert()
                .success();
        }
    }
}
