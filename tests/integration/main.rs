//! Integration tests for repocache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn repocache() -> Command {
        let mut cmd = cargo_bin_cmd!("repocache");
        cmd.env("REPOCACHE_PLAIN", "1").env_remove("RUST_LOG");
        cmd
    }

    /// Write a config placing every pool under the temp dir
    fn config(temp: &TempDir, purge_age_mins: u64) -> PathBuf {
        let root = temp.path().to_string_lossy().replace('\\', "/");
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            format!(
                "[cache]\n\
                 repositories = \"{root}/repositories\"\n\
                 commitishes = \"{root}/commitishes\"\n\
                 deploy_keys = \"{root}/deploy_keys\"\n\
                 purge_age_mins = {purge_age_mins}\n"
            ),
        )
        .unwrap();
        path
    }

    fn with_config(path: &Path) -> Command {
        let mut cmd = repocache();
        cmd.arg("--config").arg(path);
        cmd
    }

    #[test]
    fn help_displays() {
        repocache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("single-flight git snapshot cache"));
    }

    #[test]
    fn version_displays() {
        repocache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("repocache"));
    }

    #[test]
    fn config_path_follows_flag() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        with_config(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_path_from_env() {
        let temp = TempDir::new().unwrap();
        repocache()
            .env("REPOCACHE_CONFIG", temp.path().join("from-env.toml"))
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("from-env.toml"));
    }

    #[test]
    fn config_show_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 7);
        with_config(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("purge_age_mins = 7"));
    }

    #[test]
    fn config_init_then_set() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");

        with_config(&path).args(["config", "init"]).assert().success();
        assert!(path.exists());

        with_config(&path)
            .args(["config", "set", "cache.purge_age_mins", "90"])
            .assert()
            .success();
        with_config(&path)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("purge_age_mins = 90"));
    }

    #[test]
    fn config_set_rejects_unknown_key() {
        let temp = TempDir::new().unwrap();
        with_config(&temp.path().join("config.toml"))
            .args(["config", "set", "cache.size", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[cache\n").unwrap();
        with_config(&path)
            .args(["cache", "usage"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn cache_init_creates_pools() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        with_config(&path).args(["cache", "init"]).assert().success();

        for pool in ["repositories", "commitishes", "deploy_keys"] {
            assert!(temp.path().join(pool).is_dir(), "{} missing", pool);
        }
    }

    #[test]
    fn cache_usage_json() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        with_config(&path).args(["cache", "init"]).assert().success();
        let entry = temp.path().join("commitishes/github.com+acme+widgets@abc123");
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("README.md"), "0123456789").unwrap();

        with_config(&path)
            .args(["cache", "usage", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"total_bytes\": 10"));
    }

    #[test]
    fn cache_list_shows_entries() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        std::fs::create_dir_all(temp.path().join("repositories/github.com+acme+widgets")).unwrap();
        with_config(&path).args(["cache", "init"]).assert().success();

        with_config(&path)
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("github.com+acme+widgets"));
    }

    #[test]
    fn purge_keeps_locked_entries() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 0);
        with_config(&path).args(["cache", "init"]).assert().success();
        let locked = temp.path().join("commitishes/github.com+acme+widgets@abc123");
        let unlocked = temp.path().join("commitishes/github.com+acme+widgets@def456");
        std::fs::create_dir_all(locked.join(".lock")).unwrap();
        std::fs::create_dir_all(&unlocked).unwrap();

        with_config(&path)
            .args(["cache", "purge", "--dry-run"])
            .assert()
            .success()
            .stdout(predicate::str::contains("github.com+acme+widgets@def456"))
            .stdout(predicate::str::contains("1 entries would be removed"));
        assert!(unlocked.exists());

        with_config(&path)
            .args(["cache", "purge"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Purged 1 entries"));
        assert!(locked.exists());
        assert!(!unlocked.exists());
    }

    #[test]
    fn unlock_releases_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        let snapshot = temp.path().join("commitishes/github.com+acme+widgets@abc123");
        std::fs::create_dir_all(snapshot.join(".lock")).unwrap();

        with_config(&path)
            .arg("unlock")
            .arg(&snapshot)
            .assert()
            .success()
            .stdout(predicate::str::contains("Released"));
        assert!(!snapshot.join(".lock").exists());
    }

    #[test]
    fn unlock_outside_snapshot_pool_fails() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        let elsewhere = temp.path().join("project");
        std::fs::create_dir_all(elsewhere.join(".lock")).unwrap();

        with_config(&path)
            .arg("unlock")
            .arg(&elsewhere)
            .assert()
            .failure()
            .stderr(predicate::str::contains("is not a snapshot"));
        assert!(elsewhere.join(".lock").exists());
    }

    #[test]
    fn unlock_missing_entry_fails() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        with_config(&path)
            .arg("unlock")
            .arg(temp.path().join("commitishes/nothing.here.abc"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("No cache entry"));
    }

    #[test]
    fn fetch_rejects_invalid_repository() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        with_config(&path)
            .args(["fetch", "not-a-repository", "abc123", "--key-file", "/nonexistent"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid repository address"))
            .stderr(predicate::str::contains("Hint:"));
        assert!(!temp.path().join("repositories").exists());
    }

    #[test]
    fn fetch_requires_credential_on_disk() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        with_config(&path)
            .args(["fetch", "git@github.com:acme/widgets.git", "abc123", "--key-file"])
            .arg(temp.path().join("missing-key"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing deploy key"));

        let mirrors = temp.path().join("repositories");
        assert!(std::fs::read_dir(mirrors).unwrap().next().is_none());
    }

    #[test]
    fn fetch_key_needs_source() {
        let temp = TempDir::new().unwrap();
        let path = config(&temp, 30);
        with_config(&path)
            .args(["fetch", "git@github.com:acme/widgets.git", "abc123", "--key", "acme/widgets"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No deploy key source configured"));
    }

    #[test]
    fn fetch_needs_a_credential_flag() {
        repocache()
            .args(["fetch", "git@github.com:acme/widgets.git", "abc123"])
            .assert()
            .failure();
    }
}
