use assert_cmd::Command;
use predicates::prelude::*;

const SETTINGS: &str = "\
const userName = 1;
const itemCount = 2;
const orderTotal = 3;
const pageSize = 4;
const retryLimit = 5;
const maxWidth = 6;
";

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app/src")).unwrap();
        std::fs::create_dir_all(dir.path().join("home")).unwrap();
        Self { dir }
    }

    fn root(&self) -> std::path::PathBuf {
        self.dir.path().join("app")
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.root().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn tenet(&self) -> Command {
        let mut cmd = Command::cargo_bin("tenet").unwrap();
        cmd.current_dir(self.root())
            .env("TENET_HOME", self.dir.path().join("home"))
            .env_remove("TENET_REGISTRY")
            .env_remove("RUST_LOG");
        cmd
    }

    fn init(&self) {
        self.tenet()
            .args(["init", "--quiet"])
            .assert()
            .success();
    }

    fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.root().join(path)).unwrap()
    }
}

#[test]
fn uninitialized_project_exits_3() {
    let sb = Sandbox::new();
    sb.tenet()
        .arg("status")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not a Tenet project"));
}

#[test]
fn init_learns_and_reports() {
    let sb = Sandbox::new();
    sb.write("src/settings.ts", SETTINGS);
    sb.tenet()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized Tenet"))
        .stdout(predicate::str::contains("completed"));
    assert!(sb.root().join(".tenet/config.toml").exists());
    assert!(sb.root().join(".tenet/tenet.db").exists());

    sb.tenet()
        .args(["patterns", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("variable-naming"));

    sb.tenet()
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn check_stdin_suggests_fix() {
    let sb = Sandbox::new();
    sb.write("src/settings.ts", SETTINGS);
    sb.init();

    sb.tenet()
        .args(["check", "src/new.ts", "--stdin", "--fix", "--format", "json"])
        .write_stdin("const user_id = 1;\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("const userId = 1;"));

    sb.tenet()
        .args(["check", "src/new.ts", "--stdin", "--strict"])
        .write_stdin("const user_id = 1;\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Compliance check failed"));
}

#[test]
fn check_write_applies_fix() {
    let sb = Sandbox::new();
    sb.write("src/settings.ts", SETTINGS);
    sb.init();
    sb.write("src/extra.ts", "const page_count = 1;\nconsole.log(page_count);\n");

    sb.tenet()
        .args(["check", "src/extra.ts", "--write"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fixes written"));
    assert_eq!(
        sb.read("src/extra.ts"),
        "const pageCount = 1;\nconsole.log(pageCount);\n"
    );
}

#[test]
fn unknown_file_is_reported() {
    let sb = Sandbox::new();
    sb.init();
    sb.tenet()
        .args(["check", "src/missing.ts"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown file: src/missing.ts"));
}

#[test]
fn change_feed_is_learned() {
    let sb = Sandbox::new();
    sb.write("src/settings.ts", SETTINGS);
    sb.tenet()
        .args(["init", "--no-learn", "--quiet"])
        .assert()
        .success();

    sb.write(
        "changes.json",
        r#"[{"type": "added", "path": "src/settings.ts"}]"#,
    );
    sb.tenet()
        .args(["learn", "--changes", "changes.json", "--commit", "abc123", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"commit_sha\": \"abc123\""))
        .stdout(predicate::str::contains("\"trigger\": \"commit\""));
}

#[test]
fn exception_without_reason_is_a_usage_error() {
    let sb = Sandbox::new();
    sb.init();
    sb.tenet()
        .args(["except", "1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--reason"));
}

#[test]
fn invalid_config_exits_2() {
    let sb = Sandbox::new();
    sb.init();
    sb.write(
        ".tenet/config.toml",
        "[patterns]\nfrequency_threshold = 5\nlearning_rate = 5.0\nmax_examples = 3\n",
    );
    sb.tenet()
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("learning_rate"));
}

#[test]
fn link_and_search_across_projects() {
    let sb = Sandbox::new();
    sb.write("src/settings.ts", SETTINGS);
    sb.init();

    sb.tenet()
        .args(["link", "--name", "app"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Linked app"));

    sb.tenet()
        .args(["search", "retry", "--mode", "concepts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("retryLimit"));

    sb.tenet()
        .args(["sync", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("variable-naming"));

    sb.tenet()
        .arg("global")
        .assert()
        .success()
        .stdout(predicate::str::contains("camelCase"));
}
