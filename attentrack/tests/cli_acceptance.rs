use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
        }
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("attentrack");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

fn run(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("attentrack"));

    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute attentrack: {e}"))
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn status_without_config_shows_defaults() {
    let env = CliTestEnv::new();

    let output = run(&env, &["status"]);
    assert!(output.status.success(), "status failed: {:?}", output);

    let out = stdout(&output);
    assert!(out.contains("Tab tracking:    true"));
    assert!(out.contains("Gaze tracking:   false"));
    assert!(out.contains("Idle threshold:  60s"));
    assert!(out.contains("Sync is disabled"));
}

#[test]
fn status_reads_config_file() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[tracking]
enable_gaze_tracking = true
idle_threshold_ms = 120000

[sync]
enabled = true
server_url = "https://study.example.com/api"
api_token = "token"
"#,
    );

    let output = run(&env, &["status"]);
    assert!(output.status.success(), "status failed: {:?}", output);

    let out = stdout(&output);
    assert!(out.contains("Gaze tracking:   true"));
    assert!(out.contains("Idle threshold:  120s"));
    assert!(out.contains("API token:       <set>"));
    assert!(out.contains("Status: Ready to report"));
}

#[test]
fn backend_commands_explain_missing_sync() {
    let env = CliTestEnv::new();

    let output = run(&env, &["analytics", "--days", "14"]);
    assert!(output.status.success(), "analytics failed: {:?}", output);
    assert!(stdout(&output).contains("Sync is not configured"));
}

#[test]
fn forget_requires_confirmation() {
    let env = CliTestEnv::new();

    let output = run(&env, &["forget"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--yes"));
}

#[test]
fn invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[sync]
enabled = true
server_url = "ftp://nope"
"#,
    );

    let output = run(&env, &["status"]);
    assert!(!output.status.success());
}
