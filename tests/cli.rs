use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};

#[test]
fn help_lists_deploy_and_check() {
    let mut cmd = Command::cargo_bin("alotofeffort").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("deploy").and(predicate::str::contains("check")));
}

#[test]
fn deploy_without_bucket_fails_before_connecting() {
    let site = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("alotofeffort").expect("Binary exists");
    cmd.current_dir(site.path())
        .env_remove("BUCKET_NAME")
        .arg("deploy")
        .arg("--www-dir")
        .arg(site.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No bucket configured"));
}

#[test]
fn deploy_with_missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("alotofeffort").expect("Binary exists");
    cmd.arg("deploy")
        .arg("--config")
        .arg("this-config-does-not-exist.yaml")
        .arg("--bucket")
        .arg("some-bucket");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn check_with_invalid_config_yaml_fails() {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(config.path(), b"bucket: [unterminated\n").expect("Writing temp config failed");

    let mut cmd = Command::cargo_bin("alotofeffort").expect("Binary exists");
    cmd.arg("check")
        .arg("index.html")
        .arg("--config")
        .arg(config.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config YAML"));
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use alotofeffort::cli::{run, Cli, Commands, SiteArgs};

    // A missing config file makes run() fail before any network access.
    let cli = Cli {
        command: Commands::Deploy {
            site: SiteArgs {
                config: Some(std::path::PathBuf::from("dummy.yaml")),
                ..SiteArgs::default()
            },
            concurrency: None,
            skip_unchanged: false,
            no_skip_unchanged: false,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}

#[test]
fn skip_flags_conflict() {
    let mut cmd = Command::cargo_bin("alotofeffort").expect("Binary exists");
    cmd.arg("deploy")
        .arg("--bucket")
        .arg("some-bucket")
        .arg("--skip-unchanged")
        .arg("--no-skip-unchanged");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
