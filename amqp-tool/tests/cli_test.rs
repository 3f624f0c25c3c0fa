use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use assert_cmd::Command; // Run programs

/// The broker to run against, from `$RABBITMQ_URL`, or
/// "amqp://127.0.0.1:5672/%2f" if that isn't set
fn amqp_url() -> String {
    std::env::var("RABBITMQ_URL").unwrap_or("amqp://127.0.0.1:5672/%2f".to_string())
}

fn amqptool() -> eyre::Result<Command> {
    Ok(Command::cargo_bin("amqptool")?)
}

#[test]
fn help_lists_subcommands() -> eyre::Result<()> {
    amqptool()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("consume"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("produce"));
    Ok(())
}

#[test]
fn missing_message_file() -> eyre::Result<()> {
    amqptool()?
        .args(["produce", "ex", "rk", "/no/such/message"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to read /no/such/message"));
    Ok(())
}

#[test]
fn bad_endpoint_url() -> eyre::Result<()> {
    amqptool()?
        .args(["consume", "test_q", "--endpoint", "not a url"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn connection_refused() -> eyre::Result<()> {
    // Nothing listens on port 1
    amqptool()?
        .args(["consume", "test_q", "-e", "amqp://127.0.0.1:1/%2f"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to authenticate as 'guest'"));
    Ok(())
}

#[test]
#[ignore = "needs a running broker at $RABBITMQ_URL"]
fn produce_then_consume() -> eyre::Result<()> {
    let url = amqp_url();
    let queue = format!("amqptool_test_{}", std::process::id());

    // Declares the queue, which is empty, then gives up waiting
    amqptool()?
        .args(["inspect", &queue, "-e", &url, "--receive-timeout", "1"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    // The default exchange routes straight to the queue
    amqptool()?
        .args(["produce", "", &queue, "-", "-e", &url])
        .write_stdin("hello")
        .assert()
        .success();

    amqptool()?
        .args(["consume", &queue, "-e", &url, "--receive-timeout", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Consumer tag: mytag"))
        .stdout(predicate::str::contains(format!("Routing key: {queue}")))
        .stdout(predicate::str::contains("Redelivered: false"))
        .stdout(predicate::str::ends_with("hello\n"));

    // Acknowledged messages are not delivered again
    amqptool()?
        .args(["inspect", &queue, "-e", &url, "--receive-timeout", "1"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    Ok(())
}

#[test]
#[ignore = "needs a running broker at $RABBITMQ_URL"]
fn wrong_password() -> eyre::Result<()> {
    let passwd = tempfile::NamedTempFile::new()?;
    std::fs::write(passwd.path(), "not the password\n")?;
    amqptool()?
        .args(["consume", "test_q", "-e", &amqp_url()])
        .arg("--passwd-file")
        .arg(passwd.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to authenticate"));
    Ok(())
}
