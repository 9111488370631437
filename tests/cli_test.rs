use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("invoice-sync"));
    cmd.env_remove("RUST_LOG").arg("tests/fixtures/operations.csv");

    let expected = [
        "collection,key,amount,paid,paid_on",
        "invoices,INV-1001,1200.00,true,2024-04-02T14:30:00Z",
        "invoices,INV-1002,450.00,false,",
        "invoices,INV-1003,80.00,false,",
        "payments,INV-1001,1200.00,true,2024-04-02T14:30:00Z",
        "payments,INV-1002,450.00,false,",
        "payments,INV-1003,80.00,false,",
    ];

    let output = cmd.output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.lines().collect::<Vec<_>>(), expected);

    Ok(())
}

#[test]
fn test_cli_short_cooldown_still_mirrors_every_write() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("invoice-sync"));
    cmd.env_remove("RUST_LOG")
        .arg("tests/fixtures/operations.csv")
        .arg("--cooldown-ms")
        .arg("1")
        .arg("--lock-ttl-ms")
        .arg("1000");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "payments,INV-1001,1200.00,true,2024-04-02T14:30:00Z",
        ))
        .stdout(predicate::str::contains("invoices,INV-1002,450.00,false,"));

    Ok(())
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("invoice-sync"));
    cmd.arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}

#[test]
fn test_cli_rejects_lock_ttl_not_longer_than_cooldown() {
    let mut cmd = Command::new(cargo_bin!("invoice-sync"));
    cmd.arg("tests/fixtures/operations.csv")
        .arg("--lock-ttl-ms")
        .arg("0");
    cmd.assert().failure().stdout(predicate::str::is_empty());

    let mut cmd = Command::new(cargo_bin!("invoice-sync"));
    cmd.arg("tests/fixtures/operations.csv")
        .arg("--lock-ttl-ms")
        .arg("50")
        .arg("--cooldown-ms")
        .arg("100");
    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("lock TTL"));
}
