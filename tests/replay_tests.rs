mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_same_key_returns_the_original_charge() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ops.csv");
    common::write_ops(
        &input,
        &[
            ["fund", "10000", "USD", "GC-R", "", "", "", "", ""],
            ["charge", "10100", "USD", "GC-R", "", "", "tok_visa", "", "order-1"],
            ["charge", "10100", "USD", "GC-R", "", "", "tok_visa", "", "order-1"],
            ["balance", "", "USD", "GC-R", "", "", "", "", ""],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("splitpay"));
    cmd.arg(&input);
    let output = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output).unwrap();

    let charge_rows: Vec<&str> = text
        .lines()
        .filter(|line| line.starts_with("charge,"))
        .collect();
    assert_eq!(charge_rows.len(), 2);
    // The replay hands back the very same pair of transactions.
    assert_eq!(charge_rows[0], charge_rows[1]);
    assert!(charge_rows[0].contains(",txn_"));
    assert!(charge_rows[0].contains(",ch_"));

    // Only one debit happened.
    assert!(text.lines().any(|line| line == "balance,ok,0,,,,"));
}

#[test]
fn test_replayed_key_with_a_changed_amount_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ops.csv");
    common::write_ops(
        &input,
        &[
            ["fund", "10000", "USD", "GC-R", "", "", "", "", ""],
            ["charge", "10100", "USD", "GC-R", "", "", "tok_visa", "", "order-1"],
            ["charge", "9999", "USD", "GC-R", "", "", "tok_visa", "", "order-1"],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("splitpay"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("charge,ok,10000,100"))
        .stdout(predicate::str::contains("charge,bad-parameter"))
        .stderr(predicate::str::contains("Error processing operation"));
}
