mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_csv_handling() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ops.csv");
    common::write_ops(
        &input,
        &[
            // Valid fund
            ["fund", "100", "USD", "GC-1", "", "", "", "", ""],
            // Unknown operation
            ["teleport", "1", "USD", "", "", "", "", "", ""],
            // Missing amount for fund (required)
            ["fund", "", "USD", "GC-1", "", "", "", "", ""],
            // Valid balance lookup afterwards
            ["balance", "", "USD", "GC-1", "", "", "", "", ""],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("splitpay"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading operation"))
        .stderr(predicate::str::contains("Error processing operation"))
        .stdout(predicate::str::contains("fund,bad-parameter"))
        .stdout(predicate::str::contains("balance,ok,100"));
}

#[test]
fn test_invalid_data_types() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ops.csv");
    common::write_ops(
        &input,
        &[
            // Text in the amount field
            ["fund", "not_a_number", "USD", "GC-2", "", "", "", "", ""],
            // Valid fund
            ["fund", "500", "USD", "GC-2", "", "", "", "", ""],
            ["balance", "", "USD", "GC-2", "", "", "", "", ""],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("splitpay"));
    cmd.arg(&input);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading operation"))
        .stdout(predicate::str::contains("balance,ok,500"));
}
