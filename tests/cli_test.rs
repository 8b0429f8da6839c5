use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/entities.csv")
        .arg("tests/fixtures/operations.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("operation,type,amount,status,message"))
        .stdout(predicate::str::contains(",transfer,50,completed,"))
        .stdout(predicate::str::contains(",transfer,10,failed,source card is not active"))
        .stdout(predicate::str::contains(",merchant_payment,100,accepted,"))
        .stdout(predicate::str::contains(",merchant_payment,100,failed,account is not a merchant"))
        .stdout(predicate::str::contains(",card_payment,20,accepted,"))
        .stdout(predicate::str::contains(",card_payment,70,failed,insufficient balance"))
        .stdout(predicate::str::contains("entity,kind,name,balance,active"))
        .stdout(predicate::str::contains(
            "00000000-0000-4000-8000-000000000002,card,Alice Visa,50,true",
        ))
        .stdout(predicate::str::contains(
            "00000000-0000-4000-8000-000000000003,card,Alice Debit,40,true",
        ))
        .stdout(predicate::str::contains(
            "00000000-0000-4000-8000-000000000004,account,Corner Shop,100,true",
        ))
        .stdout(predicate::str::contains(
            "00000000-0000-4000-8000-000000000005,card,Old Card,40,false",
        ));

    Ok(())
}

#[test]
fn test_cli_skips_malformed_operations() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let operations = dir.path().join("operations.csv");
    std::fs::write(
        &operations,
        "type, source, destination, amount, card_number, card_expiry, card_cvv\n\
         refund, 00000000-0000-4000-8000-000000000002, 00000000-0000-4000-8000-000000000003, 1, , ,\n\
         transfer, 00000000-0000-4000-8000-000000000002, 00000000-0000-4000-8000-000000000003, 1, , ,\n",
    )?;

    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/entities.csv").arg(&operations);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading operation"))
        .stdout(predicate::str::contains(",transfer,1,completed,"))
        .stdout(predicate::str::contains(
            "00000000-0000-4000-8000-000000000002,card,Alice Visa,99,true",
        ));

    Ok(())
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/does_not_exist.csv")
        .arg("tests/fixtures/operations.csv");

    cmd.assert().failure();
}
