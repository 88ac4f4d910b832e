use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn command_profile() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("waffle")?;
    let output = cmd.arg("profile").arg("--radius").arg("1").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout, "7.5\t3.5\t7.5\n3.5\t1\t3.5\n7.5\t3.5\t7.5\n");

    Ok(())
}

#[test]
fn command_profile_size() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("waffle")?;
    let output = cmd.arg("profile").arg("--radius").arg("3").output()?;
    let stdout = String::from_utf8(output.stdout)?;

    assert_eq!(stdout.lines().count(), 7);
    assert!(stdout.lines().all(|l| l.split('\t').count() == 7));
    assert_eq!(stdout.lines().nth(3).unwrap().split('\t').nth(3), Some("1"));

    Ok(())
}

#[test]
fn command_help() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin("waffle")?;
    cmd.arg("help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("profile"));

    Ok(())
}
