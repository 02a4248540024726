use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const TWO_INVOICES: &str = "TAX INVOICE\n\
    Vendor: Acme Traders\n\
    Widget qty 2 at 50.00\n\
    Total: 100.00\n\
    \n\
    TAX INVOICE\n\
    Vendor: Beta Stores\n\
    Gadget qty 1 at 75.00\n\
    Total: 75.00\n";

/// The binary with its config directory pointed at `home`.
fn invex(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("invex").unwrap();
    cmd.env("XDG_CONFIG_HOME", home)
        .env_remove("TMP_DIR")
        .env_remove("OPENROUTER_API_KEY");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    invex(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("split"))
        .stdout(predicate::str::contains("repair"))
        .stdout(predicate::str::contains("dataset"))
        .stdout(predicate::str::contains("annotate"));
}

#[test]
fn test_split_stdin_as_json() {
    let home = TempDir::new().unwrap();
    let output = invex(home.path())
        .args(["split", "-"])
        .write_stdin(TWO_INVOICES)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let sections: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let sections = sections.as_array().unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["section_id"], 1);
    assert!(sections[1]["text"].as_str().unwrap().contains("Beta Stores"));
}

#[test]
fn test_split_file_as_text() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("batch.txt");
    fs::write(&input, TWO_INVOICES).unwrap();

    invex(home.path())
        .arg("split")
        .arg(&input)
        .args(["--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("=== Section 1"))
        .stdout(predicate::str::contains("=== Section 2"));
}

#[test]
fn test_split_missing_file() {
    let home = TempDir::new().unwrap();
    invex(home.path())
        .args(["split", "/nonexistent/invoice.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_repair_fenced_output() {
    let home = TempDir::new().unwrap();
    invex(home.path())
        .arg("repair")
        .write_stdin("Sure!\n```json\n{\"invoice_number\": \"INV-1\", \"total\": 100,}\n```")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"invoice_number\": \"INV-1\""))
        .stderr(predicate::str::contains("cleanup"));
}

#[test]
fn test_repair_unparseable_fails() {
    let home = TempDir::new().unwrap();
    invex(home.path())
        .arg("repair")
        .write_stdin("no json at all")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse model output"));
}

#[test]
fn test_repair_strict_recovers_bare_keys() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("response.txt");
    fs::write(&input, "{invoice_number: \"INV-9\", total: 100, vendor_name:").unwrap();

    invex(home.path())
        .arg("repair")
        .arg(&input)
        .assert()
        .failure();

    invex(home.path())
        .arg("repair")
        .arg(&input)
        .args(["--strict", "--compact"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#"{"invoice_number":"INV-9","total":100,"vendor_name":""}"#,
        ));
}

#[test]
fn test_annotate_round_trip() {
    let home = TempDir::new().unwrap();
    let gold = home.path().join("gold");
    let dataset = home.path().join("march_dataset.jsonl");
    fs::write(
        &dataset,
        "{\"file\":\"march.pdf\",\"section_id\":1,\"text\":\"TAX INVOICE\",\"model_output\":{\"total\":1}}\n",
    )
    .unwrap();

    invex(home.path())
        .args(["annotate", "export"])
        .arg(&dataset)
        .arg("--gold-dir")
        .arg(&gold)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported for annotation"));

    let exported = gold.join("march_dataset.jsonl");
    assert!(fs::read_to_string(&exported).unwrap().trim_start().starts_with('['));

    invex(home.path())
        .args(["annotate", "import"])
        .arg(&exported)
        .arg("--gold-dir")
        .arg(&gold)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 corrected records"));

    let gold_lines = fs::read_to_string(gold.join("corrected_gold.jsonl")).unwrap();
    assert_eq!(gold_lines.lines().count(), 1);
}

#[test]
fn test_config_init_get_set() {
    let home = TempDir::new().unwrap();

    invex(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));

    invex(home.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(home.path().join("invex").join("config.json").exists());

    invex(home.path())
        .args(["config", "get", "llm.max_tokens"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2000"));

    invex(home.path())
        .args(["config", "set", "extraction.jobs", "8"])
        .assert()
        .success();

    invex(home.path())
        .args(["config", "get", "extraction.jobs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("8"));

    invex(home.path())
        .args(["config", "set", "extraction.nonsense", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}

#[test]
fn test_extract_missing_file() {
    let home = TempDir::new().unwrap();
    invex(home.path())
        .args(["extract", "/nonexistent/scan.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_dataset_without_matches() {
    let home = TempDir::new().unwrap();
    let pattern = home.path().join("*.pdf");

    invex(home.path())
        .arg("dataset")
        .arg(pattern.to_str().unwrap())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}
