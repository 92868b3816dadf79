use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_diffscope"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "diffscope init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".diffscope.toml");
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[git]"));
    assert!(content.contains("[scope]"));
    assert!(content.contains("[report]"));

    let config = diffscope_core::DiffScopeConfig::from_toml(&content).unwrap();
    assert_eq!(config.git.destination_remote, "destination");
    assert_eq!(config.report.severity_threshold, 4);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".diffscope.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_diffscope"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".diffscope.toml")).unwrap(),
        "# existing"
    );
}
