use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn talkterm_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_talkterm").expect("talkterm test binary not built")
}

#[test]
fn help_mentions_name_and_key_flags() {
    let output = Command::new(talkterm_bin())
        .arg("--help")
        .output()
        .expect("run talkterm --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("talkterm"));
    assert!(combined.contains("--list-input-devices"));
    assert!(combined.contains("--energy-threshold"));
}

#[test]
fn rejects_invalid_flag_values() {
    let output = Command::new(talkterm_bin())
        .args(["--frame-size", "1000"])
        .output()
        .expect("run talkterm with a bad frame size");
    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("--frame-size"));
}

#[test]
fn list_input_devices_runs_to_completion() {
    // Headless CI has no audio host, so accept either a device listing or
    // the enumeration error, as long as the process does not hang or crash.
    let output = Command::new(talkterm_bin())
        .arg("--list-input-devices")
        .output()
        .expect("run talkterm --list-input-devices");
    let combined = combined_output(&output);
    assert!(
        output.status.success() || combined.contains("device"),
        "unexpected output: {combined}"
    );
}
