use assert_cmd::cargo::cargo_bin_cmd;
use std::error::Error;

#[test]
fn version_flag_prints_info_and_fails() -> Result<(), Box<dyn Error>> {
    for flag in ["-v", "--version"] {
        let mut cmd = cargo_bin_cmd!("deepfake-ecg");
        cmd.arg(flag);
        let out = cmd.assert().code(1).get_output().stdout.clone();
        let text = String::from_utf8(out)?;
        assert!(text.starts_with(&format!("deepfake-ecg {}", env!("CARGO_PKG_VERSION"))));
        assert!(text.contains("cuda available: false"));
        assert!(text.contains("device: cpu"));
    }
    Ok(())
}

#[test]
fn device_choice_is_reported() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("deepfake-ecg");
    cmd.args(["--device", "cuda", "-v"]);
    let out = cmd.assert().code(1).get_output().stdout.clone();
    assert!(String::from_utf8(out)?.contains("device: cuda"));
    Ok(())
}

#[test]
fn unknown_option_prints_usage() -> Result<(), Box<dyn Error>> {
    for args in [&["--bogus"][..], &["stray"][..], &["-d", "tpu"][..]] {
        let mut cmd = cargo_bin_cmd!("deepfake-ecg");
        cmd.args(args);
        let out = cmd.assert().code(1).get_output().stdout.clone();
        assert!(String::from_utf8(out)?.contains("Usage: deepfake-ecg"));
    }
    Ok(())
}

#[test]
fn help_succeeds() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("deepfake-ecg");
    cmd.arg("--help");
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out)?;
    assert!(text.contains("--device"));
    assert!(text.contains("--listen"));
    Ok(())
}
