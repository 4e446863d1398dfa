use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn fixture(name: &str) -> PathBuf {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

fn mmdpack() -> Command {
    Command::new(assert_cmd::cargo_bin!("mmdpack"))
}

const MISSING_RENDERER: &str = "mmdpack-test-no-such-renderer";

/// A stand-in for `mmdc`: writes a fixed SVG to the path following `-o`, and fails for pie charts.
#[cfg(unix)]
fn fake_renderer(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake-mmdc");
    fs::write(
        &script,
        r#"#!/bin/sh
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift ;;
    -o) out="$2"; shift ;;
  esac
  shift
done
if grep -q '^pie' "$in"; then
  echo "Parse error on line 1" >&2
  exit 1
fi
printf '<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20"><rect width="10" height="10"/></svg>' > "$out"
"#,
    )
    .expect("write fake renderer");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
    script
}

#[test]
fn list_prints_one_line_per_diagram() {
    let out = mmdpack()
        .args(["list", "--engine-cmd", MISSING_RENDERER])
        .arg(fixture("notes.md"))
        .output()
        .expect("run mmdpack");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).expect("utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("1\tChart 1\tflowchart\tfailed: "));
    assert!(lines[1].starts_with("2\tChart 2\tsequence diagram\t"));
    assert!(lines[2].starts_with("3\tChart 3\tpie chart\t"));
}

#[test]
fn documents_without_diagrams_exit_with_3() {
    mmdpack()
        .args(["list", "--engine-cmd", MISSING_RENDERER])
        .arg(fixture("plain.md"))
        .assert()
        .code(3);
}

#[test]
fn unsupported_extensions_are_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let html = tmp.path().join("notes.html");
    fs::copy(fixture("notes.md"), &html).expect("copy fixture");

    mmdpack()
        .args(["list", "--engine-cmd", MISSING_RENDERER])
        .arg(&html)
        .assert()
        .code(1);
}

#[test]
fn usage_errors_exit_with_2() {
    mmdpack().arg("--bogus").assert().code(2);
    mmdpack().args(["--scale", "0"]).assert().code(2);
    mmdpack().args(["--strategy", "screenshot"]).assert().code(2);
    mmdpack()
        .arg("copy")
        .arg(fixture("notes.md"))
        .assert()
        .code(2);
}

#[test]
fn export_with_nothing_rendered_fails_without_writing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("charts.zip");

    mmdpack()
        .args(["export", "--engine-cmd", MISSING_RENDERER, "--out"])
        .arg(&out)
        .arg(fixture("notes.md"))
        .assert()
        .code(1);
    assert!(!out.exists());
}

#[cfg(unix)]
#[test]
fn export_writes_a_zip_of_rendered_diagrams() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let renderer = fake_renderer(tmp.path());
    let out = tmp.path().join("charts.zip");

    let output = mmdpack()
        .args(["export", "--scale", "1", "--engine-cmd"])
        .arg(&renderer)
        .arg("--out")
        .arg(&out)
        .arg(fixture("notes.md"))
        .output()
        .expect("run mmdpack");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("(1/2) rasterizing"), "{stderr}");
    assert!(stderr.contains("(2/2) rasterizing"), "{stderr}");

    let bytes = fs::read(&out).expect("read zip");
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("zip");
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).expect("entry").name().to_string())
        .filter(|name| !name.ends_with('/'))
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].ends_with("/1_flowchart.png"), "{names:?}");
    assert!(names[1].ends_with("/2_sequence diagram.png"), "{names:?}");
    assert!(names[0].starts_with("mermaid_charts_"), "{names:?}");
}

#[cfg(unix)]
#[test]
fn render_writes_one_png_per_rendered_diagram() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let renderer = fake_renderer(tmp.path());
    let out_dir = tmp.path().join("pngs");

    let output = mmdpack()
        .args(["render", "--engine-cmd"])
        .arg(&renderer)
        .arg("--out-dir")
        .arg(&out_dir)
        .arg(fixture("notes.md"))
        .output()
        .expect("run mmdpack");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("skipping Chart 3"));

    let png = fs::read(out_dir.join("Chart 2-sequence diagram.png")).expect("read png");
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"), "output is not a PNG");
    // Default scale is 3.
    assert_eq!(&png[16..24], &[0, 0, 0, 120, 0, 0, 0, 60]);
    assert!(out_dir.join("Chart 1-flowchart.png").exists());
    assert!(!out_dir.join("Chart 3-pie chart.png").exists());
}
