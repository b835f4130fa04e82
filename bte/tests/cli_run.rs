//! Exit-code contract of the `bte` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use bte::test_support::temp_document;

fn run_bte(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bte"))
        .args(args)
        .output()
        .expect("run bte")
}

fn run_document(xml: &str) -> Output {
    let (_dir, path) = temp_document(xml).expect("temp document");
    run_bte(&[path.to_str().expect("utf-8 path")])
}

#[test]
fn successful_tree_exits_zero_and_streams_output() {
    let out = run_document(r#"<bt><action><exec>echo from-tree</exec></action></bt>"#);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "from-tree\n");
}

#[test]
fn failing_tree_exits_one() {
    let out = run_document(r#"<bt><action><exec>exit 7</exec></action></bt>"#);
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn invalid_action_exits_three() {
    let out = run_document(r#"<bt><action><foo/></action></bt>"#);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn wrong_root_element_exits_three() {
    let out = run_document(r#"<tree><action><exec>true</exec></action></tree>"#);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn missing_document_exits_three() {
    let out = run_bte(&["/definitely/not/a/tree.xml"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(!out.stderr.is_empty());
}

#[test]
fn missing_argument_exits_three() {
    let out = run_bte(&[]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn tick_limit_exits_two() {
    let (dir, path) = temp_document(
        r#"<bt>
             <action stream_id="s1"><open>cat</open></action>
             <action stream_id="s1"><expect>never-printed</expect></action>
           </bt>"#,
    )
    .expect("temp document");
    let config = dir.path().join("bte.toml");
    write_config(&config, "poll_timeout_ms = 10\nmax_ticks = 3\n");

    let out = run_bte(&[
        "--config",
        config.to_str().expect("utf-8 path"),
        path.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn invalid_config_exits_three() {
    let (dir, path) = temp_document(r#"<bt><action><exec>true</exec></action></bt>"#)
        .expect("temp document");
    let config = dir.path().join("bte.toml");
    write_config(&config, "write_chunk_size = 0\n");

    let out = run_bte(&[
        "--config",
        config.to_str().expect("utf-8 path"),
        path.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn debug_flag_traces_to_stderr() {
    let (_dir, path) =
        temp_document(r#"<bt><action><exec>true</exec></action></bt>"#).expect("temp document");
    let out = run_bte(&[path.to_str().expect("utf-8 path"), "-d"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(!out.stderr.is_empty());
    assert!(out.stdout.is_empty());
}

fn write_config(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write config");
}
