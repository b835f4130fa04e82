//! End-to-end engine scenarios against real processes and pseudo-terminals.
//!
//! These tests drive `Engine` over inline documents and check statuses,
//! streamed `exec` output, persisted `_state_` markers and the session table.

use bte::core::types::Status;
use bte::engine::Engine;
use bte::io::config::EngineConfig;
use bte::test_support::{SharedOutput, tree_from_xml};
use bte::tree::{STATE_ATTR, Tree};

fn test_config() -> EngineConfig {
    EngineConfig {
        poll_timeout_ms: 50,
        max_ticks: Some(500),
        ..EngineConfig::default()
    }
}

fn engine_with(config: EngineConfig) -> (Engine, SharedOutput) {
    let output = SharedOutput::new();
    let engine = Engine::with_output(config, Box::new(output.clone()));
    (engine, output)
}

fn state_of<'a>(tree: &'a Tree, id: &str) -> Option<&'a str> {
    let node = tree.find_by_id(id).expect("node with id");
    tree.attr(node, STATE_ATTR)
}

#[test]
fn exec_prints_output_and_leaves_no_sessions() {
    let mut tree = tree_from_xml(
        r#"<bt><sequence><action id="hi"><exec>echo hi</exec></action></sequence></bt>"#,
    );
    let (mut engine, output) = engine_with(test_config());

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(output.contents(), "hi\n");
    assert!(outcome.reaped_sessions.is_empty());
    assert!(engine.sessions().is_empty());
    assert_eq!(state_of(&tree, "hi"), Some("success"));
}

#[test]
fn exec_streams_one_line_per_tick() {
    let mut tree = tree_from_xml(
        r#"<bt><action id="lines"><exec>printf 'a\nb\nc\n'</exec></action></bt>"#,
    );
    let (mut engine, output) = engine_with(test_config());

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(output.contents(), "a\nb\nc\n");
    assert!(outcome.ticks >= 4, "ticks = {}", outcome.ticks);
}

#[test]
fn exec_nonzero_exit_is_failure() {
    let mut tree = tree_from_xml(
        r#"<bt><action id="bad"><exec>echo oops 1>&amp;2; exit 3</exec></action></bt>"#,
    );
    let (mut engine, output) = engine_with(test_config());

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Failure);
    assert_eq!(output.contents(), "oops\n");
    assert_eq!(state_of(&tree, "bad"), Some("failure"));
    assert!(engine.sessions().is_empty());
}

#[test]
fn exec_with_missing_shell_fails_without_session() {
    let mut tree = tree_from_xml(r#"<bt><action><exec>echo hi</exec></action></bt>"#);
    let (mut engine, _output) = engine_with(EngineConfig {
        shell: "/definitely/not/a/shell".to_string(),
        ..test_config()
    });

    assert_eq!(engine.tick(&mut tree), Status::Failure);
    assert!(engine.sessions().is_empty());
}

#[test]
fn empty_exec_is_an_error() {
    let mut tree = tree_from_xml(r#"<bt><action><exec>   </exec></action></bt>"#);
    let (mut engine, _output) = engine_with(test_config());
    assert_eq!(engine.run(&mut tree).status, Status::Error);
}

#[test]
fn select_falls_back_after_failed_exec() {
    let mut tree = tree_from_xml(
        r#"<bt><select>
             <action id="first"><exec>exit 1</exec></action>
             <action id="second"><exec>echo fallback</exec></action>
           </select></bt>"#,
    );
    let (mut engine, output) = engine_with(test_config());

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(output.contents(), "fallback\n");
    assert_eq!(state_of(&tree, "first"), Some("failure"));
    assert_eq!(state_of(&tree, "second"), Some("success"));
}

#[test]
fn succeeder_turns_failed_exec_into_success() {
    let mut tree = tree_from_xml(
        r#"<bt><decorator type="succeeder"><action><exec>false</exec></action></decorator></bt>"#,
    );
    let (mut engine, _output) = engine_with(test_config());
    assert_eq!(engine.run(&mut tree).status, Status::Success);
}

#[test]
fn succeeded_nodes_are_not_rerun() {
    let mut tree = tree_from_xml(
        r#"<bt>
             <action id="done" _state_="success"><exec>echo should-not-run; exit 1</exec></action>
             <action id="opened" _state_="success" stream_id="s1"><open>cat</open></action>
           </bt>"#,
    );
    let (mut engine, output) = engine_with(test_config());

    assert_eq!(engine.tick(&mut tree), Status::Success);
    assert_eq!(output.contents(), "");
    assert!(engine.sessions().is_empty());
    assert_eq!(state_of(&tree, "done"), Some("success"));
}

#[test]
fn open_write_expect_close_round_trip() {
    let mut tree = tree_from_xml(
        r#"<bt>
             <action id="open" stream_id="s1"><open>cat</open></action>
             <action id="write" stream_id="s1"><write>hello\n</write></action>
             <action id="expect" stream_id="s1"><expect>hello</expect></action>
             <action id="close" stream_id="s1"><close/></action>
           </bt>"#,
    );
    let (mut engine, _output) = engine_with(test_config());

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Success);
    assert!(engine.sessions().get("s1").is_none());
    assert!(outcome.reaped_sessions.is_empty());
    for id in ["open", "write", "expect", "close"] {
        assert_eq!(state_of(&tree, id), Some("success"), "node {id}");
    }
}

#[test]
fn second_open_on_live_stream_is_rejected() {
    let mut tree = tree_from_xml(
        r#"<bt>
             <action id="a" stream_id="s1"><open>cat</open></action>
             <action id="b" stream_id="s1"><open>cat</open></action>
           </bt>"#,
    );
    let (mut engine, _output) = engine_with(test_config());

    assert_eq!(engine.tick(&mut tree), Status::Error);
    assert_eq!(engine.sessions().len(), 1);
    let pid = engine.sessions().get("s1").and_then(|s| s.pid());
    assert!(pid.is_some());
    assert_eq!(state_of(&tree, "a"), Some("success"));
    assert_eq!(state_of(&tree, "b"), None);

    assert_eq!(engine.shutdown(), vec!["s1".to_string()]);
}

#[test]
fn write_completes_in_chunks() {
    // 11 bytes after escape translation, 4-byte chunks.
    let mut tree = tree_from_xml(
        r#"<bt>
             <action stream_id="s1"><open>cat</open></action>
             <action id="w" stream_id="s1"><write>abcdefghij\n</write></action>
           </bt>"#,
    );
    let (mut engine, _output) = engine_with(EngineConfig {
        write_chunk_size: 4,
        poll_timeout_ms: 1000,
        ..test_config()
    });

    let mut statuses = Vec::new();
    let mut offsets = Vec::new();
    loop {
        let status = engine.tick(&mut tree);
        statuses.push(status);
        let session = engine.sessions().get("s1").expect("session");
        offsets.push(session.bytes_written());
        if status != Status::Running {
            break;
        }
        assert_eq!(state_of(&tree, "w"), Some("running"));
        assert!(statuses.len() < 10, "write never finished");
    }

    assert_eq!(
        statuses,
        vec![Status::Running, Status::Running, Status::Success]
    );
    assert_eq!(offsets, vec![4, 8, 0]);
    assert_eq!(state_of(&tree, "w"), Some("success"));
    engine.shutdown();
}

#[test]
fn expect_waits_while_nothing_arrives() {
    let mut tree = tree_from_xml(
        r#"<bt>
             <action stream_id="s1"><open>cat</open></action>
             <action id="e" stream_id="s1"><expect>never-printed</expect></action>
           </bt>"#,
    );
    let (mut engine, _output) = engine_with(test_config());

    assert_eq!(engine.tick(&mut tree), Status::Running);
    assert_eq!(engine.tick(&mut tree), Status::Running);
    assert_eq!(state_of(&tree, "e"), Some("running"));
    assert_eq!(engine.shutdown(), vec!["s1".to_string()]);
}

#[test]
fn expect_keeps_running_after_stream_ends() {
    let mut tree = tree_from_xml(
        r#"<bt>
             <action stream_id="s1"><open>echo bye</open></action>
             <action id="e" stream_id="s1"><expect>never</expect></action>
           </bt>"#,
    );
    let (mut engine, _output) = engine_with(EngineConfig {
        max_ticks: Some(8),
        ..test_config()
    });

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Running);
    assert_eq!(outcome.ticks, 8);
    assert_eq!(state_of(&tree, "e"), Some("running"));
    assert_eq!(outcome.reaped_sessions, vec!["s1".to_string()]);
}

#[test]
fn expect_matches_output_after_stream_ends() {
    let mut tree = tree_from_xml(
        r#"<bt>
             <action stream_id="s1"><open>echo bye</open></action>
             <action stream_id="s1"><expect>bye</expect></action>
             <action stream_id="s1"><close/></action>
           </bt>"#,
    );
    let (mut engine, _output) = engine_with(test_config());
    assert_eq!(engine.run(&mut tree).status, Status::Success);
}

#[test]
fn expect_matches_late_output_with_small_buffer_limit() {
    let mut tree = tree_from_xml(
        r#"<bt>
             <action stream_id="s1"><open>seq 1 3000</open></action>
             <action stream_id="s1"><expect>3000</expect></action>
             <action stream_id="s1"><close/></action>
           </bt>"#,
    );
    let (mut engine, _output) = engine_with(EngineConfig {
        expect_buffer_limit: 64,
        ..test_config()
    });
    assert_eq!(engine.run(&mut tree).status, Status::Success);
}

#[test]
fn stream_actions_without_session_are_errors() {
    let cases = [
        r#"<bt><action stream_id="nope"><close/></action></bt>"#,
        r#"<bt><action stream_id="nope"><expect>x</expect></action></bt>"#,
        r#"<bt><action stream_id="nope"><write>x</write></action></bt>"#,
    ];
    for xml in cases {
        let mut tree = tree_from_xml(xml);
        let (mut engine, _output) = engine_with(test_config());
        assert_eq!(engine.run(&mut tree).status, Status::Error, "{xml}");
    }
}

#[test]
fn missing_stream_id_is_an_error() {
    let mut tree = tree_from_xml(r#"<bt><action><open>cat</open></action></bt>"#);
    let (mut engine, _output) = engine_with(test_config());
    assert_eq!(engine.run(&mut tree).status, Status::Error);
    assert!(engine.sessions().is_empty());
}

#[test]
fn open_of_missing_program_fails() {
    let mut tree = tree_from_xml(
        r#"<bt><action stream_id="s1"><open>/definitely/not/a/program</open></action></bt>"#,
    );
    let (mut engine, _output) = engine_with(test_config());
    assert_eq!(engine.run(&mut tree).status, Status::Failure);
    assert!(engine.sessions().is_empty());
}

#[test]
fn unsupported_action_propagates_error_to_root() {
    let mut tree = tree_from_xml(
        r#"<bt><sequence>
             <action><foo/></action>
             <action id="after"><exec>echo unreachable</exec></action>
           </sequence></bt>"#,
    );
    let (mut engine, output) = engine_with(test_config());

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Error);
    assert_eq!(outcome.ticks, 1);
    assert_eq!(output.contents(), "");
    assert_eq!(state_of(&tree, "after"), None);
}

#[test]
fn teardown_closes_streams_left_open() {
    let mut tree = tree_from_xml(r#"<bt><action stream_id="left"><open>cat</open></action></bt>"#);
    let (mut engine, _output) = engine_with(test_config());

    let outcome = engine.run(&mut tree);

    assert_eq!(outcome.status, Status::Success);
    assert_eq!(outcome.reaped_sessions, vec!["left".to_string()]);
    assert!(engine.sessions().is_empty());
}
