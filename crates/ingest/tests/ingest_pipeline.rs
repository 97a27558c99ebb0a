mod support;

use std::fs::{self, OpenOptions};
use std::io::Write;

use ingest::{IngestError, SyncMode, sync_all, sync_file};
use support::*;
use tracker_core::StatsFilter;

fn basic_transcript() -> Vec<String> {
    vec![
        user_line("u1", "2025-01-15T10:00:00.000Z", "hello"),
        assistant_line("msg-1", "2025-01-15T10:00:04.000Z", Some(SONNET), [1000, 500, 100, 200]),
        user_line("u2", "2025-01-15T10:05:00.000Z", "again"),
        assistant_line("msg-2", "2025-01-15T10:05:06.000Z", Some(SONNET), [1000, 400, 200, 200]),
        user_line("u3", "2025-01-15T10:10:00.000Z", "one more"),
        assistant_line("msg-3", "2025-01-15T10:10:08.000Z", Some(SONNET), [1000, 400, 200, 200]),
    ]
}

#[test]
fn sync_file_stores_session_and_totals() {
    let mut ws = Workspace::new();
    let path = ws.write_main("sess-basic", &basic_transcript());

    let result = sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental)
        .expect("sync file");
    assert_eq!(result.session_external_id, "sess-basic");
    assert_eq!(result.usage_records_imported, 3);
    assert_eq!(result.exchanges_imported, 3);
    assert_eq!(result.project.as_deref(), Some("/Users/dev/app"));

    let session = ws
        .db
        .get_session_by_external_id("sess-basic")
        .expect("lookup")
        .expect("session");
    assert_eq!(session.start_time.as_deref(), Some("2025-01-15T10:00:00.000Z"));
    assert_eq!(session.end_time.as_deref(), Some("2025-01-15T10:10:08.000Z"));
    assert_eq!(session.model.as_deref(), Some(SONNET));
    assert_eq!(session.version.as_deref(), Some("2.0.14"));

    let stats = ws.db.session_stats(&StatsFilter::default()).expect("stats");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].tokens.input_tokens, 3000);
    assert_eq!(stats[0].tokens.output_tokens, 1300);
    assert_eq!(stats[0].tokens.cache_creation_input_tokens, 500);
    assert_eq!(stats[0].tokens.cache_read_input_tokens, 600);
    assert_eq!(stats[0].usage_record_count, 3);
}

#[test]
fn streamed_responses_keep_final_counts() {
    let mut ws = Workspace::new();
    let path = ws.write_main(
        "sess-stream",
        &[
            user_line("u1", "2025-01-15T10:00:00.000Z", "stream please"),
            assistant_line("msg-s", "2025-01-15T10:00:01.000Z", Some(SONNET), [10, 1, 0, 0]),
            assistant_line("msg-s", "2025-01-15T10:00:02.000Z", Some(SONNET), [10, 100, 0, 0]),
            assistant_line("msg-s", "2025-01-15T10:00:03.000Z", Some(SONNET), [10, 200, 0, 0]),
        ],
    );

    let result =
        sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    assert_eq!(result.usage_records_imported, 1);
    let tokens = ws.stored_tokens("msg-s").expect("record");
    assert_eq!(tokens.output_tokens, 200);
    assert_eq!(ws.db.usage_record_count().expect("count"), 1);
}

#[test]
fn snapshot_and_invalid_lines_are_ignored() {
    let mut ws = Workspace::new();
    let path = ws.main_path("sess-noise");
    let mut lines = vec![
        snapshot_line("2024-12-31T00:00:00.000Z"),
        "not json at all".to_string(),
        "[1,2,3]".to_string(),
    ];
    lines.extend(basic_transcript());
    lines.push("{\"truncated\": ".to_string());
    write_lines(&path, &lines);

    let result =
        sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    assert_eq!(result.usage_records_imported, 3);
    let session = ws
        .db
        .get_session_by_external_id("sess-noise")
        .expect("lookup")
        .expect("session");
    // The snapshot's earlier timestamp does not widen the session.
    assert_eq!(session.start_time.as_deref(), Some("2025-01-15T10:00:00.000Z"));
}

#[test]
fn custom_title_is_captured() {
    let mut ws = Workspace::new();
    let mut lines = basic_transcript();
    lines.push(title_line("Refactor auth"));
    let path = ws.write_main("sess-title", &lines);

    sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    let session = ws
        .db
        .get_session_by_external_id("sess-title")
        .expect("lookup")
        .expect("session");
    assert_eq!(session.custom_title.as_deref(), Some("Refactor auth"));
}

#[test]
fn missing_file_is_reported() {
    let mut ws = Workspace::new();
    let path = ws.main_path("does-not-exist");
    let err = sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental)
        .expect_err("missing file");
    assert!(matches!(err, IngestError::FileNotFound(_)));
    assert_eq!(ws.db.usage_record_count().expect("count"), 0);
}

#[test]
fn checkpoint_tracks_file_size_and_skips_unchanged_files() {
    let mut ws = Workspace::new();
    let path = ws.write_main("sess-state", &basic_transcript());
    let size = fs::metadata(&path).expect("metadata").len();

    sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    let checkpoint = ws
        .db
        .get_sync_state(&path.to_string_lossy())
        .expect("state")
        .expect("checkpoint");
    assert_eq!(checkpoint.last_offset, size);

    let again =
        sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("resync");
    assert_eq!(again.usage_records_imported, 0);
    assert_eq!(again.exchanges_imported, 0);
    assert_eq!(ws.db.usage_record_count().expect("count"), 3);
}

#[test]
fn appended_lines_are_reparsed_without_duplicates() {
    let mut ws = Workspace::new();
    let path = ws.write_main("sess-grow", &basic_transcript());
    sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");

    let mut file = OpenOptions::new().append(true).open(&path).expect("open");
    writeln!(
        file,
        "{}",
        user_line("u4", "2025-01-15T10:20:00.000Z", "last question")
    )
    .expect("append user");
    writeln!(
        file,
        "{}",
        assistant_line("msg-4", "2025-01-15T10:20:10.000Z", Some(SONNET), [5, 5, 0, 0])
    )
    .expect("append assistant");
    drop(file);

    let result =
        sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("resync");
    assert_eq!(result.usage_records_imported, 4);
    assert_eq!(ws.db.usage_record_count().expect("count"), 4);
    assert_eq!(ws.db.exchange_count().expect("exchanges"), 4);

    let session = ws
        .db
        .get_session_by_external_id("sess-grow")
        .expect("lookup")
        .expect("session");
    assert_eq!(session.end_time.as_deref(), Some("2025-01-15T10:20:10.000Z"));
}

#[test]
fn full_resync_is_idempotent() {
    let mut ws = Workspace::new();
    let path = ws.write_main("sess-idem", &multi_turn_transcript());
    ws.write_subagent(
        "sess-idem",
        "agent-idem",
        &[assistant_line(
            "msg-idem-sub",
            "2025-01-15T10:00:30.000Z",
            Some(SONNET),
            [3, 3, 0, 0],
        )],
    );

    let first = sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Full).expect("first");
    let second = sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Full).expect("second");
    assert_eq!(first, second);
    assert_eq!(second.usage_records_imported, 4);
    assert_eq!(ws.db.usage_record_count().expect("count"), 4);
    assert_eq!(ws.db.exchange_count().expect("exchanges"), 3);
    assert_eq!(ws.session_count(), 1);
}

#[test]
fn turns_are_rebuilt_with_durations() {
    let mut ws = Workspace::new();
    let path = ws.write_main("sess-multi", &multi_turn_transcript());

    let result =
        sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    assert_eq!(result.usage_records_imported, 3);
    assert_eq!(result.exchanges_imported, 3);

    let session_id = ws
        .db
        .session_id_by_external_id("sess-multi")
        .expect("lookup")
        .expect("session");
    let exchanges = ws.db.list_exchanges(session_id).expect("exchanges");
    let durations: Vec<Option<f64>> = exchanges.iter().map(|e| e.duration_seconds).collect();
    assert_eq!(durations, vec![Some(12.0), Some(15.0), Some(30.0)]);
    let contents: Vec<Option<&str>> = exchanges
        .iter()
        .map(|e| e.user_content.as_deref())
        .collect();
    assert_eq!(
        contents,
        vec![
            Some("What is 2+2?"),
            Some("What is the capital of France?"),
            Some("Tell me a joke."),
        ]
    );
    assert_eq!(exchanges[0].assistant_message_id.as_deref(), Some("msg-m1"));
    assert_eq!(exchanges[0].user_message_id.as_deref(), Some("u1"));

    let tokens = ws.stored_tokens("msg-m1").expect("record");
    assert_eq!(tokens.output_tokens, 50);
    assert_eq!(tokens.cache_creation_input_tokens, 100);
    assert_eq!(tokens.cache_read_input_tokens, 200);

    let stats = ws.db.session_stats(&StatsFilter::default()).expect("stats");
    assert_eq!(stats[0].exchange_count, 3);
    assert_eq!(stats[0].active_seconds, 57.0);
}

#[test]
fn meta_messages_do_not_open_turns() {
    let mut ws = Workspace::new();
    let path = ws.write_main(
        "sess-meta",
        &[
            meta_user_line("2025-01-15T09:59:00.000Z", "<command-name>/clear</command-name>"),
            user_line("u1", "2025-01-15T10:00:00.000Z", "real prompt"),
            assistant_line("msg-1", "2025-01-15T10:00:09.000Z", Some(SONNET), [1, 1, 0, 0]),
        ],
    );

    sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    let session_id = ws
        .db
        .session_id_by_external_id("sess-meta")
        .expect("lookup")
        .expect("session");
    let exchanges = ws.db.list_exchanges(session_id).expect("exchanges");
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].user_content.as_deref(), Some("real prompt"));
    assert_eq!(exchanges[0].duration_seconds, Some(9.0));
}

#[test]
fn subagent_usage_is_linked_to_parent_session() {
    let mut ws = Workspace::new();
    let main = ws.write_main("parent-1", &basic_transcript());
    ws.write_subagent(
        "parent-1",
        "agent-a1",
        &[
            user_line("su1", "2025-01-15T10:01:00.000Z", "sub task"),
            assistant_line(
                "msg-sub-1",
                "2025-01-15T10:01:05.000Z",
                Some("claude-haiku-4-5-20251001"),
                [10, 10, 0, 0],
            ),
            assistant_line(
                "msg-sub-2",
                "2025-01-15T10:01:09.000Z",
                Some("claude-haiku-4-5-20251001"),
                [20, 20, 0, 0],
            ),
        ],
    );

    let result =
        sync_file(&mut ws.db, &ws.projects_root, &main, SyncMode::Incremental).expect("sync");
    assert_eq!(result.usage_records_imported, 5);
    assert_eq!(result.exchanges_imported, 3);

    let parent_id = ws
        .db
        .session_id_by_external_id("parent-1")
        .expect("lookup")
        .expect("parent");
    let subagents = ws.db.list_subagents(parent_id).expect("subagents");
    assert_eq!(subagents.len(), 1);
    assert_eq!(subagents[0].external_id, "agent-a1");
    assert_eq!(
        ws.db.session_id_by_external_id("agent-a1").expect("lookup"),
        None
    );

    let subagent_stats = ws.db.subagent_stats(parent_id).expect("subagent stats");
    assert_eq!(subagent_stats[0].usage_record_count, 2);
    assert_eq!(
        subagent_stats[0].agent_type.as_deref(),
        Some("claude-haiku-4-5-20251001")
    );

    // Sub-agent usage rolls up into the parent session.
    let stats = ws.db.session_stats(&StatsFilter::default()).expect("stats");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].usage_record_count, 5);
    assert_eq!(stats[0].subagent_count, 1);
    // Sub-agent prompts are not counted as parent turns.
    assert_eq!(stats[0].exchange_count, 3);
}

#[test]
fn orphan_subagent_creates_placeholder_parent() {
    let mut ws = Workspace::new();
    let path = ws.write_subagent(
        "parent-missing",
        "agent-orphan",
        &[assistant_line(
            "msg-orphan",
            "2025-01-15T12:00:00.000Z",
            Some(SONNET),
            [1, 1, 0, 0],
        )],
    );

    let result =
        sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    assert_eq!(result.session_external_id, "agent-orphan");
    assert_eq!(result.usage_records_imported, 1);
    assert_eq!(result.exchanges_imported, 0);

    let parent = ws
        .db
        .get_session_by_external_id("parent-missing")
        .expect("lookup")
        .expect("placeholder parent");
    assert_eq!(parent.project.as_deref(), Some("/Users/dev/app"));
    assert_eq!(parent.model, None);
    assert_eq!(parent.start_time, None);
    assert_eq!(ws.db.exchange_count().expect("exchanges"), 0);

    // The real parent transcript arriving later fills the placeholder in.
    let main = ws.write_main("parent-missing", &basic_transcript());
    sync_file(&mut ws.db, &ws.projects_root, &main, SyncMode::Incremental).expect("sync parent");
    let parent = ws
        .db
        .get_session_by_external_id("parent-missing")
        .expect("lookup")
        .expect("parent");
    assert_eq!(parent.model.as_deref(), Some(SONNET));
    assert_eq!(ws.session_count(), 1);
}

#[test]
fn subagent_without_parent_directory_is_rejected() {
    let mut ws = Workspace::new();
    let path = ws
        .projects_root
        .join("..")
        .join("subagents")
        .join("agent-lost.jsonl");
    write_lines(
        &path,
        &[assistant_line(
            "msg-lost",
            "2025-01-15T10:00:02.000Z",
            Some(SONNET),
            [1, 1, 0, 0],
        )],
    );

    let err = sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental)
        .expect_err("no parent");
    assert!(matches!(err, IngestError::MissingParent(_)));
    assert_eq!(ws.db.usage_record_count().expect("count"), 0);
    assert!(
        ws.db
            .get_sync_state(&path.to_string_lossy())
            .expect("load")
            .is_none()
    );
}

#[test]
fn sync_all_reports_subagent_without_parent_and_continues() {
    let mut ws = Workspace::new();
    ws.write_main("sess-ok", &basic_transcript()[..2]);
    write_lines(
        &ws.projects_root.join("subagents").join("agent-lost.jsonl"),
        &[assistant_line(
            "msg-lost",
            "2025-01-15T10:00:02.000Z",
            Some(SONNET),
            [1, 1, 0, 0],
        )],
    );
    // Walking from `<project>/..` puts a `..` right before `subagents`.
    let root = ws.projects_root.join(PROJECT_DIR).join("..");

    let stats = sync_all(&mut ws.db, &root).expect("sync all");
    assert_eq!(stats.files_scanned, 2);
    assert_eq!(stats.issues.len(), 1);
    assert!(stats.issues[0].file_path.ends_with("agent-lost.jsonl"));
    assert!(stats.issues[0].message.contains("parent session"));
    assert_eq!(stats.usage_records_imported, 1);
    assert_eq!(ws.db.usage_record_count().expect("count"), 1);
    assert!(
        ws.db
            .get_session_by_external_id("sess-ok")
            .expect("lookup")
            .is_some()
    );
}

#[test]
fn transcript_without_usage_only_moves_checkpoint() {
    let mut ws = Workspace::new();
    let path = ws.write_main(
        "sess-empty",
        &[user_line("u1", "2025-01-15T10:00:00.000Z", "anyone there?")],
    );

    let result =
        sync_file(&mut ws.db, &ws.projects_root, &path, SyncMode::Incremental).expect("sync");
    assert_eq!(result.usage_records_imported, 0);
    assert_eq!(result.exchanges_imported, 0);
    assert_eq!(ws.session_count(), 0);
    assert!(
        ws.db
            .get_sync_state(&path.to_string_lossy())
            .expect("state")
            .is_some()
    );
}

#[test]
fn sync_all_discovers_every_transcript() {
    let mut ws = Workspace::new();
    ws.write_main("sess-a", &basic_transcript()[..2]);
    ws.write_main(
        "sess-b",
        &[
            user_line("u1", "2025-02-01T08:00:00.000Z", "b"),
            assistant_line("msg-b", "2025-02-01T08:00:03.000Z", Some(SONNET), [1, 1, 0, 0]),
        ],
    );
    ws.write_subagent(
        "sess-a",
        "agent-x",
        &[assistant_line(
            "msg-x",
            "2025-01-15T10:00:02.000Z",
            Some(SONNET),
            [1, 1, 0, 0],
        )],
    );

    let stats = sync_all(&mut ws.db, &ws.projects_root).expect("sync all");
    assert_eq!(stats.files_scanned, 3);
    assert_eq!(stats.usage_records_imported, 3);
    assert_eq!(stats.sessions_imported, 3);
    assert!(stats.issues.is_empty());
    assert_eq!(ws.db.usage_record_count().expect("count"), 3);
    assert_eq!(ws.session_count(), 2);
}

#[test]
fn sync_all_handles_main_files_before_subagents() {
    let mut ws = Workspace::new();
    // The parent directory sorts before the parent file, so a plain walk would
    // meet the sub-agent first and create a placeholder.
    ws.write_subagent(
        "aaa",
        "agent-first",
        &[assistant_line(
            "msg-sub",
            "2025-01-15T10:00:02.000Z",
            Some(SONNET),
            [1, 1, 0, 0],
        )],
    );
    ws.write_main("aaa", &basic_transcript());

    sync_all(&mut ws.db, &ws.projects_root).expect("sync all");
    let session = ws
        .db
        .get_session_by_external_id("aaa")
        .expect("lookup")
        .expect("session");
    assert_eq!(session.model.as_deref(), Some(SONNET));
    assert_eq!(ws.db.list_subagents(session.id).expect("subagents").len(), 1);
}

#[test]
fn sync_all_rebuilds_instead_of_duplicating() {
    let mut ws = Workspace::new();
    let path = ws.write_main("sess-full", &basic_transcript());
    sync_all(&mut ws.db, &ws.projects_root).expect("first pass");

    // Drop the last response; a full pass must forget it.
    write_lines(&path, &basic_transcript()[..4]);
    sync_all(&mut ws.db, &ws.projects_root).expect("second pass");
    assert_eq!(ws.db.usage_record_count().expect("count"), 2);
    assert_eq!(ws.db.exchange_count().expect("exchanges"), 2);
}

#[test]
fn sync_all_removes_sessions_made_from_subagent_files() {
    let mut ws = Workspace::new();
    ws.db
        .upsert_session(&tracker_core::NewSession::placeholder("agent-stale", None))
        .expect("insert stale");

    let stats = sync_all(&mut ws.db, &ws.projects_root).expect("sync all");
    assert_eq!(stats.orphaned_sessions_removed, 1);
    assert_eq!(ws.session_count(), 0);
}

#[cfg(unix)]
#[test]
fn sync_all_continues_past_unreadable_files() {
    use std::os::unix::fs::PermissionsExt;

    let mut ws = Workspace::new();
    let bad = ws.write_main("sess-bad", &basic_transcript());
    ws.write_main("sess-good", &basic_transcript()[..2]);
    fs::set_permissions(&bad, fs::Permissions::from_mode(0o000)).expect("chmod");
    if fs::read(&bad).is_ok() {
        // Running as root; permissions are not enforced.
        return;
    }

    let stats = sync_all(&mut ws.db, &ws.projects_root).expect("sync all");
    assert_eq!(stats.files_scanned, 2);
    assert_eq!(stats.issues.len(), 1);
    assert!(stats.issues[0].file_path.ends_with("sess-bad.jsonl"));
    assert_eq!(ws.db.usage_record_count().expect("count"), 1);
}

#[test]
fn sync_all_on_missing_root_is_empty() {
    let mut ws = Workspace::new();
    let missing = ws.projects_root.join("nope");
    let stats = sync_all(&mut ws.db, &missing).expect("sync all");
    assert_eq!(stats.files_scanned, 0);
}
