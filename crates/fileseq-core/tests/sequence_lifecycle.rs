//! Integration tests for the sequence lifecycle, driven through inbound events.

use std::sync::Arc;

use fileseq_core::{
    Command, Database, InboundEvent, MediaKind, OutboundCommand, Outcome, RecordingTransport,
    SequenceManager,
};

fn setup() -> (SequenceManager, Arc<RecordingTransport>) {
    let db = Arc::new(Database::open_memory().unwrap());
    let transport = Arc::new(RecordingTransport::new());
    (SequenceManager::new(db, transport.clone()), transport)
}

fn user_message(command: Command) -> InboundEvent {
    InboundEvent::UserMessage {
        external_user_id: "U".into(),
        chat_ref: "chat-U".into(),
        command,
    }
}

fn media(kind: &str, payload_ref: &str) -> InboundEvent {
    InboundEvent::MediaMessage {
        external_user_id: "U".into(),
        chat_ref: "chat-U".into(),
        kind: kind.into(),
        payload_ref: payload_ref.into(),
        caption: None,
    }
}

fn send_media(kind: MediaKind, payload_ref: &str) -> OutboundCommand {
    OutboundCommand::SendMedia {
        chat_ref: "chat-U".into(),
        kind,
        payload_ref: payload_ref.into(),
        caption: None,
    }
}

#[test]
fn test_document_video_document_scenario() {
    let (mgr, transport) = setup();

    assert!(matches!(
        mgr.handle(&user_message(Command::StartSequence)),
        Outcome::Started { .. }
    ));

    let positions: Vec<Outcome> = vec![
        mgr.handle(&media("document", "A")),
        mgr.handle(&media("video", "B")),
        mgr.handle(&media("document", "C")),
    ];
    let positions: Vec<i64> = positions
        .into_iter()
        .map(|o| match o {
            Outcome::ItemAdded { position } => position,
            other => panic!("unexpected outcome {other:?}"),
        })
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);

    let outcome = mgr.handle(&user_message(Command::EndSequence));
    let Outcome::Completed { report } = outcome else {
        panic!("sequence did not complete");
    };
    assert_eq!(report.delivered, 3);

    assert_eq!(
        transport.sent_media(),
        vec![
            send_media(MediaKind::Document, "A"),
            send_media(MediaKind::Video, "B"),
            send_media(MediaKind::Document, "C"),
        ]
    );
}

#[test]
fn test_empty_sequence_completes_without_delivery() {
    let (mgr, transport) = setup();
    let sequence_id = mgr.start("U").unwrap();

    let report = mgr.end("U", "chat-U").unwrap();
    assert_eq!(report.total(), 0);
    assert!(transport.sent_media().is_empty());

    let db = mgr.database();
    let user = db.find_user("U").unwrap().unwrap();
    assert_eq!(db.find_open_sequence(user).unwrap(), None);
    let stored = db.get_sequence(sequence_id).unwrap().unwrap();
    assert_eq!(stored.status, fileseq_core::storage::SequenceStatus::Completed);
}

#[test]
fn test_failure_on_middle_item_still_delivers_neighbours() {
    let (mgr, transport) = setup();
    transport.fail_payload("2");
    mgr.start("U").unwrap();
    for payload in ["1", "2", "3"] {
        mgr.submit_item("U", "document", payload, None).unwrap();
    }

    let report = mgr.end("U", "chat-U").unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].position, 2);
    assert_eq!(
        transport.sent_media(),
        vec![
            send_media(MediaKind::Document, "1"),
            send_media(MediaKind::Document, "3"),
        ]
    );
}

#[test]
fn test_submit_after_end_is_rejected() {
    let (mgr, _) = setup();
    mgr.handle(&user_message(Command::StartSequence));
    mgr.handle(&media("audio", "A"));
    mgr.handle(&user_message(Command::EndSequence));

    assert!(matches!(
        mgr.handle(&media("audio", "late")),
        Outcome::NoOpenSequence
    ));

    let db = mgr.database();
    let user = db.find_user("U").unwrap().unwrap();
    let sequences = db.list_sequences(user).unwrap();
    assert_eq!(sequences.len(), 1);
    assert_eq!(db.count_items(sequences[0].id).unwrap(), 1);
}

#[test]
fn test_sequences_are_isolated_per_user() {
    let (mgr, transport) = setup();
    mgr.start("U").unwrap();
    mgr.start("V").unwrap();
    mgr.submit_item("U", "photo", "u-1", None).unwrap();
    mgr.submit_item("V", "photo", "v-1", None).unwrap();
    mgr.submit_item("U", "voice", "u-2", None).unwrap();

    let report = mgr.end("U", "chat-U").unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(
        transport.sent_media(),
        vec![
            send_media(MediaKind::Photo, "u-1"),
            send_media(MediaKind::Voice, "u-2"),
        ]
    );
    assert_eq!(mgr.submit_item("V", "photo", "v-2", None).unwrap(), 2);
}

#[test]
fn test_state_survives_manager_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fileseq.db");
    let timeout = std::time::Duration::from_secs(1);
    let transport = Arc::new(RecordingTransport::new());

    {
        let db = Arc::new(Database::open(&path, timeout).unwrap());
        let mgr = SequenceManager::new(db, transport.clone());
        mgr.start("U").unwrap();
        mgr.submit_item("U", "document", "before-restart", None).unwrap();
    }

    let db = Arc::new(Database::open(&path, timeout).unwrap());
    let mgr = SequenceManager::new(db, transport.clone());
    assert_eq!(mgr.submit_item("U", "document", "after-restart", None).unwrap(), 2);
    let report = mgr.end("U", "chat-U").unwrap();
    assert_eq!(report.delivered, 2);
}
