use std::sync::Arc;

use waltxn_core::config::{LogMode, TxnConfig};
use waltxn_core::engine::{MemoryEngine, ReplaceMode};
use waltxn_core::request::Request;
use waltxn_core::txn::{self, LastTupleSink, ResultSink};
use waltxn_core::xlog::{Cursor, CursorOutcome};
use waltxn_core::{FileKind, Row, Space, Tuple, Xdir};

struct InsertTuple {
    tuple: Tuple,
}

impl Request for InsertTuple {
    fn op_type(&self) -> u16 {
        1
    }

    fn encode(&self, body_buf: &mut Vec<bytes::Bytes>) -> usize {
        body_buf.push(bytes::Bytes::copy_from_slice(self.tuple.as_bytes()));
        1
    }
}

#[tokio::test]
async fn insert_round_trips_through_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let xdir = Xdir::new(dir.path(), FileKind::Xlog);
    let appender = xdir.create_for_write(1).unwrap();

    let engine = Arc::new(MemoryEngine::new());
    let space = Arc::new(Space::new(1, engine.clone()));
    let tuple = Tuple::from_bytes(b"row-one".to_vec());

    txn::run_as_task(async {
        txn::begin(TxnConfig {
            log_mode: LogMode::Write,
            ..Default::default()
        })
        .unwrap();
        txn::replace(
            space.clone(),
            None,
            Some(tuple.clone()),
            ReplaceMode::DupInsert,
        )
        .unwrap();
        txn::add_redo(&InsertTuple { tuple: tuple.clone() }, LogMode::Write).unwrap();

        let mut sink = LastTupleSink::default();
        txn::commit(Some(&appender), &mut sink).unwrap();
        assert_eq!(sink.into_inner(), Some(tuple.clone()));
    })
    .await;

    appender.seal().unwrap();
    drop(appender);

    let mut cursor = xdir.open_for_read(1).unwrap();
    match cursor.next().unwrap() {
        CursorOutcome::Row(row) => {
            assert_eq!(row.op_type, 1);
            assert_eq!(row.body.len(), 1);
            assert_eq!(&row.body[0][..], b"row-one");
        }
        CursorOutcome::NoMoreRows => panic!("expected a row"),
    }

    assert!(matches!(cursor.next().unwrap(), CursorOutcome::NoMoreRows));
    assert!(cursor.eof_read());
    assert_eq!(cursor.row_count(), 1);
}

#[tokio::test]
async fn rollback_leaves_the_log_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let xdir = Xdir::new(dir.path(), FileKind::Xlog);
    let appender = xdir.create_for_write(1).unwrap();

    let engine = Arc::new(MemoryEngine::new());
    let space = Arc::new(Space::new(1, engine.clone()));
    let original = Tuple::from_bytes(b"before".to_vec());
    let replacement = Tuple::from_bytes(b"after".to_vec());
    engine
        .replace(1, None, Some(original.clone()), ReplaceMode::DupInsert)
        .unwrap();

    let replacement_refcount_before = replacement.strong_count();

    txn::run_as_task(async {
        txn::begin(TxnConfig {
            log_mode: LogMode::Write,
            ..Default::default()
        })
        .unwrap();
        txn::replace(
            space.clone(),
            Some(original.clone()),
            Some(replacement.clone()),
            ReplaceMode::DupReplace,
        )
        .unwrap();
        txn::add_redo(
            &InsertTuple {
                tuple: replacement.clone(),
            },
            LogMode::Write,
        )
        .unwrap();

        txn::rollback().unwrap();
    })
    .await;

    assert_eq!(engine.contents(1), vec![original]);
    assert_eq!(
        replacement.strong_count(),
        replacement_refcount_before,
        "rollback must release the reference replace() took on new_tuple"
    );

    appender.seal().unwrap();
    drop(appender);
    let mut cursor = xdir.open_for_read(1).unwrap();
    assert!(matches!(cursor.next().unwrap(), CursorOutcome::NoMoreRows));
    assert!(cursor.eof_read());
    assert_eq!(cursor.row_count(), 0);
}

#[tokio::test]
async fn cursor_resyncs_past_injected_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let xdir = Xdir::new(dir.path(), FileKind::Xlog);
    let appender = xdir.create_for_write(1).unwrap();

    let first = Row::new(1, 0, vec![bytes::Bytes::from_static(b"first")]);
    let second = Row::new(1, 0, vec![bytes::Bytes::from_static(b"second")]);
    appender.append(first, LogMode::Write).unwrap();

    // Splice 20 bytes of filler (none of which is the row marker) directly into the file,
    // between the two records, simulating a torn write.
    let filler = vec![0xFFu8; 20];
    let path = xdir.format_filename(1);
    {
        use std::io::{Seek, SeekFrom, Write};
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.seek(SeekFrom::End(0)).unwrap();
        file.write_all(&filler).unwrap();
    }

    appender.append(second, LogMode::Write).unwrap();
    appender.seal().unwrap();
    drop(appender);

    let mut cursor = Cursor::open(std::fs::File::open(&path).unwrap(), FileKind::Xlog).unwrap();

    match cursor.next().unwrap() {
        CursorOutcome::Row(row) => assert_eq!(&row.body[0][..], b"first"),
        CursorOutcome::NoMoreRows => panic!("expected the first row"),
    }

    match cursor.next().unwrap() {
        CursorOutcome::Row(row) => assert_eq!(&row.body[0][..], b"second"),
        CursorOutcome::NoMoreRows => panic!("expected to recover the second row"),
    }
    assert_eq!(cursor.last_skipped_bytes(), filler.len() as u64);

    assert!(matches!(cursor.next().unwrap(), CursorOutcome::NoMoreRows));
    assert!(cursor.eof_read());
    assert!(!cursor.is_truncated());
}

#[tokio::test]
async fn truncated_tail_is_reported_without_an_eof_marker() {
    let dir = tempfile::tempdir().unwrap();
    let xdir = Xdir::new(dir.path(), FileKind::Xlog);
    let appender = xdir.create_for_write(1).unwrap();

    let row = Row::new(1, 0, vec![bytes::Bytes::from_static(b"whole")]);
    appender.append(row, LogMode::Write).unwrap();

    // No seal: the file ends with a few stray bytes that are neither a row marker nor the
    // eof marker, and there is nothing after them to resync onto.
    let path = xdir.format_filename(1);
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[1, 2, 3, 4, 5, 6]).unwrap();
    }
    drop(appender);

    let mut cursor = Cursor::open(std::fs::File::open(&path).unwrap(), FileKind::Xlog).unwrap();
    assert!(matches!(cursor.next().unwrap(), CursorOutcome::Row(_)));
    assert!(matches!(cursor.next().unwrap(), CursorOutcome::NoMoreRows));
    assert!(cursor.is_truncated());
    assert!(!cursor.eof_read());
}
