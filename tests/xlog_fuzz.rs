//! Randomized Appender/Cursor round-trip, in the spirit of the teacher's
//! `tests/oracle.rs` (seeded `ChaCha8Rng`, one-time logging init via `once_cell`).

use once_cell::sync::Lazy;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use waltxn_core::config::LogMode;
use waltxn_core::xlog::{CursorOutcome, Row};
use waltxn_core::{FileKind, Xdir};

static INIT_LOGGING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

fn random_body(rng: &mut ChaCha8Rng, max_len: usize) -> bytes::Bytes {
    let len = (rng.next_u32() as usize) % max_len;
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf);
    bytes::Bytes::from(buf)
}

#[test]
fn appender_cursor_round_trip_over_random_records() {
    Lazy::force(&INIT_LOGGING);

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let dir = tempfile::tempdir().unwrap();
    let xdir = Xdir::new(dir.path(), FileKind::Xlog);
    let appender = xdir.create_for_write(1).unwrap();

    const N: usize = 200;
    let mut written = Vec::with_capacity(N);
    for _ in 0..N {
        let op_type = (rng.next_u32() % 16) as u16;
        let cookie = rng.next_u64();
        let segments = vec![random_body(&mut rng, 256), random_body(&mut rng, 64)];
        let row = Row::new(op_type, cookie, segments);
        appender.append(row.clone(), LogMode::Write).unwrap();
        written.push(row);
    }
    appender.seal().unwrap();
    drop(appender);

    let mut cursor = xdir.open_for_read(1).unwrap();
    for expected in &written {
        match cursor.next().unwrap() {
            CursorOutcome::Row(row) => {
                assert_eq!(row.op_type, expected.op_type);
                assert_eq!(row.cookie, expected.cookie);
                let expected_body: Vec<u8> =
                    expected.body.iter().flat_map(|s| s.to_vec()).collect();
                let actual_body: Vec<u8> = row.body.iter().flat_map(|s| s.to_vec()).collect();
                assert_eq!(
                    hex::encode(&actual_body),
                    hex::encode(&expected_body),
                    "body mismatch for op_type {}",
                    expected.op_type
                );
            }
            CursorOutcome::NoMoreRows => panic!("expected {} rows, ran out early", N),
        }
    }

    assert!(matches!(cursor.next().unwrap(), CursorOutcome::NoMoreRows));
    assert!(cursor.eof_read());
    assert_eq!(cursor.row_count(), N as u64);
}
