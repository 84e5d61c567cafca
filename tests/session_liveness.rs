//! Producer pause/resume protocol over a multi-block file

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use xmlwindow::{ParseSession, ParserState, Termination, WindowConfig};

const WINDOW: usize = 4;

fn document(count: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "<?xml version=\"1.0\"?>").unwrap();
    writeln!(file, "<configData>").unwrap();
    for i in 0..count {
        writeln!(file, "<MeContext id=\"{:05}\"><v>{}</v></MeContext>", i, i % 10).unwrap();
    }
    writeln!(file, "</configData>").unwrap();
    file.flush().unwrap();
    file
}

fn config() -> WindowConfig {
    WindowConfig::new().chunk_size(256).window_chunks(WINDOW).reclaim_tag("MeContext")
}

#[test]
fn test_pauses_at_window_and_progresses() {
    let file = document(1000);
    let session = ParseSession::open(file.path(), config()).unwrap();
    assert_eq!(session.state(), ParserState::Idle);

    assert!(session.start().unwrap());
    assert_eq!(session.state(), ParserState::Paused { chunk: WINDOW as u64 });
    assert_eq!(session.current_chunk(), Some(WINDOW as u64));

    let mut pauses = 1;
    let mut previous = session.current_chunk();
    loop {
        session.resume_and_wait(Duration::from_secs(5)).unwrap();
        assert!(session.source().resident_chunks().len() <= WINDOW);
        match session.state() {
            ParserState::Paused { chunk } => {
                assert!(Some(chunk) > previous, "no progress past {:?}", previous);
                assert_eq!(session.current_chunk(), Some(chunk));
                previous = Some(chunk);
                pauses += 1;
            }
            ParserState::Terminated(termination) => {
                assert_eq!(termination, Termination::Completed);
                break;
            }
            state => panic!("unexpected state {:?}", state),
        }
    }

    let chunks = session.source().size().div_ceil(256);
    assert!(pauses as u64 <= chunks - WINDOW as u64, "{} pauses over {} chunks", pauses, chunks);
}

#[test]
fn test_tree_stays_bounded() {
    let file = document(1000);
    let session = ParseSession::open(file.path(), config()).unwrap();
    session.start().unwrap();

    let mut peak = 0;
    while session.is_alive() {
        peak = peak.max(session.with_tree(|tree| tree.len()));
        session.resume_and_wait(Duration::from_secs(5)).unwrap();
    }
    // About six MeContext elements per chunk, two nodes each
    assert!(peak < 2 * 8 * (WINDOW + 3), "peak of {} resident elements", peak);
    let root = session.first_root().unwrap();
    assert!(session.with_tree(|tree| tree.children(root).len()) < 1000);
}

#[test]
fn test_wait_for_chunk() {
    let file = document(200);
    let session = ParseSession::open(file.path(), config()).unwrap();
    session.start().unwrap();
    let before = session.current_chunk();
    assert!(!session.wait_for_chunk(before, Duration::from_millis(50)));

    session.resume_and_wait(Duration::from_secs(5)).unwrap();
    assert!(session.wait_for_chunk(before, Duration::from_secs(1)));
    assert_eq!(session.loaded_window_end(), session.current_chunk());
}

#[test]
fn test_stop_cancels_and_keeps_tree() {
    let file = document(500);
    let session = ParseSession::open(file.path(), config()).unwrap();
    session.start().unwrap();
    session.stop();
    assert_eq!(session.state(), ParserState::Terminated(Termination::Cancelled));
    assert!(!session.is_alive());
    assert!(session.first_root().is_some());
    // Nothing left to resume
    session.resume_and_wait(Duration::from_millis(10)).unwrap();
}

#[test]
fn test_malformed_input_terminates() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"<configData><MeContext id=\"1\"></configData>").unwrap();
    file.flush().unwrap();

    let session = ParseSession::open(file.path(), config()).unwrap();
    assert!(session.start().unwrap());
    match session.state() {
        ParserState::Terminated(Termination::Failed(message)) => assert!(message.contains("mismatched")),
        state => panic!("unexpected state {:?}", state),
    }
    assert!(session.is_terminated());
}
