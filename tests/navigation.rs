//! Cursor navigation over the bulk-CM fixture

use std::time::{Duration, Instant};
use xmlwindow::{Direction, ElementHandler, ElementTree, Navigator, NodeId, ParseSession, WindowConfig};

const SIMPLE: &[u8] = include_bytes!("fixtures/simple.xml");

fn parsed(config: WindowConfig) -> ParseSession {
    let session = ParseSession::from_bytes(SIMPLE, config);
    session.run().unwrap();
    session
}

fn me_context_ids(nav: &mut Navigator<'_>) -> Vec<String> {
    assert!(nav.find("MeContext"), "no MeContext found");
    let mut ids = Vec::new();
    loop {
        ids.push(nav.attribute("id").unwrap_or_default());
        if !nav.next() {
            return ids;
        }
    }
}

#[test]
fn test_iterate_siblings_after_full_parse() {
    let session = parsed(WindowConfig::new());
    let mut nav = Navigator::new(&session);
    assert_eq!(nav.tag_name().as_deref(), Some("bulkCmConfigDataFile"));
    assert_eq!(me_context_ids(&mut nav), ["SITE001", "SITE002", "SITE004", "SITE005"]);
}

#[test]
fn test_iterate_siblings_while_parsing() {
    let session = ParseSession::from_bytes(SIMPLE, WindowConfig::new().chunk_size(128).window_chunks(3));
    assert!(session.start().unwrap());
    assert!(session.is_paused());

    let mut nav = Navigator::new(&session);
    assert_eq!(me_context_ids(&mut nav), ["SITE001", "SITE002", "SITE004", "SITE005"]);
    // The cursor only ever lands on finished elements
    assert!(nav.end_offset().is_some());
}

#[test]
fn test_text_and_children() {
    let session = parsed(WindowConfig::new());
    let mut nav = Navigator::new(&session);
    assert!(nav.find("userLabel"));
    assert_eq!(nav.text(), "Site & One");

    assert!(nav.to(Direction::Parent));
    assert_eq!(nav.tag_name().as_deref(), Some("attributes"));
    nav.push();
    assert!(nav.to(Direction::Parent));
    assert_eq!(nav.tag_name().as_deref(), Some("ManagedElement"));
    nav.pop();
    assert_eq!(nav.tag_name().as_deref(), Some("attributes"));
    assert!(nav.to(Direction::FirstChild));
    assert_eq!(nav.tag_name().as_deref(), Some("userLabel"));

    let mut nav = Navigator::new(&session);
    assert!(nav.find("MeContext"));
    assert!(nav.next());
    assert!(nav.next());
    assert_eq!(nav.attribute("id").as_deref(), Some("SITE004"));
    assert!(nav.find("userLabel"));
    assert_eq!(nav.text(), "Site <Four>");
}

#[test]
fn test_find_never_leaves_forward_scope() {
    let session = parsed(WindowConfig::new());
    let mut nav = Navigator::new(&session);

    // Last MeContext of RNC01: SITE101 under RNC02 is out of scope
    assert!(nav.find("MeContext"));
    while nav.next() {}
    assert_eq!(nav.attribute("id").as_deref(), Some("SITE005"));
    assert!(!nav.find("MeContext"));
    assert_eq!(nav.attribute("id").as_deref(), Some("SITE005"));

    // An earlier sibling is never a match
    let mut nav = Navigator::new(&session);
    assert!(nav.find("ManagedElement"));
    assert!(!nav.find("VsDataContainer"));

    // A following sibling of the start node is in scope
    let mut nav = Navigator::new(&session);
    assert!(nav.find("SubNetwork"));
    assert!(nav.find("SubNetwork"));
    assert_eq!(nav.attribute("id").as_deref(), Some("RNC01"));
    assert!(nav.find("SubNetwork"));
    assert_eq!(nav.attribute("id").as_deref(), Some("RNC02"));
    assert!(nav.find("MeContext"));
    assert_eq!(nav.attribute("id").as_deref(), Some("SITE101"));
}

#[test]
fn test_missing_tag_leaves_cursor() {
    let session = parsed(WindowConfig::new());
    let mut nav = Navigator::new(&session);
    let before = nav.current();
    assert!(!nav.find("NoSuchTag"));
    assert_eq!(nav.current(), before);
}

/// Holds the producer inside the end of every `slow` element
struct Stall(Duration);

impl ElementHandler for Stall {
    fn element_end(&mut self, tree: &ElementTree, id: NodeId) {
        if tree.get(id).is_some_and(|e| e.tag_name == "slow") {
            std::thread::sleep(self.0);
        }
    }
}

#[test]
fn test_wait_timeout_is_lenient() {
    let config = WindowConfig::new()
        .pause_at_boundaries(false)
        .resume_timeout(Duration::from_millis(100))
        .move_wait_timeout(Duration::from_millis(100));
    let session = ParseSession::from_bytes("<r><x><slow/></x><y/></r>", config).with_handler(Stall(Duration::from_secs(1)));
    // The producer is stuck, so it never becomes quiescent in time
    assert!(!session.start().unwrap());

    let mut nav = Navigator::new(&session);
    let started = Instant::now();
    // The move succeeds even though x is still open
    assert!(nav.find("x"));
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(nav.end_offset(), None);
    assert_eq!(nav.start_offset(), Some(3));
}

fn numbered_items(count: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<list>\n");
    for i in 0..count {
        xml.push_str(&format!("<item n=\"{:05}\"><v>x</v></item>\n", i));
    }
    xml.push_str("</list>\n");
    xml
}

#[test]
fn test_next_visits_every_sibling_while_reclaiming() {
    let xml = numbered_items(300);
    for (chunk_size, window) in [(64, 2), (128, 3), (256, 2), (100, 4)] {
        let config = WindowConfig::new().chunk_size(chunk_size).window_chunks(window).reclaim_tag("item");
        let session = ParseSession::from_bytes(xml.clone(), config);
        assert!(session.start().unwrap());

        let mut nav = Navigator::new(&session);
        assert!(nav.find("item"), "no item with chunk {} window {}", chunk_size, window);
        let mut seen = vec![nav.attribute("n").unwrap()];
        while nav.next() {
            seen.push(nav.attribute("n").unwrap());
        }
        let expected: Vec<String> = (0..300).map(|i| format!("{:05}", i)).collect();
        assert_eq!(seen, expected, "chunk {} window {}", chunk_size, window);
    }
}
