//! Edits touch only their own bytes and survive a reparse

use std::collections::HashMap;
use xmlwindow::{Direction, Navigator, NodeId, ParseSession, WindowConfig};

const SIMPLE: &[u8] = include_bytes!("fixtures/simple.xml");

fn parsed(bytes: &[u8]) -> ParseSession {
    let session = ParseSession::from_bytes(bytes, WindowConfig::new().chunk_size(256).window_chunks(2));
    session.run().unwrap();
    session
}

/// ManagedElement of the second MeContext
fn target(session: &ParseSession) -> NodeId {
    let mut nav = Navigator::new(session);
    assert!(nav.find("MeContext"));
    assert!(nav.next());
    assert_eq!(nav.attribute("id").as_deref(), Some("SITE002"));
    assert!(nav.to(Direction::FirstChild));
    nav.current().unwrap()
}

fn written(session: &ParseSession) -> Vec<u8> {
    let mut out = Vec::new();
    session.write_document(&mut out).unwrap();
    out
}

fn attributes(session: &ParseSession, id: NodeId) -> HashMap<String, String> {
    session.with_tree(|tree| tree.get(id).unwrap().attributes.clone())
}

/// Check that `output` equals SIMPLE outside the opening tag starting at `start`
fn assert_only_opening_tag_changed(output: &[u8], start: usize) {
    let tag_end = start + SIMPLE[start..].iter().position(|&b| b == b'>').unwrap() + 1;
    let suffix = &SIMPLE[tag_end..];
    assert_eq!(&output[..start], &SIMPLE[..start]);
    assert!(output.ends_with(suffix));
    assert!(output.len() - suffix.len() >= start);
}

fn check_attribute_edit(edit: impl FnOnce(&ParseSession, NodeId), expected: &[(&str, &str)]) {
    let session = parsed(SIMPLE);
    let id = target(&session);
    let start = session.with_tree(|tree| tree.get(id).unwrap().start_offset) as usize;
    edit(&session, id);

    let output = written(&session);
    assert_only_opening_tag_changed(&output, start);

    let reparsed = parsed(&output);
    let again = target(&reparsed);
    let expected: HashMap<String, String> =
        expected.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    assert_eq!(attributes(&reparsed, again), expected);
    assert_eq!(attributes(&session, id), expected);
}

#[test]
fn test_add_attribute() {
    check_attribute_edit(
        |session, id| assert!(session.set_attribute(id, "userLabel", "a \"quoted\" & <odd> label")),
        &[("id", "1"), ("userLabel", "a \"quoted\" & <odd> label")],
    );
}

#[test]
fn test_modify_attribute() {
    check_attribute_edit(|session, id| assert!(session.set_attribute(id, "id", "2")), &[("id", "2")]);
}

#[test]
fn test_update_attribute_only_existing() {
    check_attribute_edit(
        |session, id| {
            assert!(!session.update_attribute(id, "vendor", "x"));
            assert!(session.update_attribute(id, "id", "7"));
        },
        &[("id", "7")],
    );
}

#[test]
fn test_remove_attribute() {
    check_attribute_edit(|session, id| assert!(session.remove_attribute(id, "id")), &[]);
}

#[test]
fn test_text_edit_survives_reparse() {
    let session = parsed(SIMPLE);
    let mut nav = Navigator::new(&session);
    assert!(nav.find("MeContext"));
    assert!(nav.next());
    assert!(nav.find("userLabel"));
    let id = nav.current().unwrap();
    assert!(session.set_text(id, "Site 2 & more"));

    let output = written(&session);
    let expected = String::from_utf8_lossy(SIMPLE).replace("Site Two", "Site 2 &amp; more");
    assert_eq!(String::from_utf8(output.clone()).unwrap(), expected);

    let reparsed = parsed(&output);
    let mut nav = Navigator::new(&reparsed);
    nav.find("MeContext");
    nav.next();
    assert!(nav.find("userLabel"));
    assert_eq!(nav.text(), "Site 2 & more");
}

#[test]
fn test_append_to_empty_element() {
    let session = parsed(SIMPLE);
    let mut nav = Navigator::new(&session);
    assert!(nav.find("fileFooter"));
    assert_eq!(nav.tag_name().as_deref(), Some("fileFooter"));
    let id = nav.current().unwrap();
    assert!(session.append_text(id, "end"));

    let output = String::from_utf8(written(&session)).unwrap();
    assert!(output.contains("<fileFooter dateTime=\"2022-09-16T08:41:16Z\">end</fileFooter>"));
}

#[test]
fn test_delete_element() {
    let session = parsed(SIMPLE);
    let mut nav = Navigator::new(&session);
    assert!(nav.find("MeContext"));
    assert!(nav.next());
    assert!(nav.next());
    assert_eq!(nav.attribute("id").as_deref(), Some("SITE004"));
    assert!(session.delete(nav.current().unwrap()).unwrap());

    let output = written(&session);
    let text = String::from_utf8(output.clone()).unwrap();
    assert!(!text.contains("SITE004"));
    assert!(text.contains("<!-- decommissioned: SITE003 -->"));

    let reparsed = parsed(&output);
    let mut nav = Navigator::new(&reparsed);
    assert!(nav.find("MeContext"));
    let mut ids = vec![nav.attribute("id").unwrap()];
    while nav.next() {
        ids.push(nav.attribute("id").unwrap());
    }
    assert_eq!(ids, ["SITE001", "SITE002", "SITE005"]);
}
