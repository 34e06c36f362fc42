mod common;

use crate::common::records::{Rec, home_screen, records, tree};
use screen_script::tree::diff::{SeenSignatures, diff, signatures};
use screen_script::tree::markup::{escape_xml, unescape_xml};
use screen_script::tree::{TreeError, build};

// ============================================================================
// build
// ============================================================================

#[test]
fn build_links_children_in_document_order() {
    let t = build(&home_screen()).unwrap();
    assert_eq!(t.root(), 0);
    assert_eq!(t.len(), 6);
    assert_eq!(t.children(0), &[1, 4], "Root children keep record order");
    assert_eq!(t.children(1), &[2, 3]);
    let order: Vec<usize> = t.iter().map(|n| n.id).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4, 5], "Pre-order traversal");
}

#[test]
fn build_shortens_class_and_resource_id() {
    let t = build(&home_screen()).unwrap();
    let settings = t.node(3).unwrap();
    assert_eq!(settings.tag, "ImageButton");
    assert_eq!(settings.class_name, "android.widget.ImageButton");
    assert_eq!(settings.resource_id.as_deref(), Some("settings"));
    assert_eq!(settings.parent, Some(1));
}

#[test]
fn build_drops_invalid_leaves() {
    let t = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.TextView").text("shown"),
        Rec::new(2, 0, "android.widget.TextView").text("gone").hidden(),
    ]);
    assert!(t.contains(1));
    assert!(!t.contains(2), "Hidden leaf is pruned");
    assert_eq!(t.children(0), &[1]);
}

#[test]
fn build_keeps_invalid_node_with_valid_descendant() {
    let t = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.LinearLayout").hidden(),
        Rec::new(2, 1, "android.widget.Button").text("OK"),
    ]);
    assert!(t.contains(1), "Ancestor of a valid node is retained");
    assert_eq!(t.children(1), &[2]);
    assert_eq!(t.node(2).unwrap().parent, Some(1));
}

#[test]
fn build_always_keeps_root() {
    let t = tree(vec![Rec::new(0, -1, "android.widget.FrameLayout").hidden()]);
    assert_eq!(t.len(), 1);
    assert_eq!(t.root(), 0);
}

#[test]
fn build_rejects_malformed_records() {
    assert_eq!(build(&[]).unwrap_err(), TreeError::Empty);

    let mut shuffled = home_screen();
    shuffled[2].temp_id = 9;
    assert!(
        matches!(build(&shuffled), Err(TreeError::TempIdMismatch { index: 2, .. })),
        "temp_id must equal the record index"
    );

    let no_root = records(vec![
        Rec::new(0, 1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.TextView"),
    ]);
    assert_eq!(build(&no_root).unwrap_err(), TreeError::MissingRoot);

    let two_roots = records(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, -1, "android.widget.FrameLayout"),
    ]);
    assert!(matches!(build(&two_roots), Err(TreeError::MultipleRoots { .. })));

    let dangling = records(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 7, "android.widget.TextView"),
    ]);
    assert!(matches!(build(&dangling), Err(TreeError::DanglingParent { id: 1, .. })));
}

// ============================================================================
// queries
// ============================================================================

#[test]
fn subtree_holds_only_descendants() {
    let t = build(&home_screen()).unwrap();
    let sub = t.subtree(1).unwrap();
    assert_eq!(sub.root(), 1);
    assert_eq!(sub.len(), 3);
    assert!(sub.contains(3));
    assert!(!sub.contains(5), "Sibling branch is outside the subtree");
    assert_eq!(sub.node(1).unwrap().parent, None, "Subtree root is detached");
}

#[test]
fn scrollable_ancestor_skips_the_node_itself() {
    let t = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.ListView").scrollable(),
        Rec::new(2, 1, "android.widget.LinearLayout").scrollable(),
        Rec::new(3, 2, "android.widget.TextView").text("row"),
    ]);
    assert_eq!(t.scrollable_ancestor(3), Some(2));
    assert_eq!(t.scrollable_ancestor(2), Some(1));
    assert_eq!(t.scrollable_ancestor(0), None);
    assert_eq!(t.scrollable_ids(), vec![1, 2]);
}

#[test]
fn text_of_falls_back_to_descendants() {
    let t = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.LinearLayout"),
        Rec::new(2, 1, "android.widget.ImageView").alt("Avatar"),
        Rec::new(3, 1, "android.widget.TextView").text("Alice"),
    ]);
    assert_eq!(t.text_of(3).as_deref(), Some("Alice"));
    assert_eq!(t.text_of(1).as_deref(), Some("Alice"), "First descendant text wins");
    assert_eq!(t.text_of(2).as_deref(), Some("Avatar"), "Description as last resort");
}

#[test]
fn attributes_report_checked_state() {
    let t = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.Switch").rid("wifi_toggle").checked(),
    ]);
    let attrs = t.attributes(1).unwrap();
    assert_eq!(attrs.resource_id.as_deref(), Some("wifi_toggle"));
    assert!(attrs.checked);
    assert!(attrs.checkable);
}

// ============================================================================
// markup
// ============================================================================

#[test]
fn markup_renders_indented_elements() {
    let t = build(&home_screen()).unwrap();
    let markup = t.markup();
    let lines: Vec<&str> = markup.lines().collect();
    assert_eq!(lines[0], "<FrameLayout id='0' resource_id='root'>");
    assert_eq!(lines[2], "    <TextView id='2' resource_id='title'>Home</TextView>");
    assert_eq!(
        lines[3],
        "    <ImageButton id='3' resource_id='settings' alt='Settings'></ImageButton>"
    );
    assert_eq!(*lines.last().unwrap(), "</FrameLayout>");
}

#[test]
fn markup_shows_status_and_escapes_text() {
    let t = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.CheckBox").text("Tom & <Jerry>").checked(),
    ]);
    let markup = t.markup();
    assert!(
        markup.contains("<CheckBox id='1' status='checked'>Tom &amp; &lt;Jerry&gt;</CheckBox>"),
        "Got: {}",
        markup
    );
}

#[test]
fn xml_escaping_is_reversible() {
    let raw = "it's \"5\" < 6 & > 4";
    assert_eq!(unescape_xml(&escape_xml(raw)), raw);
}

// ============================================================================
// diff
// ============================================================================

#[test]
fn diff_ignores_bounds_changes() {
    let before = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.TextView").text("row").bounds(0, 0, 10, 10),
    ]);
    let after = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.TextView").text("row").bounds(0, 50, 10, 60),
    ]);
    assert!(diff(&signatures(&before), &signatures(&after)).is_unchanged());
}

#[test]
fn diff_reports_added_and_removed() {
    let before = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.TextView").text("a"),
    ]);
    let after = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.TextView").text("b"),
    ]);
    let d = diff(&signatures(&before), &signatures(&after));
    assert_eq!(d.added.len(), 1);
    assert_eq!(d.removed.len(), 1);
    assert!(!d.is_unchanged());
}

#[test]
fn seen_signatures_count_only_new_content() {
    let first = tree(vec![
        Rec::new(0, -1, "android.widget.ListView"),
        Rec::new(1, 0, "android.widget.TextView").text("a"),
        Rec::new(2, 0, "android.widget.TextView").text("b"),
    ]);
    let second = tree(vec![
        Rec::new(0, -1, "android.widget.ListView"),
        Rec::new(1, 0, "android.widget.TextView").text("b"),
        Rec::new(2, 0, "android.widget.TextView").text("c"),
    ]);
    let mut seen = SeenSignatures::new(&first);
    assert_eq!(seen.absorb(&second), 1, "Only 'c' is new");
    assert_eq!(seen.absorb(&first), 0, "Scrolling back shows nothing new");
}
