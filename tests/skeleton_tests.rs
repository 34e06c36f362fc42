mod common;

use crate::common::records::{
    HOME_SKELETON, Rec, SETTINGS_SKELETON, app_document, home_screen, settings_screen, tree,
};
use screen_script::skeleton::classifier::DEFAULT_MIN_MATCH_SIZE;
use screen_script::skeleton::{
    Fingerprint, classify, classify_fingerprint, intersect, merge_samples, rank,
};
use screen_script::tree::build;

// ============================================================================
// Fingerprint
// ============================================================================

#[test]
fn fingerprint_keeps_structure_only() {
    let t = build(&home_screen()).unwrap();
    let fp = t.fingerprint();
    let markup = fp.to_markup();
    assert!(markup.starts_with("<FrameLayout resource_id='root'>"));
    assert!(!markup.contains("Home"), "Text is dropped");
    assert!(!markup.contains(" id='"), "Node ids are dropped: {}", markup);
    assert_eq!(fp.size(), 6);
}

#[test]
fn fingerprint_collapses_consecutive_repeats() {
    let long = build(&settings_screen(&["a", "b", "c", "d"])).unwrap().fingerprint();
    let short = build(&settings_screen(&["x"])).unwrap().fingerprint();
    assert_eq!(long, short, "List length does not change the skeleton");
    assert_eq!(long.digest(), short.digest());
}

#[test]
fn fingerprint_keeps_non_consecutive_repeats() {
    let fp = tree(vec![
        Rec::new(0, -1, "android.widget.FrameLayout"),
        Rec::new(1, 0, "android.widget.TextView").rid("a"),
        Rec::new(2, 0, "android.widget.Button").rid("b"),
        Rec::new(3, 0, "android.widget.TextView").rid("a"),
    ])
    .fingerprint();
    assert_eq!(fp.root.as_ref().unwrap().children.len(), 3);
}

#[test]
fn markup_parses_back_to_the_same_fingerprint() {
    let fp = build(&home_screen()).unwrap().fingerprint();
    let parsed = Fingerprint::from_markup(&fp.to_markup()).unwrap();
    assert_eq!(parsed, fp);

    let compact = Fingerprint::from_markup(HOME_SKELETON).unwrap();
    assert_eq!(compact, fp, "Whitespace between tags is irrelevant");
}

#[test]
fn full_screen_markup_parses_to_its_fingerprint() {
    let t = build(&home_screen()).unwrap();
    let parsed = Fingerprint::from_markup(&t.markup()).unwrap();
    assert_eq!(parsed, t.fingerprint(), "Ids, alt and text are ignored");
}

#[test]
fn from_markup_rejects_broken_markup() {
    assert!(Fingerprint::from_markup("<A><B></A>").is_err());
    assert!(Fingerprint::from_markup("<A resource_id='x>").is_err());
    assert!(Fingerprint::from_markup("<A></A><B></B>").is_err());
    assert!(Fingerprint::from_markup("").unwrap().is_empty());
}

// ============================================================================
// Intersection
// ============================================================================

#[test]
fn intersect_with_itself_is_identity() {
    let fp = Fingerprint::from_markup(SETTINGS_SKELETON).unwrap();
    let (common, size) = intersect(&fp, &fp);
    assert_eq!(common, fp);
    assert_eq!(size, fp.size());
}

#[test]
fn intersect_aligns_children_by_position() {
    let a = Fingerprint::from_markup("<R><A></A><B></B><C></C></R>").unwrap();
    let b = Fingerprint::from_markup("<R><A></A><C></C></R>").unwrap();
    let (common, size) = intersect(&a, &b);
    assert_eq!(size, 2, "Only R and A line up");
    assert_eq!(common.to_markup(), "<R>\n  <A></A>\n</R>\n");
}

#[test]
fn intersect_size_is_commutative() {
    let pairs = [
        ("<R><A></A><B></B><C></C></R>", "<R><A></A><C></C></R>"),
        (HOME_SKELETON, SETTINGS_SKELETON),
        ("<R><A><X></X></A></R>", "<R><A></A><B></B></R>"),
    ];
    for (left, right) in pairs {
        let a = Fingerprint::from_markup(left).unwrap();
        let b = Fingerprint::from_markup(right).unwrap();
        assert_ne!(a, b);
        let (ab, ab_size) = intersect(&a, &b);
        let (ba, ba_size) = intersect(&b, &a);
        assert_eq!(ab_size, ba_size, "Sizes differ for {} / {}", left, right);
        assert_eq!(ab, ba);
    }
}

#[test]
fn intersect_with_different_roots_is_empty() {
    let a = Fingerprint::from_markup("<R><A></A></R>").unwrap();
    let b = Fingerprint::from_markup("<S><A></A></S>").unwrap();
    let (common, size) = intersect(&a, &b);
    assert!(common.is_empty());
    assert_eq!(size, 0);
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn classify_exact_match() {
    let doc = app_document();
    let t = build(&home_screen()).unwrap();
    assert_eq!(
        classify(&t, doc.fingerprints(), DEFAULT_MIN_MATCH_SIZE).as_deref(),
        Some("home")
    );
}

#[test]
fn classify_by_largest_intersection() {
    let doc = app_document();
    // Settings with an empty list still shares four nodes with the settings skeleton.
    let t = build(&settings_screen(&[])).unwrap();
    assert_eq!(
        classify(&t, doc.fingerprints(), DEFAULT_MIN_MATCH_SIZE).as_deref(),
        Some("settings")
    );
    let scores = rank(&t.fingerprint(), doc.fingerprints());
    assert_eq!(scores[0].screen, "settings");
    assert_eq!(scores[0].size, 4);
}

#[test]
fn classify_requires_more_than_min_size() {
    let doc = app_document();
    let t = build(&settings_screen(&[])).unwrap();
    assert_eq!(
        classify(&t, doc.fingerprints(), 4),
        None,
        "Intersection must be strictly larger than the minimum"
    );
}

#[test]
fn classify_unrelated_screen_is_none() {
    let doc = app_document();
    let candidate = Fingerprint::from_markup("<WebView><div></div></WebView>").unwrap();
    assert_eq!(
        classify_fingerprint(&candidate, doc.fingerprints(), DEFAULT_MIN_MATCH_SIZE),
        None
    );
}

// ============================================================================
// Sample merging
// ============================================================================

#[test]
fn merge_samples_intersects_consistent_samples() {
    let samples = vec![
        Fingerprint::from_markup("<R><A></A><B></B><C></C><D></D></R>").unwrap(),
        Fingerprint::from_markup("<R><A></A><B></B><C></C><E></E></R>").unwrap(),
    ];
    let merged = merge_samples(&samples);
    assert_eq!(merged.mismatched, None);
    assert_eq!(merged.peak_size, 5);
    assert_eq!(merged.fingerprint.size(), 4);
}

#[test]
fn merge_samples_flags_first_outlier() {
    let samples = vec![
        Fingerprint::from_markup("<R><A></A><B></B><C></C><D></D></R>").unwrap(),
        Fingerprint::from_markup("<R><A></A><B></B><C></C><D></D></R>").unwrap(),
        Fingerprint::from_markup("<R><X></X></R>").unwrap(),
    ];
    let merged = merge_samples(&samples);
    assert_eq!(merged.mismatched, Some(2));
    assert_eq!(merged.fingerprint.size(), 5, "Running skeleton before the outlier");
}

#[test]
fn merge_samples_of_nothing_is_empty() {
    let merged = merge_samples(&[]);
    assert!(merged.fingerprint.is_empty());
    assert_eq!(merged.mismatched, None);
}
