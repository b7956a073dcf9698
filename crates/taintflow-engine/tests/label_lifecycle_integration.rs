use taintflow_engine::intern::InternTable;
use taintflow_engine::label::Label;
use taintflow_engine::runtime::Runtime;
use taintflow_engine::tag::Tag;
use taintflow_engine::value::Value;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn label_of(table: &mut InternTable, tags: &[Tag]) -> Label {
    let mut label = Label::none();
    for &tag in tags {
        label = table.add(&label, tag);
    }
    label
}

// ---------------------------------------------------------------------------
// Interning end to end
// ---------------------------------------------------------------------------

#[test]
fn merge_of_existing_singleton_is_identity() {
    // t1=mint; t2=mint; L1={t1}; L2=L1+t2; L3=merge(L2, {t1}) == L2.
    let mut table = InternTable::new();
    let t1 = Tag::mint();
    let t2 = Tag::mint();

    let l1 = table.singleton(t1);
    let l2 = table.add(&l1, t2);
    let l3 = {
        let s1 = table.singleton(t1);
        table.merge(&l2, &s1)
    };

    assert!(l3.ptr_eq(&l2));
    assert_eq!(l3, l2);
}

#[test]
fn deep_construction_shares_every_prefix() {
    let mut table = InternTable::new();
    let tags: Vec<Tag> = (0..16).map(|_| Tag::mint()).collect();

    // Hold every prefix alive so each shape keeps its table entry.
    let mut prefixes: Vec<Label> = Vec::new();
    let mut label = Label::none();
    for &tag in &tags {
        label = table.add(&label, tag);
        prefixes.push(label.clone());
    }
    assert_eq!(table.len(), tags.len());

    // Rebuilding the same chain shares every node.
    let rebuilt = label_of(&mut table, &tags);
    assert!(rebuilt.ptr_eq(prefixes.last().unwrap()));
    for prefix in &prefixes {
        assert!(rebuilt.has_label(prefix));
    }
    assert_eq!(table.len(), tags.len());
}

#[test]
fn interleaved_merges_stay_canonical() {
    let mut table = InternTable::new();
    let tags: Vec<Tag> = (0..6).map(|_| Tag::mint()).collect();

    let evens = label_of(&mut table, &[tags[0], tags[2], tags[4]]);
    let odds = label_of(&mut table, &[tags[1], tags[3], tags[5]]);
    let all_forward = table.merge(&evens, &odds);
    let all_backward = table.merge(&odds, &evens);
    let all_built = label_of(&mut table, &tags);

    assert!(all_forward.ptr_eq(&all_backward));
    assert!(all_forward.ptr_eq(&all_built));
    assert_eq!(all_forward.tag_count(), 6);
}

// ---------------------------------------------------------------------------
// Weak-table lifecycle through heap ownership
// ---------------------------------------------------------------------------

#[test]
fn label_owned_only_by_a_cell_dies_with_the_cell() {
    let mut rt = Runtime::new();
    let t = Tag::mint();

    let descriptor = {
        let label = rt.labels.singleton(t);
        let s = rt.heap.alloc_str_labeled("secret", label);
        let Value::Str(id) = s else { unreachable!() };
        let descriptor = rt.heap.label_of(s).descriptor().cloned().unwrap();

        // The cell is the only owner once our local handle drops.
        assert!(rt.labels.contains(&descriptor));
        rt.heap.free(id);
        descriptor
    };

    assert!(!rt.labels.contains(&descriptor));

    // Re-interning the same shape produces a fresh entry, not the stale one.
    let reborn = rt.labels.singleton(t);
    assert_eq!(reborn.descriptor(), Some(&descriptor));
    assert!(rt.labels.contains(&descriptor));
}

#[test]
fn sweep_after_mass_release_leaves_only_live_shapes() {
    let mut table = InternTable::new();
    let tags: Vec<Tag> = (0..8).map(|_| Tag::mint()).collect();

    let keepers: Vec<Label> = tags[..4].iter().map(|&t| table.singleton(t)).collect();
    for window in tags.windows(3) {
        let transient = label_of(&mut table, window);
        assert!(!transient.is_null());
    }

    table.sweep();
    assert_eq!(table.len(), keepers.len());
    for (keeper, &tag) in keepers.iter().zip(&tags) {
        assert!(keeper.has_tag(tag));
    }
}

// ---------------------------------------------------------------------------
// Cross-runtime transfer by descriptor
// ---------------------------------------------------------------------------

#[test]
fn adopting_a_descriptor_rebuilds_the_label_elsewhere() {
    let mut source = Runtime::new();
    let cap = source.construct_security_tag();
    let tainted = source
        .security_tag_add_to(cap, Value::Int(9))
        .expect("addTo");
    let label = source.heap.label_of(tainted);
    let descriptor = label.descriptor().cloned().unwrap();

    let mut destination = Runtime::new();
    let copied = destination.labels.adopt(&descriptor);
    assert_eq!(copied, label);
    assert!(!copied.ptr_eq(&label));
    for &tag in label.tags() {
        assert!(copied.has_tag(tag));
    }
}
