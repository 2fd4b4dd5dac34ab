//! End-to-end tests over the whole engine: view, navigator, providers
//! and registry working together.

use canopy::{
    ChangeBatch, Navigator, Position, RowChange, RowSummary, SnapshotKind, Value, ViewColumn,
    ViewRegistry, VirtualView, READERS_ITEM,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn people_view() -> Arc<VirtualView> {
    Arc::new(
        VirtualView::builder("people")
            .column(ViewColumn::new("Lastname").category())
            .column(ViewColumn::new("Firstname").ascending())
            .build()
            .unwrap(),
    )
}

fn person(last: &str, first: &str) -> RowSummary {
    RowSummary::new()
        .with("Lastname", last)
        .with("Firstname", first)
}

fn labels(entries: impl Iterator<Item = canopy::EntrySnapshot>) -> Vec<String> {
    entries
        .map(|e| match e.kind() {
            SnapshotKind::Category(c) => format!("[{}]", c.value.as_str().unwrap_or("?")),
            SnapshotKind::Document(_) => e
                .column_value("Firstname")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string(),
        })
        .collect()
}

fn seed_abbott_zeller(view: &VirtualView) {
    let batch = ChangeBatch::new("o1")
        .with_addition(RowChange::new(1, "unid-ed", person("Abbott", "Ed")))
        .with_addition(RowChange::new(2, "unid-al", person("Abbott", "Al")))
        .with_addition(RowChange::new(3, "unid-jo", person("Zeller", "Jo")));
    let outcome = view.apply_changes(&batch);
    assert!(outcome.is_clean());
}

/// Documents land under their category, both sorted by the configured
/// column directions.
#[test]
fn expanded_traversal_orders_categories_and_documents() {
    let view = people_view();
    seed_abbott_zeller(&view);

    let mut nav = Navigator::builder(view).build().unwrap();
    nav.expand_all();

    assert_eq!(
        labels(nav.entries_forward(false)),
        vec!["[Abbott]", "Al", "Ed", "[Zeller]", "Jo"]
    );
}

/// Removing a document updates the category's child count.
#[test]
fn removal_updates_child_count() {
    let view = people_view();
    seed_abbott_zeller(&view);

    view.apply_changes(&ChangeBatch::new("o1").with_removal(1)); // Ed

    let abbott = view.entry_at(&Position::parse("1").unwrap()).unwrap();
    let cat = abbott.as_category().unwrap();
    assert_eq!(cat.value, Value::String("Abbott".into()));
    assert_eq!(cat.child_count, 1);

    let mut nav = Navigator::builder(view).build().unwrap();
    nav.expand_all();
    assert_eq!(
        labels(nav.entries_forward(false)),
        vec!["[Abbott]", "Al", "[Zeller]", "Jo"]
    );
}

/// Removing the last document prunes the category.
#[test]
fn removing_last_document_prunes_category() {
    let view = people_view();
    seed_abbott_zeller(&view);

    view.apply_changes(&ChangeBatch::new("o1").with_removal(1));
    view.apply_changes(&ChangeBatch::new("o1").with_removal(2));

    let mut nav = Navigator::builder(view).build().unwrap();
    nav.expand_all();
    assert_eq!(labels(nav.entries_forward(false)), vec!["[Zeller]", "Jo"]);
}

/// Two origins feed one category; reader lists isolate restricted
/// rows without hiding the shared category.
#[test]
fn mixed_origin_readers() {
    let view = people_view();

    // o1: world-readable rows in category X
    view.apply_changes(
        &ChangeBatch::new("o1").with_addition(RowChange::new(1, "u1", person("X", "Open"))),
    );
    // o2: rows readable only by Bob, same category
    view.apply_changes(&ChangeBatch::new("o2").with_addition(RowChange::new(
        1,
        "u2",
        person("X", "Secret").with(READERS_ITEM, Value::List(vec!["Bob".into()])),
    )));

    let mut alice = Navigator::builder(view.clone())
        .as_user("Alice", &[])
        .hide_empty_categories(true)
        .build()
        .unwrap();
    alice.expand_all();
    assert_eq!(labels(alice.entries_forward(false)), vec!["[X]", "Open"]);

    let mut bob = Navigator::builder(view)
        .as_user("Bob", &[])
        .hide_empty_categories(true)
        .build()
        .unwrap();
    bob.expand_all();
    assert_eq!(
        labels(bob.entries_forward(false)),
        vec!["[X]", "Open", "Secret"]
    );
}

/// Concurrent create_view_once calls construct the view exactly once;
/// later callers wait and share the instance.
#[test]
fn registry_builds_once_under_concurrency() {
    let registry = Arc::new(ViewRegistry::new());
    let builds = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let builds = builds.clone();
            thread::spawn(move || {
                registry.create_view_once("v", 1, Duration::from_secs(60), |name| {
                    builds.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(80)); // slow builder
                    VirtualView::builder(name)
                        .column(ViewColumn::new("Lastname").category())
                        .column(ViewColumn::new("Firstname").ascending())
                        .build()
                        .unwrap()
                })
            })
        })
        .collect();

    let views: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for view in &views[1..] {
        assert!(Arc::ptr_eq(&views[0], view));
    }

    // A version bump is a different key and rebuilds
    registry.create_view_once("v", 2, Duration::from_secs(60), |name| {
        builds.fetch_add(1, Ordering::SeqCst);
        VirtualView::builder(name)
            .column(ViewColumn::new("Lastname").category())
            .build()
            .unwrap()
    });
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

/// Writers and readers interleave: a navigator opened before a batch
/// observes the new state on its next step, never a partial batch.
#[test]
fn traversal_observes_batches_atomically() {
    let view = people_view();
    seed_abbott_zeller(&view);

    let mut nav = Navigator::builder(view.clone()).build().unwrap();
    nav.expand_all();

    let mut entries = nav.entries_forward(false);
    assert_eq!(entries.next().unwrap().position().to_string(), "1");

    // A whole batch lands while the cursor is parked
    let batch = ChangeBatch::new("o2")
        .with_addition(RowChange::new(10, "u10", person("Abbott", "Bo")))
        .with_addition(RowChange::new(11, "u11", person("Abbott", "Cy")));
    view.apply_changes(&batch);

    // The cursor continues in the refreshed tree: Al, Bo, Cy, Ed
    let rest = labels(entries);
    assert_eq!(rest, vec!["Al", "Bo", "Cy", "Ed", "[Zeller]", "Jo"]);
}

/// An update that changes a document's sort key repositions it under
/// its category.
#[test]
fn update_in_place_reorders_document() {
    let view = people_view();
    seed_abbott_zeller(&view);

    // Ed becomes Aaron and sorts first within Abbott
    view.apply_changes(
        &ChangeBatch::new("o1").with_addition(RowChange::new(1, "unid-ed", person("Abbott", "Aaron"))),
    );

    let mut nav = Navigator::builder(view.clone()).build().unwrap();
    nav.expand_all();
    assert_eq!(
        labels(nav.entries_forward(false)),
        vec!["[Abbott]", "Aaron", "Al", "[Zeller]", "Jo"]
    );
    assert_eq!(view.document_count(), 3);
}
