//! Universal invariants from the core's test matrix, each as a concrete
//! scenario rather than a generated property (no property-testing crate
//! is part of this stack).

use archetype_ecs::prelude::*;

#[test]
fn every_live_entity_belongs_to_exactly_one_matching_archetype() {
    let mut world = World::new();
    let a = world.allocate_component(ComponentSpec::default()).unwrap();
    let b = world.allocate_component(ComponentSpec::default()).unwrap();

    let e = world.spawn();
    world.set(e, a, 1i32).unwrap();
    world.set(e, b, 2i32).unwrap();
    world.sync().unwrap();

    assert!(world.has(e, a));
    assert!(world.has(e, b));

    world.delete(e, a).unwrap();
    world.sync().unwrap();
    assert!(!world.has(e, a));
    assert!(world.has(e, b));
}

#[test]
fn exclusive_relation_count_never_exceeds_one_after_sync() {
    let mut world = World::new();
    let owns = world.allocate_component(ComponentSpec::default()).unwrap();
    world.set_exclusive(owns);

    let e = world.spawn();
    let targets: Vec<Id> = (0..5).map(|_| world.spawn()).collect();
    for &t in &targets {
        let rel = world.relation(owns, RelationTarget::Entity(t)).unwrap();
        world.tag(e, rel).unwrap();
    }
    world.sync().unwrap();

    let present = targets
        .iter()
        .filter(|&&t| {
            let rel = world.relation(owns, RelationTarget::Entity(t)).unwrap();
            world.has(e, rel)
        })
        .count();
    assert_eq!(present, 1, "only the last enqueued relation should survive");
}

#[test]
fn sync_with_empty_buffer_is_idempotent() {
    let mut world = World::new();
    let c = world.allocate_component(ComponentSpec::default()).unwrap();
    let e = world.spawn();
    world.set(e, c, 7i32).unwrap();
    world.sync().unwrap();
    let before = world.get::<i32>(e, c).unwrap();
    world.sync().unwrap();
    world.sync().unwrap();
    assert_eq!(world.get::<i32>(e, c).unwrap(), before);
}

#[test]
fn query_entities_match_required_and_without_filters() {
    let mut world = World::new();
    let a = world.allocate_component(ComponentSpec::default()).unwrap();
    let b = world.allocate_component(ComponentSpec::default()).unwrap();

    let with_both = world.spawn();
    let with_a_only = world.spawn();
    world.set(with_both, a, 1i32).unwrap();
    world.set(with_both, b, 2i32).unwrap();
    world.set(with_a_only, a, 3i32).unwrap();
    world.sync().unwrap();

    let query = world.create_query(&[a], QueryFilter::without(vec![b]));
    let entities = query.entities(&world).unwrap();
    assert_eq!(entities, vec![with_a_only]);
}

#[test]
fn hook_fires_exactly_once_per_changed_component_removals_before_additions() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut world = World::new();
    let a = world.allocate_component(ComponentSpec::default()).unwrap();
    let b = world.allocate_component(ComponentSpec::default()).unwrap();
    let e = world.spawn();
    world.set(e, a, 1i32).unwrap();
    world.sync().unwrap();

    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let log_removed = log.clone();
    let log_added = log.clone();
    world.hook(a, Hook::new().on_removed(move |_ctx, _e, _c| log_removed.borrow_mut().push("removed_a")));
    world.hook(b, Hook::new().on_added(move |_ctx, _e, _c, _v| log_added.borrow_mut().push("added_b")));

    world.delete(e, a).unwrap();
    world.set(e, b, 2i32).unwrap();
    world.sync().unwrap();

    assert_eq!(*log.borrow(), vec!["removed_a", "added_b"]);
}

#[test]
fn cascade_destroys_sources_holding_a_cascade_delete_relation() {
    let mut world = World::new();
    let owns = world
        .allocate_component(ComponentSpec {
            cascade_delete: true,
            ..Default::default()
        })
        .unwrap();
    let target = world.spawn();
    let holder = world.spawn();
    let rel = world.relation(owns, RelationTarget::Entity(target)).unwrap();
    world.tag(holder, rel).unwrap();
    world.sync().unwrap();

    world.destroy(target).unwrap();
    world.sync().unwrap();

    assert!(!world.exists(target));
    assert!(!world.exists(holder));
}

#[test]
fn destroying_a_relation_source_directly_does_not_leave_a_stale_reverse_entry() {
    // `holder` points at `target` via a cascade-delete relation, but
    // `holder` itself (the source) is destroyed directly, not via a
    // cascade through `target`. If the reverse index didn't forget
    // `holder`'s own outgoing relation on its destruction, a later entity
    // reusing `holder`'s freed id would be mistaken for a surviving
    // reference and wrongly swept up when `target` is destroyed.
    let mut world = World::new();
    let owns = world
        .allocate_component(ComponentSpec {
            cascade_delete: true,
            ..Default::default()
        })
        .unwrap();
    let target = world.spawn();
    let holder = world.spawn();
    let rel = world.relation(owns, RelationTarget::Entity(target)).unwrap();
    world.tag(holder, rel).unwrap();
    world.sync().unwrap();

    world.destroy(holder).unwrap();
    world.sync().unwrap();
    assert!(!world.exists(holder));

    // Reuses `holder`'s freed id immediately (last-freed-first).
    let unrelated = world.spawn();
    assert_eq!(unrelated, holder, "freed id should be recycled for the next spawn");

    world.destroy(target).unwrap();
    world.sync().unwrap();

    assert!(!world.exists(target));
    assert!(
        world.exists(unrelated),
        "an unrelated entity reusing a freed id must not be swept up by a stale reverse-index entry"
    );
}

#[test]
fn per_entity_command_fifo_survives_interleaving_with_other_entities() {
    let mut world = World::new();
    let c = world.allocate_component(ComponentSpec::default()).unwrap();
    let e1 = world.spawn();
    let e2 = world.spawn();

    world.set(e1, c, 1i32).unwrap();
    world.set(e2, c, 100i32).unwrap();
    world.set(e1, c, 2i32).unwrap();
    world.set(e2, c, 200i32).unwrap();
    world.set(e1, c, 3i32).unwrap();
    world.sync().unwrap();

    assert_eq!(world.get::<i32>(e1, c).unwrap(), 3);
    assert_eq!(world.get::<i32>(e2, c).unwrap(), 200);
}

#[test]
fn destroy_short_circuits_later_commands_for_the_same_entity() {
    let mut world = World::new();
    let c = world.allocate_component(ComponentSpec::default()).unwrap();
    let e = world.spawn();
    // All three enqueue before any drain; destroy must win regardless of
    // the trailing `set` still being enqueued afterward.
    world.set(e, c, 1i32).unwrap();
    world.destroy(e).unwrap();
    world.set(e, c, 2i32).unwrap();
    world.sync().unwrap();
    assert!(!world.exists(e));
}
