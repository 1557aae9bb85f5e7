//! Whole-world scenario tests (S1-S6) driven only through the public API,
//! the way a consumer crate would use `archetype_ecs`.

use std::cell::RefCell;
use std::rc::Rc;

use archetype_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vec2 {
    x: f32,
    y: f32,
}

#[test]
fn s1_position_velocity_integration() {
    let mut world = World::new();
    let pos = world.allocate_component(ComponentSpec::default()).unwrap();
    let vel = world.allocate_component(ComponentSpec::default()).unwrap();

    let e1 = world.spawn();
    let e2 = world.spawn();
    world.set(e1, pos, Vec2 { x: 0.0, y: 0.0 }).unwrap();
    world.set(e1, vel, Vec2 { x: 2.0, y: 1.0 }).unwrap();
    world.set(e2, pos, Vec2 { x: 5.0, y: 3.0 }).unwrap();
    world.set(e2, vel, Vec2 { x: -1.0, y: 0.5 }).unwrap();
    world.sync().unwrap();

    let query = world.create_query(&[pos, vel], QueryFilter::default());
    for _ in 0..2 {
        let rows = query.iterate(&world, &[pos, vel]).unwrap();
        for (entity, values) in rows {
            let p = archetype_ecs::value::downcast_ref::<Vec2>(&values[0]).unwrap();
            let v = archetype_ecs::value::downcast_ref::<Vec2>(&values[1]).unwrap();
            world
                .set(entity, pos, Vec2 { x: p.x + v.x, y: p.y + v.y })
                .unwrap();
        }
        world.sync().unwrap();
    }

    assert_eq!(world.get::<Vec2>(e1, pos).unwrap(), Vec2 { x: 4.0, y: 2.0 });
    assert_eq!(world.get::<Vec2>(e2, pos).unwrap(), Vec2 { x: 3.0, y: 4.0 });
}

#[test]
fn s2_exclusive_relation_replacement() {
    let mut world = World::new();
    let child_of = world.allocate_component(ComponentSpec::default()).unwrap();
    world.set_exclusive(child_of);

    let p1 = world.spawn();
    let p2 = world.spawn();
    let c = world.spawn();

    let rel1 = world.relation(child_of, RelationTarget::Entity(p1)).unwrap();
    world.tag(c, rel1).unwrap();
    world.sync().unwrap();
    assert!(world.has(c, rel1));

    let rel2 = world.relation(child_of, RelationTarget::Entity(p2)).unwrap();
    world.tag(c, rel2).unwrap();
    world.sync().unwrap();

    assert!(!world.has(c, rel1));
    assert!(world.has(c, rel2));
}

#[test]
fn s3_wildcard_listener_sees_removal_before_addition() {
    let mut world = World::new();
    let child_of = world.allocate_component(ComponentSpec::default()).unwrap();
    world.set_exclusive(child_of);

    let p1 = world.spawn();
    let p2 = world.spawn();
    let c = world.spawn();

    let rel1 = world.relation(child_of, RelationTarget::Entity(p1)).unwrap();
    world.tag(c, rel1).unwrap();
    world.sync().unwrap();

    let log: Rc<RefCell<Vec<(bool, Id)>>> = Rc::new(RefCell::new(Vec::new()));
    let wildcard = world.relation(child_of, RelationTarget::Wildcard).unwrap();
    let log_added = log.clone();
    let log_removed = log.clone();
    world.hook(
        wildcard,
        Hook::new()
            .on_removed(move |_ctx, _entity, component| {
                log_removed.borrow_mut().push((false, component));
            })
            .on_added(move |_ctx, _entity, component, _value| {
                log_added.borrow_mut().push((true, component));
            }),
    );

    let rel2 = world.relation(child_of, RelationTarget::Entity(p2)).unwrap();
    world.tag(c, rel2).unwrap();
    world.sync().unwrap();

    assert_eq!(*log.borrow(), vec![(false, rel1), (true, rel2)]);
}

#[test]
fn s4_cascade_on_destroy() {
    let mut world = World::new();
    let child_of = world
        .allocate_component(ComponentSpec {
            cascade_delete: true,
            ..Default::default()
        })
        .unwrap();

    let grandparent = world.spawn();
    let parent = world.spawn();
    let child = world.spawn();

    let p_rel = world.relation(child_of, RelationTarget::Entity(grandparent)).unwrap();
    world.tag(parent, p_rel).unwrap();
    let c_rel = world.relation(child_of, RelationTarget::Entity(parent)).unwrap();
    world.tag(child, c_rel).unwrap();
    world.sync().unwrap();

    world.destroy(grandparent).unwrap();
    world.sync().unwrap();

    assert!(!world.exists(grandparent));
    assert!(!world.exists(parent));
    assert!(!world.exists(child));
}

#[test]
fn s5_query_cache_tracks_archetype_birth_and_death() {
    let mut world = World::new();
    let pos = world.allocate_component(ComponentSpec::default()).unwrap();
    let health = world.allocate_component(ComponentSpec::default()).unwrap();
    let query = world.create_query(&[health], QueryFilter::default());

    let e = world.spawn();
    world.set(e, pos, 0i32).unwrap();
    world.sync().unwrap();
    assert_eq!(query.count(&world).unwrap(), 0);

    world.set(e, health, 100i32).unwrap();
    world.sync().unwrap();
    assert_eq!(query.count(&world).unwrap(), 1);

    world.delete(e, health).unwrap();
    world.sync().unwrap();
    assert_eq!(query.count(&world).unwrap(), 0);
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Position {
    x: f32,
    y: f32,
}

#[test]
fn s6_serialization_round_trip() {
    let mut world = World::new();
    let pos = world.allocate_component(ComponentSpec::default()).unwrap();
    let child_of = world.allocate_component(ComponentSpec::default()).unwrap();
    world.set_exclusive(child_of);

    let p1 = world.spawn();
    let _p2 = world.spawn();
    let c = world.spawn();
    world.set(p1, pos, Position { x: 1.0, y: 2.0 }).unwrap();
    let rel1 = world.relation(child_of, RelationTarget::Entity(p1)).unwrap();
    world.tag(c, rel1).unwrap();
    world.sync().unwrap();

    let max_existing = [p1, _p2, c].into_iter().max().unwrap();

    let mut registry = SerializationRegistry::new();
    registry.register::<Position>(pos);
    registry.register::<()>(child_of);

    let snapshot = world.serialize(&registry).unwrap();
    let mut restored = World::deserialize(&snapshot, &registry).unwrap();

    assert!(restored.exists(p1));
    assert!(restored.exists(c));
    assert_eq!(restored.get::<Position>(p1, pos).unwrap(), Position { x: 1.0, y: 2.0 });
    assert!(restored.has(c, rel1));

    let fresh = restored.spawn();
    assert!(fresh > max_existing);
}
