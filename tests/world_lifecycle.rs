// Entity and resource lifecycle: spawn/kill round trips, index recycling,
// and the shutdown drain.
//
// Run with:
//   cargo test --test world_lifecycle -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};

use sparse_ecs::prelude::*;

#[derive(Debug, PartialEq)]
struct Label(String);

#[derive(Debug, Default, PartialEq)]
struct Health(u32);

#[derive(Debug, PartialEq)]
struct Settings {
    x: i32,
}

// Tests in one binary run concurrently, so each destruction-counting test
// owns a counter slot through its probe's const parameter.
static DROP_COUNTS: [AtomicUsize; 3] = [
    AtomicUsize::new(0),
    AtomicUsize::new(0),
    AtomicUsize::new(0),
];

struct DropProbe<const SLOT: usize>;

impl<const SLOT: usize> Drop for DropProbe<SLOT> {
    fn drop(&mut self) {
        DROP_COUNTS[SLOT].fetch_add(1, Ordering::SeqCst);
    }
}

fn collect_now(world: &World) {
    world.command().set(GarbageCollect { enabled: true });
    world.update(0.0);
}

#[test]
fn spawn_kill_round_trip() {
    let world = World::new();
    world.startup();
    let command = world.command();
    let queryer = world.query();

    let entity = command.spawn_with((Label("a".to_owned()),));
    assert_eq!(queryer.get::<Label>(entity).unwrap().0, "a");
    assert!(queryer.exist(entity));

    command.kill(entity);
    collect_now(&world);

    assert!(!queryer.exist(entity));
    assert_eq!(queryer.query_all_of::<(Label,)>().count(), 0);
}

#[test]
fn index_recycling_bumps_generation() {
    let world = World::new();
    world.startup();
    let command = world.command();
    let queryer = world.query();

    let first = command.spawn();
    assert_eq!((first.index(), first.generation()), (1, 0));

    command.kill(first);
    collect_now(&world);

    let second = command.spawn();
    assert_eq!(second.index(), 1, "freed index must be reissued");
    assert_eq!(second.generation(), 1, "reissued index must carry the next generation");
    assert!(!queryer.exist(first), "the old handle is dead for good");
    assert!(queryer.exist(second));
}

#[test]
fn killed_entity_index_is_not_reused_before_collect() {
    let world = World::new();
    world.startup();
    let command = world.command();

    let first = command.spawn();
    command.kill(first);

    // No collect yet: the index is still owned by the killed entity.
    let second = command.spawn();
    assert_ne!(second.index(), first.index());
}

#[test]
fn duplicate_kills_within_a_tick_are_harmless() {
    let world = World::new();
    world.startup();
    let command = world.command();
    let queryer = world.query();

    let entity = command.spawn_with((Health(3),));
    command.kill(entity);
    command.kill(entity);
    command.kill(Entity::new(999, 7)); // unknown handle is tolerated
    collect_now(&world);

    assert!(!queryer.exist(entity));

    // The slot was destroyed exactly once: the next spawn of this index
    // carries generation 1, not 2.
    let next = command.spawn();
    assert_eq!(next.index(), entity.index());
    assert_eq!(next.generation(), entity.generation() + 1);
}

#[test]
fn kill_each_hides_every_target_immediately() {
    let world = World::new();
    world.startup();
    let command = world.command();
    let queryer = world.query();

    let entities: Vec<_> = (0..4).map(|_| command.spawn()).collect();
    command.kill_each(entities.iter().copied().take(3));

    assert_eq!(queryer.query_all_of::<()>().count(), 1);
    assert!(queryer.exist(entities[3]));
}

#[test]
fn resource_lifecycle() {
    let world = World::new();
    world.startup();
    let command = world.command();
    let queryer = world.query();

    command.add_with(Settings { x: 1 });
    assert_eq!(queryer.find::<Settings>().unwrap().x, 1);

    // A second add does not replace the installed value.
    command.add_with(Settings { x: 7 });
    assert_eq!(queryer.find::<Settings>().unwrap().x, 1);

    command.set(Settings { x: 2 });
    assert_eq!(queryer.find::<Settings>().unwrap().x, 2);

    command.remove::<Settings>();
    assert!(queryer.find::<Settings>().is_none());

    // set never creates.
    command.set(Settings { x: 3 });
    assert!(queryer.find::<Settings>().is_none());
}

#[test]
fn default_resource_add() {
    let world = World::new();
    world.startup();
    let command = world.command();
    let queryer = world.query();

    command.add::<Health>();
    assert_eq!(queryer.find::<Health>(), Some(&Health(0)));
}

#[test]
fn shutdown_destroys_every_instance_exactly_once() {
    let world = World::new();
    world.startup();
    let command = world.command();

    let keep = command.spawn_with((DropProbe::<0>, Label("keep".to_owned())));
    let detach_me = command.spawn_with((DropProbe::<0>,));
    let kill_me = command.spawn_with((DropProbe::<0>,));
    let _ = keep;

    command.detach::<DropProbe<0>>(detach_me);
    command.kill(kill_me);

    // Nothing destroyed yet: detach and kill are deferred.
    assert_eq!(DROP_COUNTS[0].load(Ordering::SeqCst), 0);

    world.shutdown();

    assert_eq!(
        DROP_COUNTS[0].load(Ordering::SeqCst),
        3,
        "every probe dropped exactly once"
    );
    assert_eq!(world.pool().in_use(), 0, "every pool block returned");
}

#[test]
fn shutdown_is_idempotent() {
    let world = World::new();
    world.startup();
    world.command().spawn_with((DropProbe::<1>,));

    world.shutdown();
    world.shutdown();

    assert_eq!(DROP_COUNTS[1].load(Ordering::SeqCst), 1);
}

#[test]
fn dropping_an_unshutdown_world_drains() {
    {
        let world = World::new();
        world.startup();
        world.command().spawn_with((DropProbe::<2>,));
    }

    assert_eq!(DROP_COUNTS[2].load(Ordering::SeqCst), 1);
}
