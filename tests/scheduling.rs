// Scheduler semantics: priority ordering, bucket barriers, the reserved
// main-thread priorities, fault isolation, and the gated garbage collect.
//
// Run with:
//   cargo test --test scheduling -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use sparse_ecs::prelude::*;

#[derive(Default)]
struct Log(Mutex<Vec<&'static str>>);

#[derive(Default)]
struct Shared {
    value: i32,
}

#[derive(Default)]
struct Hits(AtomicUsize);

#[derive(Debug, Default, PartialEq)]
struct Payload(u64);

fn record(queryer: Queryer, name: &'static str) {
    queryer.find::<Log>().unwrap().0.lock().unwrap().push(name);
}

fn taken_log(world: &World) -> Vec<&'static str> {
    std::mem::take(&mut *world.query().find::<Log>().unwrap().0.lock().unwrap())
}

#[test]
fn update_systems_run_in_descending_priority_order() {
    fn system_a(_c: Command, q: Queryer, _dt: f32) {
        record(q, "A");
    }
    fn system_b(_c: Command, q: Queryer, _dt: f32) {
        record(q, "B");
    }
    fn system_c(_c: Command, q: Queryer, _dt: f32) {
        record(q, "C");
    }

    let mut world = World::new();
    world.add_update(system_b, 0);
    world.add_update(system_c, -10);
    world.add_update(system_a, 10);
    world.startup();
    world.command().add::<Log>();

    world.update(0.0);
    assert_eq!(taken_log(&world), vec!["A", "B", "C"]);
}

#[test]
fn main_thread_buckets_run_in_registration_order() {
    fn early_one(_c: Command, q: Queryer, _dt: f32) {
        record(q, "early-1");
    }
    fn early_two(_c: Command, q: Queryer, _dt: f32) {
        record(q, "early-2");
    }
    fn middle(_c: Command, q: Queryer, _dt: f32) {
        record(q, "middle");
    }
    fn late(_c: Command, q: Queryer, _dt: f32) {
        record(q, "late");
    }

    let mut world = World::new();
    world.add_update(late, LATE_MAIN_THREAD);
    world.add_update(early_one, EARLY_MAIN_THREAD);
    world.add_update(early_two, EARLY_MAIN_THREAD);
    world.add_update(middle, 0);
    world.startup();
    world.command().add::<Log>();

    world.update(0.0);
    assert_eq!(taken_log(&world), vec!["early-1", "early-2", "middle", "late"]);
}

#[test]
fn bucket_barrier_gives_happens_before_across_priorities() {
    fn writer(_c: Command, q: Queryer, _dt: f32) {
        q.find_mut::<Shared>().unwrap().value = 42;
    }
    fn reader(_c: Command, q: Queryer, _dt: f32) {
        let seen = q.find::<Shared>().unwrap().value;
        assert_eq!(seen, 42, "lower-priority bucket must observe prior writes");
        record(q, "reader-ran");
    }

    let mut world = World::new();
    world.add_update(reader, 0);
    world.add_update(writer, 10);
    world.startup();
    world.command().add::<Log>();
    world.command().add::<Shared>();

    world.update(0.0);
    assert_eq!(taken_log(&world), vec!["reader-ran"]);
}

#[test]
fn all_systems_of_a_parallel_bucket_execute() {
    fn hit(_c: Command, q: Queryer, _dt: f32) {
        q.find::<Hits>().unwrap().0.fetch_add(1, Ordering::SeqCst);
    }

    let mut world = World::new();
    for _ in 0..8 {
        world.add_update(hit, 3);
    }
    world.startup();
    world.command().add::<Hits>();

    world.update(0.0);
    world.update(0.0);
    let hits = world.query().find::<Hits>().unwrap().0.load(Ordering::SeqCst);
    assert_eq!(hits, 16);
}

#[test]
fn a_panicking_system_does_not_take_down_its_bucket() {
    fn faulty(_c: Command, _q: Queryer, _dt: f32) {
        panic!("deliberate test fault");
    }
    fn healthy(_c: Command, q: Queryer, _dt: f32) {
        record(q, "healthy");
    }
    fn downstream(_c: Command, q: Queryer, _dt: f32) {
        record(q, "downstream");
    }

    let mut world = World::new();
    world.add_update(faulty, 5);
    world.add_update(healthy, 5);
    world.add_update(downstream, 0);
    world.startup();
    world.command().add::<Log>();

    world.update(0.0);
    let log = taken_log(&world);
    assert!(log.contains(&"healthy"));
    assert_eq!(log.last(), Some(&"downstream"));

    // The world stays serviceable on later ticks.
    world.update(0.0);
    assert!(taken_log(&world).contains(&"healthy"));
}

#[test]
fn delta_time_reaches_update_systems() {
    fn capture(_c: Command, q: Queryer, dt: f32) {
        q.find_mut::<Shared>().unwrap().value = (dt * 1000.0) as i32;
    }

    let mut world = World::new();
    world.add_update(capture, 0);
    world.startup();
    world.command().add::<Shared>();

    world.update(0.25);
    assert_eq!(world.query().find::<Shared>().unwrap().value, 250);
}

#[test]
fn startup_and_shutdown_phases_run_their_systems() {
    fn on_startup(command: Command, _q: Queryer) {
        command.add_with(Shared { value: 1 });
    }
    static SHUTDOWN_HITS: AtomicUsize = AtomicUsize::new(0);
    fn on_shutdown(_c: Command, q: Queryer) {
        // Runs before the final drain: state is still readable.
        assert_eq!(q.find::<Shared>().unwrap().value, 1);
        SHUTDOWN_HITS.fetch_add(1, Ordering::SeqCst);
    }

    let mut world = World::new();
    world.add_startup(on_startup, 0);
    world.add_shutdown(on_shutdown, 0);
    world.startup();

    assert_eq!(world.query().find::<Shared>().unwrap().value, 1);

    world.shutdown();
    assert_eq!(SHUTDOWN_HITS.load(Ordering::SeqCst), 1);
}

#[test]
fn garbage_collect_waits_for_the_gate() {
    let world = World::new();
    world.startup();
    let command = world.command();
    let queryer = world.query();

    let entity = command.spawn_with((Payload(7),));
    command.kill(entity);

    // Gate disabled: the entity is hidden but its storage survives the tick.
    world.update(0.0);
    assert!(!queryer.exist(entity));
    assert_eq!(world.pool().in_use(), 1);

    // Gate enabled: the next tick drains and resets the gate.
    command.set(GarbageCollect { enabled: true });
    world.update(0.0);
    assert_eq!(world.pool().in_use(), 0);
    assert_eq!(
        queryer.find::<GarbageCollect>(),
        Some(&GarbageCollect { enabled: false }),
        "the gate must reset after draining"
    );
}

#[test]
fn gate_can_be_enabled_from_inside_a_system() {
    fn cull(command: Command, queryer: Queryer, _dt: f32) {
        let doomed: Vec<Entity> = queryer.query_all_of::<(Payload,)>().collect();
        command.kill_each(doomed);
        command.set(GarbageCollect { enabled: true });
    }

    let mut world = World::new();
    world.add_update(cull, 0);
    world.startup();
    for value in 0..4 {
        world.command().spawn_with((Payload(value),));
    }
    assert_eq!(world.pool().in_use(), 4);

    world.update(0.0);
    assert_eq!(world.live_entity_count(), 0);
    assert_eq!(world.pool().in_use(), 0, "same-tick enable drains this tick");
}

#[test]
fn startup_installs_the_gate_disabled() {
    let world = World::new();
    world.startup();
    assert_eq!(
        world.query().find::<GarbageCollect>(),
        Some(&GarbageCollect { enabled: false })
    );
}

#[test]
fn removed_gate_is_reinstalled_on_update() {
    let world = World::new();
    world.startup();
    world.command().remove::<GarbageCollect>();

    world.update(0.0);
    assert_eq!(
        world.query().find::<GarbageCollect>(),
        Some(&GarbageCollect { enabled: false })
    );
}
