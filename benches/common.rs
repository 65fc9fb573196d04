//! Shared fixtures for the benchmark suite.

use sparse_ecs::prelude::*;

pub const ENTITIES_SMALL: usize = 10_000;
pub const ENTITIES_LARGE: usize = 100_000;

#[derive(Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

pub fn make_world() -> World {
    let world = World::new();
    world.startup();
    world
}

pub fn populate(world: &World, count: usize) {
    let command = world.command();
    for i in 0..count {
        command.spawn_with((
            Position::default(),
            Velocity { x: (i % 7) as f32 * 0.25, y: 0.5 },
        ));
    }
}

pub fn integrate(_command: Command, queryer: Queryer, dt: f32) {
    for entity in queryer.query_all_of::<(Position, Velocity)>() {
        let velocity = queryer.get::<Velocity>(entity).unwrap();
        let (vx, vy) = (velocity.x, velocity.y);
        let position = queryer.get_mut::<Position>(entity).unwrap();
        position.x += vx * dt;
        position.y += vy * dt;
    }
}
