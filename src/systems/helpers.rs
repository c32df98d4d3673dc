use std::any::type_name;
use std::ops::Deref;

use hecs::{Entity, Ref, World};

/// Optional component lookup. The automation engine never assumes a shape:
/// a target either has hit points, saves, resistances, ... or it does not,
/// and every consumer handles the `None`.
pub fn try_component<'a, T: hecs::Component>(world: &'a World, entity: Entity) -> Option<Ref<'a, T>> {
    world.get::<&T>(entity).ok()
}

pub fn try_component_clone<T: hecs::Component + Clone>(world: &World, entity: Entity) -> Option<T> {
    try_component::<T>(world, entity).map(|c| c.deref().clone())
}

pub fn has_component<T: hecs::Component>(world: &World, entity: Entity) -> bool {
    world.satisfies::<&T>(entity).unwrap_or(false)
}

/// Panicking lookup for code paths that have already checked presence
/// (fixtures, tests).
pub fn get_component<'a, T: hecs::Component>(world: &'a World, entity: Entity) -> Ref<'a, T> {
    world.get::<&T>(entity).unwrap_or_else(|_| {
        panic!(
            "Entity {:?} is missing component of type `{}`",
            entity,
            type_name::<T>()
        )
    })
}
