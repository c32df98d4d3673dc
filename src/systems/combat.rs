use hecs::{Entity, World};
use tracing::debug;
use uuid::Uuid;

use crate::args::Args;
use crate::components::ability::Ability;
use crate::components::combatant::{Name, Private};
use crate::components::effects::{ActiveEffect, ActiveEffects};
use crate::components::health::HitPoints;
use crate::components::saves::SaveSet;
use crate::systems::helpers::{has_component, try_component, try_component_clone};

pub fn name(world: &World, entity: Entity) -> String {
    try_component::<Name>(world, entity)
        .map(|n| n.0.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Public HP string: numeric, or qualitative when the combatant's HP is
/// private and `reveal` is not set.
pub fn hp_string(world: &World, entity: Entity, reveal: bool) -> Option<String> {
    let hp = try_component::<HitPoints>(world, entity)?;
    if has_component::<Private>(world, entity) && !reveal {
        Some(format!("<{}>", hp.descriptor()))
    } else {
        Some(hp.to_string())
    }
}

/// Returns false when the entity tracks no hit points.
pub fn modify_hp(world: &mut World, entity: Entity, delta: i32, overheal: bool) -> bool {
    match world.get::<&mut HitPoints>(entity) {
        Ok(mut hp) => {
            hp.modify(delta, overheal);
            true
        }
        Err(_) => false,
    }
}

pub fn set_temp_hp(world: &mut World, entity: Entity, amount: i32) -> bool {
    match world.get::<&mut HitPoints>(entity) {
        Ok(mut hp) => {
            hp.set_temp(amount);
            true
        }
        Err(_) => false,
    }
}

pub fn is_concentrating(world: &World, entity: Entity) -> bool {
    try_component::<ActiveEffects>(world, entity)
        .map(|effects| effects.iter().any(|e| e.concentration))
        .unwrap_or(false)
}

/// Saving throw dice for an entity, advantage folded in and any `-sb`
/// bonuses from attached effects appended. `None` when the entity has no
/// defined saves.
pub fn save_dice(
    world: &World,
    entity: Entity,
    ability: Ability,
    adv: Option<bool>,
) -> Option<String> {
    let saves = try_component_clone::<SaveSet>(world, entity)?;
    let mut dice = saves.d20(ability, adv);
    let bonuses = active_effect_values(world, entity, "sb");
    if !bonuses.is_empty() {
        dice = format!("{}+{}", dice, bonuses.join("+"));
    }
    Some(dice)
}

/// Harvests every `-{key}` value from the entity's attached effects, in
/// attach order. This is how effect riders like `-b 1d4` reach attack and
/// damage rolls.
pub fn active_effect_values(world: &World, entity: Entity, key: &str) -> Vec<String> {
    let Some(effects) = try_component::<ActiveEffects>(world, entity) else {
        return Vec::new();
    };
    effects
        .iter()
        .flat_map(|e| {
            let mut args = Args::parse(&e.effects);
            args.take_list(key)
        })
        .collect()
}

/// Attaches `effect` to the entity, registering it with its concentration
/// parent when one is set. Returns the effect id, or `None` when the
/// entity cannot hold effects.
pub fn add_effect(world: &mut World, entity: Entity, effect: ActiveEffect) -> Option<Uuid> {
    let id = effect.id;
    let parent = effect.parent;
    {
        let mut effects = world.get::<&mut ActiveEffects>(entity).ok()?;
        effects.0.push(effect);
    }
    if let Some((parent_entity, parent_id)) = parent {
        if let Ok(mut effects) = world.get::<&mut ActiveEffects>(parent_entity) {
            if let Some(parent_effect) = effects.get_mut(parent_id) {
                parent_effect.children.push((entity, id));
            }
        }
    }
    Some(id)
}

/// Removes an effect and, transitively, every child linked to it. Loss of
/// concentration cascades through here.
pub fn remove_effect(world: &mut World, entity: Entity, id: Uuid) {
    let children = {
        let Ok(mut effects) = world.get::<&mut ActiveEffects>(entity) else {
            return;
        };
        let Some(index) = effects.0.iter().position(|e| e.id == id) else {
            return;
        };
        let removed = effects.0.remove(index);
        debug!(effect = %removed.name, "removing effect");
        removed.children
    };
    for (child_entity, child_id) in children {
        remove_effect(world, child_entity, child_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::resistances::Resistances;

    fn world_with_combatant() -> (World, Entity) {
        let mut world = World::new();
        let entity = world.spawn((
            Name("Orc".to_string()),
            HitPoints::new(15),
            ActiveEffects::new(),
            Resistances::new(),
        ));
        (world, entity)
    }

    #[test]
    fn hp_string_is_numeric_for_public_combatants() {
        let (world, entity) = world_with_combatant();
        assert_eq!(hp_string(&world, entity, false).unwrap(), "15/15");
    }

    #[test]
    fn hp_string_is_qualitative_for_private_combatants() {
        let (mut world, entity) = world_with_combatant();
        world.insert_one(entity, Private).unwrap();
        modify_hp(&mut world, entity, -10, false);
        assert_eq!(hp_string(&world, entity, false).unwrap(), "<Bloodied>");
        assert_eq!(hp_string(&world, entity, true).unwrap(), "5/15");
    }

    #[test]
    fn active_effect_values_harvest_by_key() {
        let (mut world, entity) = world_with_combatant();
        add_effect(
            &mut world,
            entity,
            ActiveEffect::new("Blessed", Some(10), "-b 1d4 -sb 1d4"),
        );
        add_effect(&mut world, entity, ActiveEffect::new("Enlarged", Some(10), "-d 1d4"));
        assert_eq!(active_effect_values(&world, entity, "b"), vec!["1d4"]);
        assert_eq!(active_effect_values(&world, entity, "d"), vec!["1d4"]);
        assert_eq!(active_effect_values(&world, entity, "sb"), vec!["1d4"]);
    }

    #[test]
    fn remove_effect_cascades_to_children() {
        let (mut world, entity) = world_with_combatant();
        let parent_id = add_effect(
            &mut world,
            entity,
            ActiveEffect::new("Hexed", None, "").with_concentration(),
        )
        .unwrap();
        let mut child = ActiveEffect::new("Hex: Strength", None, "");
        child.parent = Some((entity, parent_id));
        add_effect(&mut world, entity, child);

        assert!(is_concentrating(&world, entity));
        remove_effect(&mut world, entity, parent_id);
        let effects = try_component::<ActiveEffects>(&world, entity).unwrap();
        assert!(effects.0.is_empty());
    }

    #[test]
    fn save_dice_appends_effect_bonuses() {
        let (mut world, entity) = world_with_combatant();
        let mut saves = SaveSet::new();
        saves.set(Ability::Dexterity, 2);
        world.insert_one(entity, saves).unwrap();
        add_effect(&mut world, entity, ActiveEffect::new("Blessed", Some(10), "-sb 1d4"));
        assert_eq!(
            save_dice(&world, entity, Ability::Dexterity, None).unwrap(),
            "1d20+2+1d4"
        );
    }
}
