//! Shared combatants for unit and scenario tests.

use hecs::{Entity, World};

use crate::components::ability::Ability;
use crate::components::combatant::{ArmorClass, CharacterSheet, Controller, Name, Private};
use crate::components::effects::ActiveEffects;
use crate::components::health::HitPoints;
use crate::components::resistances::Resistances;
use crate::components::saves::SaveSet;
use crate::components::spellcasting::Spellbook;

/// A 7th-level caster: spell attack +6, spell DC 14.
pub fn caster(world: &mut World) -> Entity {
    let mut saves = SaveSet::new();
    saves.set(Ability::Wisdom, 5);
    world.spawn((
        Name("Elara".to_string()),
        HitPoints::new(38),
        Spellbook::new(6, 14, 7),
        CharacterSheet::default(),
        saves,
        ActiveEffects::new(),
        Resistances::new(),
    ))
}

/// A martial attacker with no spellbook.
pub fn fighter(world: &mut World) -> Entity {
    world.spawn((
        Name("Brand".to_string()),
        HitPoints::new(44),
        CharacterSheet::default(),
        ActiveEffects::new(),
        Resistances::new(),
    ))
}

/// A rank-and-file enemy: AC 13, DEX save +2.
pub fn goblin(world: &mut World, name: &str) -> Entity {
    let mut saves = SaveSet::new();
    saves.set(Ability::Dexterity, 2);
    world.spawn((
        Name(name.to_string()),
        HitPoints::new(15),
        ArmorClass(13),
        saves,
        ActiveEffects::new(),
        Resistances::new(),
    ))
}

/// A privately-controlled player combatant.
pub fn private_combatant(world: &mut World, name: &str, controller: &str) -> Entity {
    world.spawn((
        Name(name.to_string()),
        HitPoints::new(30),
        ArmorClass(15),
        SaveSet::new(),
        ActiveEffects::new(),
        Resistances::new(),
        Private,
        Controller(controller.to_string()),
    ))
}
