pub mod ability;
pub mod combatant;
pub mod effects;
pub mod health;
pub mod resistances;
pub mod saves;
pub mod spellcasting;
