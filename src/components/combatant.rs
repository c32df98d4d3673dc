/// Display name of a combatant or character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmorClass(pub i32);

/// User id of the player controlling this combatant. Private HP reports are
/// bucketed under this id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller(pub String);

/// Marker: exact HP is hidden from public output for this combatant.
#[derive(Debug, Clone, Copy, Default)]
pub struct Private;

/// Player-character settings that override invocation arguments.
#[derive(Debug, Clone, Default)]
pub struct CharacterSheet {
    /// Reroll d20 faces equal to this value once (halfling luck).
    pub reroll: Option<u32>,
    /// Crit on natural rolls at or above this value.
    pub criton: Option<u32>,
    /// Extra weapon dice added per damage die on a crit.
    pub critdice: Option<u32>,
}
