use std::fmt;

use hecs::Entity;
use uuid::Uuid;

/// A status effect attached to a combatant by the automation engine.
///
/// Concentration linkage is by back-reference (owner entity + effect id),
/// never by owning pointer, so removing a parent can cascade through its
/// children without cycles.
#[derive(Debug, Clone)]
pub struct ActiveEffect {
    pub id: Uuid,
    pub name: String,
    /// Remaining duration in rounds. `None` means indefinite.
    pub duration: Option<i32>,
    /// Argument-string payload, e.g. `-b 2 -d 1d4`. Harvested by
    /// `systems::combat::active_effect_values`.
    pub effects: String,
    /// Tick the duration at the end of the owner's turn rather than the
    /// start.
    pub tick_on_end: bool,
    /// Set on the effect the caster concentrates on.
    pub concentration: bool,
    pub parent: Option<(Entity, Uuid)>,
    pub children: Vec<(Entity, Uuid)>,
}

impl ActiveEffect {
    pub fn new(name: impl Into<String>, duration: Option<i32>, effects: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            duration,
            effects: effects.into(),
            tick_on_end: false,
            concentration: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_tick_on_end(mut self, tick_on_end: bool) -> Self {
        self.tick_on_end = tick_on_end;
        self
    }

    pub fn with_concentration(mut self) -> Self {
        self.concentration = true;
        self
    }
}

impl fmt::Display for ActiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(duration) = self.duration {
            if duration == 1 {
                write!(f, " [1 round]")?;
            } else {
                write!(f, " [{} rounds]", duration)?;
            }
        }
        if !self.effects.is_empty() {
            write!(f, " ({})", self.effects)?;
        }
        Ok(())
    }
}

/// Component: the effects currently attached to a combatant.
#[derive(Debug, Clone, Default)]
pub struct ActiveEffects(pub Vec<ActiveEffect>);

impl ActiveEffects {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.0.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&ActiveEffect> {
        self.0.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut ActiveEffect> {
        self.0.iter_mut().find(|e| e.id == id)
    }
}
