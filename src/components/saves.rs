use std::collections::HashMap;

use super::ability::Ability;

/// Saving throw bonuses per ability. Renders the dice string the automation
/// engine hands to the roller, including advantage state.
#[derive(Debug, Clone, Default)]
pub struct SaveSet {
    modifiers: HashMap<Ability, i32>,
}

impl SaveSet {
    pub fn new() -> Self {
        Self {
            modifiers: HashMap::new(),
        }
    }

    pub fn set(&mut self, ability: Ability, modifier: i32) {
        self.modifiers.insert(ability, modifier);
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.modifiers.get(&ability).copied().unwrap_or(0)
    }

    /// `adv`: `Some(true)` rolls with advantage, `Some(false)` with
    /// disadvantage, `None` straight.
    pub fn d20(&self, ability: Ability, adv: Option<bool>) -> String {
        let d20 = match adv {
            Some(true) => "2d20kh1",
            Some(false) => "2d20kl1",
            None => "1d20",
        };
        let modifier = self.modifier(ability);
        if modifier >= 0 {
            format!("{}+{}", d20, modifier)
        } else {
            format!("{}{}", d20, modifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn d20_renders_advantage_states() {
        let mut saves = SaveSet::new();
        saves.set(Ability::Dexterity, 5);
        assert_eq!(saves.d20(Ability::Dexterity, None), "1d20+5");
        assert_eq!(saves.d20(Ability::Dexterity, Some(true)), "2d20kh1+5");
        assert_eq!(saves.d20(Ability::Dexterity, Some(false)), "2d20kl1+5");
    }

    #[test]
    fn d20_renders_negative_modifier() {
        let mut saves = SaveSet::new();
        saves.set(Ability::Strength, -2);
        assert_eq!(saves.d20(Ability::Strength, None), "1d20-2");
    }

    #[test]
    fn unset_ability_defaults_to_zero() {
        let saves = SaveSet::new();
        assert_eq!(saves.d20(Ability::Wisdom, None), "1d20+0");
    }
}
