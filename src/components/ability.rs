use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::automation::AutomationError;

#[derive(EnumIter, Hash, Eq, PartialEq, Debug, Clone, Copy, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn acronym(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    /// Resolves a user-supplied save name ("dex", "dexterity", "dexteritySave")
    /// against the six canonical saves. The hint matches if it is a
    /// case-insensitive substring of `{ability}save`.
    pub fn from_save_hint(hint: &str) -> Result<Ability, AutomationError> {
        let hint = hint.to_lowercase();
        Ability::iter()
            .find(|a| format!("{}save", a.to_string().to_lowercase()).contains(&hint))
            .ok_or(AutomationError::InvalidSaveType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_hint_matches_abbreviation() {
        assert_eq!(Ability::from_save_hint("dex").unwrap(), Ability::Dexterity);
        assert_eq!(Ability::from_save_hint("STR").unwrap(), Ability::Strength);
        assert_eq!(Ability::from_save_hint("wis").unwrap(), Ability::Wisdom);
    }

    #[test]
    fn save_hint_matches_full_name() {
        assert_eq!(
            Ability::from_save_hint("constitutionSave").unwrap(),
            Ability::Constitution
        );
        assert_eq!(
            Ability::from_save_hint("intelligence").unwrap(),
            Ability::Intelligence
        );
    }

    #[test]
    fn save_hint_rejects_unknown() {
        assert_eq!(
            Ability::from_save_hint("luck").unwrap_err(),
            AutomationError::InvalidSaveType
        );
    }
}
