/// Damage type handling per target: four disjoint lists of damage type
/// names. Matching against dice annotations is case-insensitive substring
/// matching, so `fire` matches `[magical fire]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resistances {
    pub resist: Vec<String>,
    pub immune: Vec<String>,
    pub vuln: Vec<String>,
    pub neutral: Vec<String>,
}

impl Resistances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resist(types: &[&str]) -> Self {
        Self {
            resist: types.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn immune(types: &[&str]) -> Self {
        Self {
            immune: types.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn vuln(types: &[&str]) -> Self {
        Self {
            vuln: types.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }
}
