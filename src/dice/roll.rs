use std::fmt::Write as _;

use rand::Rng;
use rand::rngs::ThreadRng;

use super::expr::{DiceError, DiceExpr, DiceGroup, Keep, Scale, Sign, TermKind};

/// Source of individual die faces. Production code uses [`RandRoller`];
/// tests inject a scripted roller for reproducible runs.
pub trait DieRoller {
    fn roll_die(&mut self, size: u32) -> u32;
}

pub struct RandRoller<R: Rng> {
    rng: R,
}

impl RandRoller<ThreadRng> {
    pub fn new() -> Self {
        Self { rng: rand::rng() }
    }
}

impl Default for RandRoller<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandRoller<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> DieRoller for RandRoller<R> {
    fn roll_die(&mut self, size: u32) -> u32 {
        self.rng.random_range(1..=size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollCrit {
    None,
    Crit,
    Fumble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolledDie {
    pub value: u32,
    pub kept: bool,
    pub rerolled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolledGroup {
    pub spec: DiceGroup,
    pub annotation: Option<String>,
    pub scale: Option<Scale>,
    pub dice: Vec<RolledDie>,
}

impl RolledGroup {
    pub fn face(&self) -> u32 {
        self.spec.size
    }

    pub fn kept(&self) -> impl Iterator<Item = &RolledDie> {
        self.dice.iter().filter(|d| d.kept)
    }

    pub fn kept_total(&self) -> i32 {
        self.kept().map(|d| d.value as i32).sum()
    }

    pub fn scaled_total(&self) -> i32 {
        let total = self.kept_total();
        match self.scale {
            Some(scale) => scale.apply(total),
            None => total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolledTerm {
    Group(RolledGroup),
    Literal {
        value: i32,
        annotation: Option<String>,
        scale: Option<Scale>,
    },
}

impl RolledTerm {
    fn value(&self) -> i32 {
        match self {
            RolledTerm::Group(group) => group.scaled_total(),
            RolledTerm::Literal { value, scale, .. } => match scale {
                Some(scale) => scale.apply(*value),
                None => *value,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollResult {
    pub label: String,
    pub terms: Vec<(Sign, RolledTerm)>,
    pub total: i32,
    pub crit: RollCrit,
}

impl RollResult {
    /// Dice groups in expression order, for callers that inspect raw faces
    /// (e.g. the attack resolver looking for the d20).
    pub fn groups(&self) -> impl Iterator<Item = &RolledGroup> {
        self.terms.iter().filter_map(|(_, t)| match t {
            RolledTerm::Group(group) => Some(group),
            _ => None,
        })
    }

    pub fn has_dice(&self) -> bool {
        self.groups().next().is_some()
    }

    /// The kept total of the first d20 group, if any.
    pub fn d20_total(&self) -> Option<i32> {
        self.groups().find(|g| g.face() == 20).map(|g| g.kept_total())
    }

    /// Inline-rendered result line, e.g.
    /// `**To Hit**: 1d20 (15) + 6 = ` followed by the backticked total.
    pub fn result(&self) -> String {
        let mut out = format!("**{}**: ", self.label);
        for (i, (sign, term)) in self.terms.iter().enumerate() {
            match (i, sign) {
                (0, Sign::Plus) => {}
                (0, Sign::Minus) => out.push('-'),
                (_, Sign::Plus) => out.push_str(" + "),
                (_, Sign::Minus) => out.push_str(" - "),
            }
            match term {
                RolledTerm::Group(group) => {
                    let _ = write!(out, "{}", group.spec);
                    if let Some(annotation) = &group.annotation {
                        let _ = write!(out, "[{}]", annotation);
                    }
                    if let Some(scale) = &group.scale {
                        let _ = write!(out, "{}", scale);
                    }
                    out.push_str(" (");
                    for (j, die) in group.dice.iter().enumerate() {
                        if j > 0 {
                            out.push_str(", ");
                        }
                        if die.kept {
                            let _ = write!(out, "{}", die.value);
                        } else {
                            let _ = write!(out, "~~{}~~", die.value);
                        }
                    }
                    out.push(')');
                }
                RolledTerm::Literal {
                    value,
                    annotation,
                    scale,
                } => {
                    let _ = write!(out, "{}", value);
                    if let Some(annotation) = annotation {
                        let _ = write!(out, "[{}]", annotation);
                    }
                    if let Some(scale) = scale {
                        let _ = write!(out, "{}", scale);
                    }
                }
            }
        }
        let _ = write!(out, " = `{}`", self.total);
        out
    }

    /// One-line re-rollable form: every dice group collapsed to its kept
    /// total, annotations preserved. This is what meta-variables store.
    pub fn consolidated(&self) -> String {
        let mut out = String::new();
        for (i, (sign, term)) in self.terms.iter().enumerate() {
            match (i, sign) {
                (0, Sign::Plus) => {}
                (0, Sign::Minus) => out.push('-'),
                (_, Sign::Plus) => out.push('+'),
                (_, Sign::Minus) => out.push('-'),
            }
            let (value, annotation, scale) = match term {
                RolledTerm::Group(group) => {
                    (group.kept_total(), group.annotation.as_ref(), group.scale.as_ref())
                }
                RolledTerm::Literal {
                    value,
                    annotation,
                    scale,
                } => (*value, annotation.as_ref(), scale.as_ref()),
            };
            let _ = write!(out, "{}", value);
            if let Some(annotation) = annotation {
                let _ = write!(out, "[{}]", annotation);
            }
            if let Some(scale) = scale {
                let _ = write!(out, "{}", scale);
            }
        }
        out
    }
}

/// Parses and rolls `expression`, labelling the result line with `label`.
pub fn roll(
    expression: &str,
    label: &str,
    roller: &mut dyn DieRoller,
) -> Result<RollResult, DiceError> {
    let expr = DiceExpr::parse(expression)?;
    let mut terms = Vec::with_capacity(expr.terms.len());
    let mut total = 0;
    for (sign, term) in &expr.terms {
        let rolled = match &term.kind {
            TermKind::Dice(group) => RolledTerm::Group(roll_group(group, term, roller)),
            TermKind::Literal(value) => RolledTerm::Literal {
                value: *value,
                annotation: term.annotation.clone(),
                scale: term.scale,
            },
        };
        match sign {
            Sign::Plus => total += rolled.value(),
            Sign::Minus => total -= rolled.value(),
        }
        terms.push((*sign, rolled));
    }

    let crit = detect_crit(&terms);
    Ok(RollResult {
        label: label.to_string(),
        terms,
        total,
        crit,
    })
}

fn roll_group(group: &DiceGroup, term: &super::expr::Term, roller: &mut dyn DieRoller) -> RolledGroup {
    let mut dice = Vec::new();
    for _ in 0..group.count {
        let value = roller.roll_die(group.size);
        if group.reroll == Some(value) {
            dice.push(RolledDie {
                value,
                kept: false,
                rerolled: true,
            });
            let value = roller.roll_die(group.size);
            dice.push(RolledDie {
                value,
                kept: true,
                rerolled: false,
            });
        } else {
            dice.push(RolledDie {
                value,
                kept: true,
                rerolled: false,
            });
        }
    }

    if let Some(minimum) = group.minimum {
        for die in dice.iter_mut().filter(|d| d.kept) {
            if die.value < minimum {
                die.value = minimum;
            }
        }
    }

    if let Some(keep) = group.keep {
        let mut indices: Vec<usize> = dice
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kept)
            .map(|(i, _)| i)
            .collect();
        match keep {
            Keep::Highest(n) => {
                indices.sort_by_key(|&i| std::cmp::Reverse(dice[i].value));
                for &i in indices.iter().skip(n as usize) {
                    dice[i].kept = false;
                }
            }
            Keep::Lowest(n) => {
                indices.sort_by_key(|&i| dice[i].value);
                for &i in indices.iter().skip(n as usize) {
                    dice[i].kept = false;
                }
            }
        }
    }

    RolledGroup {
        spec: *group,
        annotation: term.annotation.clone(),
        scale: term.scale,
        dice,
    }
}

fn detect_crit(terms: &[(Sign, RolledTerm)]) -> RollCrit {
    let d20 = terms.iter().find_map(|(_, t)| match t {
        RolledTerm::Group(group) if group.face() == 20 => Some(group),
        _ => None,
    });
    let Some(group) = d20 else {
        return RollCrit::None;
    };
    let kept: Vec<&RolledDie> = group.kept().collect();
    if kept.len() != 1 {
        return RollCrit::None;
    }
    match kept[0].value {
        20 => RollCrit::Crit,
        1 => RollCrit::Fumble,
        _ => RollCrit::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FixedRoller;

    #[test]
    fn rolls_within_bounds() {
        let mut roller = RandRoller::new();
        let result = roll("2d6+3", "Damage", &mut roller).unwrap();
        assert!(result.total >= 5 && result.total <= 15);
        assert_eq!(result.groups().count(), 1);
    }

    #[test]
    fn fixed_faces_are_deterministic() {
        let mut roller = FixedRoller::new([3, 4]);
        let result = roll("2d6+3", "Damage", &mut roller).unwrap();
        assert_eq!(result.total, 10);
        assert_eq!(result.result(), "**Damage**: 2d6 (3, 4) + 3 = `10`");
    }

    #[test]
    fn keep_highest_drops_low_die() {
        let mut roller = FixedRoller::new([7, 15]);
        let result = roll("2d20kh1+6", "To Hit", &mut roller).unwrap();
        assert_eq!(result.total, 21);
        assert_eq!(result.d20_total(), Some(15));
    }

    #[test]
    fn keep_lowest_drops_high_die() {
        let mut roller = FixedRoller::new([7, 15]);
        let result = roll("2d20kl1", "To Hit", &mut roller).unwrap();
        assert_eq!(result.total, 7);
    }

    #[test]
    fn reroll_replaces_matching_face_once() {
        // the first die rolls a 1 and rerolls into another 1, which stands
        let mut roller = FixedRoller::new([1, 1, 5]);
        let result = roll("2d6ro1", "Damage", &mut roller).unwrap();
        assert_eq!(result.total, 6);
        let group = result.groups().next().unwrap();
        assert_eq!(group.dice.iter().filter(|d| d.rerolled).count(), 1);
    }

    #[test]
    fn minimum_clamps_faces() {
        let mut roller = FixedRoller::new([1, 2, 6]);
        let result = roll("3d6mi3", "Damage", &mut roller).unwrap();
        assert_eq!(result.total, 12);
    }

    #[test]
    fn natural_twenty_is_crit() {
        let mut roller = FixedRoller::new([20]);
        let result = roll("1d20+6", "To Hit", &mut roller).unwrap();
        assert_eq!(result.crit, RollCrit::Crit);
    }

    #[test]
    fn natural_one_is_fumble() {
        let mut roller = FixedRoller::new([1]);
        let result = roll("1d20+6", "To Hit", &mut roller).unwrap();
        assert_eq!(result.crit, RollCrit::Fumble);
    }

    #[test]
    fn crit_checks_kept_die_with_advantage() {
        let mut roller = FixedRoller::new([3, 20]);
        let result = roll("2d20kh1", "To Hit", &mut roller).unwrap();
        assert_eq!(result.crit, RollCrit::Crit);
    }

    #[test]
    fn scale_divides_group_total() {
        let mut roller = FixedRoller::new([3, 4]);
        let result = roll("2d6[fire]/2+2", "Damage", &mut roller).unwrap();
        assert_eq!(result.total, 5);
    }

    #[test]
    fn consolidated_collapses_groups() {
        let mut roller = FixedRoller::new([3, 4, 2]);
        let result = roll("2d6[fire]+1d4+1", "Damage", &mut roller).unwrap();
        assert_eq!(result.consolidated(), "7[fire]+2+1");
    }

    #[test]
    fn literal_only_expression_has_no_dice() {
        let mut roller = FixedRoller::new([]);
        let result = roll("4+2", "Check", &mut roller).unwrap();
        assert_eq!(result.total, 6);
        assert!(!result.has_dice());
        assert_eq!(result.crit, RollCrit::None);
    }
}
