//! Pure string transforms over dice expressions. These run before the
//! expression reaches the roller, in the order the damage pipeline fixes:
//! cantrip scaling, up-cast append, minimum clamp, crit doubling, maximize,
//! resistance rewriting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::expr::{DiceError, DiceExpr, Scale};

static DICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)d(\d+)").unwrap());

/// Doubles the die count of every `NdM`, adding `extra_dice` on top
/// (weapon crit dice). `1d8+3` with one extra die becomes `3d8+3`.
pub fn double_on_crit(expression: &str, extra_dice: u32) -> String {
    DICE.replace_all(expression, |caps: &Captures| {
        let count: u32 = caps[1].parse().unwrap_or(1);
        format!("{}d{}", count * 2 + extra_dice, &caps[2])
    })
    .into_owned()
}

/// Appends a per-die minimum to every `NdM`: `2d6` becomes `2d6mi3`.
pub fn clamp_minimum(expression: &str, minimum: u32) -> String {
    DICE.replace_all(expression, |caps: &Captures| {
        format!("{}d{}mi{}", &caps[1], &caps[2], minimum)
    })
    .into_owned()
}

/// Forces every die to its maximum face: `2d6` becomes `2d6mi6`.
pub fn maximize(expression: &str) -> String {
    DICE.replace_all(expression, |caps: &Captures| {
        format!("{}d{}mi{}", &caps[1], &caps[2], &caps[2])
    })
    .into_owned()
}

/// Cantrip damage tier for a caster level: 1 below 5th, 2 below 11th,
/// 3 below 17th, 4 from 17th on.
pub fn cantrip_tier(caster_level: u8) -> u32 {
    match caster_level {
        0..=4 => 1,
        5..=10 => 2,
        11..=16 => 3,
        _ => 4,
    }
}

/// Replaces every die count with the caster's cantrip tier. Applying this
/// twice at the same level is a no-op.
pub fn scale_cantrip(expression: &str, caster_level: u8) -> String {
    let tier = cantrip_tier(caster_level);
    DICE.replace_all(expression, |caps: &Captures| {
        format!("{}d{}", tier, &caps[2])
    })
    .into_owned()
}

/// Rewrites each annotated term for the target's damage-type sets:
/// immunity zeroes it, resistance halves (floored), vulnerability doubles,
/// neutral forces it through unmodified. Resistance and vulnerability
/// cancel. Matching is case-insensitive substring matching on the
/// annotation, so `fire` catches `[magical fire]`.
pub fn apply_resistances(
    expression: &str,
    resist: &[String],
    immune: &[String],
    vuln: &[String],
    neutral: &[String],
) -> Result<String, DiceError> {
    let mut expr = DiceExpr::parse(expression)?;
    for (_, term) in &mut expr.terms {
        let Some(annotation) = &term.annotation else {
            continue;
        };
        if matches_any(annotation, neutral) {
            continue;
        }
        if matches_any(annotation, immune) {
            term.scale = Some(Scale::Times(0));
            continue;
        }
        let resisted = matches_any(annotation, resist);
        let vulnerable = matches_any(annotation, vuln);
        match (resisted, vulnerable) {
            (true, false) => term.scale = Some(Scale::Div(2)),
            (false, true) => term.scale = Some(Scale::Times(2)),
            _ => {}
        }
    }
    Ok(expr.to_string())
}

fn matches_any(annotation: &str, entries: &[String]) -> bool {
    let annotation = annotation.to_lowercase();
    entries
        .iter()
        .any(|e| annotation.contains(&e.to_lowercase()))
}
