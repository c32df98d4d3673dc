//! The automation engine: a declarative effect tree resolved against a set
//! of targets in a running combat. Authors describe an action (spell,
//! attack, feature) as nested typed effects; `Automation::run` walks the
//! tree, rolls dice, mutates targets and assembles a single report.

pub mod context;
pub mod effect;
pub mod target;

use std::fmt;

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::args::Args;
use crate::components::spellcasting::SpellInfo;
use crate::dice::{DiceError, DieRoller};
use crate::eval::EvalError;
use crate::report::Report;

use self::context::AutomationContext;
use self::effect::{AttackNode, DamageNode, Effect, SelectorKeyword, TargetNode, TargetSelector, TextNode};

/// One element of the invoker's target list. Simple (named-only) targets
/// can be described but not rolled against or damaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Simple(String),
    Combatant(Entity),
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub spell: Option<SpellInfo>,
    /// Concentration effect new status effects should hang off of:
    /// (owner entity, effect id).
    pub conc_parent: Option<(Entity, Uuid)>,
    pub ab_override: Option<i32>,
    pub dc_override: Option<i32>,
    /// Carried onto the report embed and prefixed to private messages.
    pub title: Option<String>,
}

/// A legacy attack record, convertible into a trivial automation tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttackRecord {
    pub name: String,
    #[serde(default)]
    pub bonus: Option<i32>,
    #[serde(default)]
    pub damage: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Automation {
    pub effects: Vec<Effect>,
}

impl Automation {
    pub fn new(effects: Vec<Effect>) -> Self {
        Self { effects }
    }

    /// Deserializes a list of tagged effect records. Unknown `type` tags
    /// are rejected.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Synthesizes the automation for an attack record: target each, roll
    /// to hit when a bonus exists (damage nested under the hit branch),
    /// else bare damage; details become descriptive text.
    pub fn from_attack(attack: &AttackRecord) -> Self {
        let damage = attack
            .damage
            .as_ref()
            .map(|damage| Effect::Damage(DamageNode::new(damage.clone())));

        let attack_effects = if let Some(bonus) = attack.bonus {
            let hit = damage.into_iter().collect();
            vec![Effect::Attack(AttackNode {
                hit,
                miss: Vec::new(),
                attack_bonus: Some(bonus.to_string()),
                meta: None,
            })]
        } else {
            damage.into_iter().collect()
        };

        let mut effects = Vec::new();
        if !attack_effects.is_empty() {
            effects.push(Effect::Target(TargetNode {
                selector: TargetSelector::Keyword(SelectorKeyword::Each),
                effects: attack_effects,
                meta: None,
            }));
        }
        if let Some(details) = &attack.details {
            effects.push(Effect::Text(TextNode {
                text: details.clone(),
                meta: None,
            }));
        }
        Self::new(effects)
    }

    /// Resolves the tree against `targets`, mutating combatants in `world`
    /// as damage and effects land, and returns the assembled report.
    /// Errors abort the run; target state already committed stands.
    pub fn run(
        &self,
        world: &mut World,
        caster: Entity,
        targets: &[TargetRef],
        args: Args,
        roller: &mut dyn DieRoller,
        options: RunOptions,
    ) -> Result<Report, AutomationError> {
        let mut ctx = AutomationContext::new(world, caster, targets, args, roller, options);
        for effect in &self.effects {
            effect.run(&mut ctx)?;
        }
        Ok(ctx.into_report())
    }
}

/// The one error family every automation failure belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationError {
    /// Neither the effect, the context nor the caster supplied an attack
    /// bonus.
    NoAttackBonus,
    /// No save DC from arguments, effect, context or caster.
    NoSpellDc,
    /// A save name matched none of the six abilities.
    InvalidSaveType,
    /// Non-numeric input where a number was required.
    InvalidArgument(String),
    /// A mechanical operation was attempted on a stat-less target.
    Target(String),
    /// Anything else that stops a run.
    Other(String),
    Dice(DiceError),
    Eval(EvalError),
}

impl fmt::Display for AutomationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomationError::NoAttackBonus => write!(f, "No attack bonus found."),
            AutomationError::NoSpellDc => write!(f, "No spell save DC found."),
            AutomationError::InvalidSaveType => write!(f, "Invalid save type."),
            AutomationError::InvalidArgument(message) => write!(f, "{}", message),
            AutomationError::Target(message) => write!(f, "{}", message),
            AutomationError::Other(message) => write!(f, "{}", message),
            AutomationError::Dice(e) => write!(f, "{}", e),
            AutomationError::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl From<DiceError> for AutomationError {
    fn from(e: DiceError) -> Self {
        AutomationError::Dice(e)
    }
}

impl From<EvalError> for AutomationError {
    fn from(e: EvalError) -> Self {
        AutomationError::Eval(e)
    }
}
