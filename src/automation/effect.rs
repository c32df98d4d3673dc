use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::ability::Ability;
use crate::components::effects::ActiveEffect;
use crate::dice::{RollCrit, rewrite};
use crate::systems::combat;

use super::context::AutomationContext;
use super::target::AutomationTarget;
use super::{AutomationError, TargetRef};

/// One node of an automation tree. The serialized form is a tagged record;
/// the `type` tag is drawn from the closed set of variant names below.
/// Every variant may carry a `meta` list executed before its body,
/// typically `roll` effects that populate meta-variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Effect {
    Target(TargetNode),
    Attack(AttackNode),
    Save(SaveNode),
    Damage(DamageNode),
    TempHp(TempHpNode),
    IEffect(IEffectNode),
    Roll(RollNode),
    Text(TextNode),
}

impl Effect {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Effect::Target(_) => "Target",
            Effect::Attack(_) => "Attack",
            Effect::Save(_) => "Save",
            Effect::Damage(_) => "Damage",
            Effect::TempHp(_) => "TempHP",
            Effect::IEffect(_) => "IEffect",
            Effect::Roll(_) => "Roll",
            Effect::Text(_) => "Text",
        }
    }

    fn meta(&self) -> Option<&Vec<Effect>> {
        match self {
            Effect::Target(node) => node.meta.as_ref(),
            Effect::Attack(node) => node.meta.as_ref(),
            Effect::Save(node) => node.meta.as_ref(),
            Effect::Damage(node) => node.meta.as_ref(),
            Effect::TempHp(node) => node.meta.as_ref(),
            Effect::IEffect(node) => node.meta.as_ref(),
            Effect::Roll(node) => node.meta.as_ref(),
            Effect::Text(node) => node.meta.as_ref(),
        }
    }

    /// Runs meta effects, then the node body. Only `Attack`, `Save` and
    /// `Damage` report a damage total.
    pub fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        debug!("running {}", self.kind_name());
        if let Some(meta) = self.meta() {
            for effect in meta {
                effect.run(ctx)?;
            }
        }
        match self {
            Effect::Target(node) => node.run(ctx),
            Effect::Attack(node) => node.run(ctx),
            Effect::Save(node) => node.run(ctx),
            Effect::Damage(node) => node.run(ctx),
            Effect::TempHp(node) => node.run(ctx),
            Effect::IEffect(node) => node.run(ctx),
            Effect::Roll(node) => node.run(ctx),
            Effect::Text(node) => node.run(ctx),
        }
    }

    pub fn run_children_with_damage(
        children: &[Effect],
        ctx: &mut AutomationContext,
    ) -> Result<i32, AutomationError> {
        let mut damage = 0;
        for effect in children {
            if let Some(total) = effect.run(ctx)? {
                damage += total;
            }
        }
        Ok(damage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKeyword {
    All,
    Each,
    #[serde(rename = "self")]
    Caster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSelector {
    Keyword(SelectorKeyword),
    /// 1-based index into the target list.
    Index(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetNode {
    #[serde(rename = "target")]
    pub selector: TargetSelector,
    pub effects: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl TargetNode {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        let result = self.dispatch(ctx);
        // the pointer is cleared on every exit path, errors included
        ctx.target = None;
        result.map(|_| None)
    }

    fn dispatch(&self, ctx: &mut AutomationContext) -> Result<(), AutomationError> {
        match &self.selector {
            TargetSelector::Keyword(SelectorKeyword::All)
            | TargetSelector::Keyword(SelectorKeyword::Each) => {
                for target in ctx.targets.clone() {
                    ctx.target = Some(AutomationTarget::new(target));
                    self.run_effects(ctx)?;
                }
            }
            TargetSelector::Keyword(SelectorKeyword::Caster) => {
                ctx.target = Some(AutomationTarget::new(Some(TargetRef::Combatant(ctx.caster))));
                self.run_effects(ctx)?;
            }
            TargetSelector::Index(index) => {
                let target = (*index as usize)
                    .checked_sub(1)
                    .and_then(|i| ctx.targets.get(i).cloned());
                match target {
                    Some(target) => {
                        ctx.target = Some(AutomationTarget::new(target));
                        self.run_effects(ctx)?;
                    }
                    // out of range: skip silently
                    None => {}
                }
            }
        }
        Ok(())
    }

    fn run_effects(&self, ctx: &mut AutomationContext) -> Result<(), AutomationError> {
        let rr = ctx.args.last::<i32>("rr").unwrap_or(1).clamp(1, 25);
        let in_target = ctx.target.as_ref().is_some_and(|t| t.target.is_some());
        let mut total_damage = 0;

        // 2 binary attributes: (rr?, target?)
        // each case ends with exactly one flush
        if rr > 1 {
            for iteration in 1..=rr {
                let iter_title = if self.effects.len() == 1 {
                    format!("{} {}", self.effects[0].kind_name(), iteration)
                } else {
                    format!("Iteration {}", iteration)
                };

                if in_target {
                    ctx.queue(format!("\n**__{}__**", iter_title));
                }

                total_damage += Effect::run_children_with_damage(&self.effects, ctx)?;

                if !in_target {
                    ctx.push_embed_field(iter_title, false);
                }
            }

            if in_target {
                if total_damage != 0 {
                    ctx.queue(format!("\n**__Total Damage__**: {}", total_damage));
                }
                let target = ctx.current_target();
                let name = target.name(ctx);
                ctx.push_embed_field(name, false);
            } else if total_damage != 0 {
                ctx.queue(total_damage.to_string());
                ctx.push_embed_field("Total Damage", true);
            }
        } else {
            Effect::run_children_with_damage(&self.effects, ctx)?;
            if in_target {
                let target = ctx.current_target();
                let name = target.name(ctx);
                ctx.push_embed_field(name, false);
            } else {
                ctx.flush_to_meta();
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttackOutcome {
    Hit,
    Crit,
    Miss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackNode {
    pub hit: Vec<Effect>,
    pub miss: Vec<Effect>,
    #[serde(default, rename = "attackBonus", skip_serializing_if = "Option::is_none")]
    pub attack_bonus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl AttackNode {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        // invocation arguments
        let adv = ctx.args.advantage(true, true);
        let crit = ctx.args.take_flag("crit");
        let hit = ctx.args.take_flag("hit");
        let miss = ctx.args.take_flag("miss") && !hit;
        let b = ctx.args.take_join("b", "+");

        let mut reroll = ctx.args.last::<u32>("reroll").unwrap_or(0);
        let mut criton = ctx.args.last::<u32>("criton").unwrap_or(20);
        let ac_arg = ctx.args.last::<i32>("ac");

        // character settings beat invocation arguments
        if let Some(sheet) = ctx.character_sheet() {
            reroll = sheet.reroll.filter(|r| *r != 0).unwrap_or(reroll);
            criton = sheet.criton.filter(|c| *c != 0).unwrap_or(criton);
        }

        // attack riders from the caster's attached effects
        let effect_b = ctx.caster_effect_values("b");
        let b = if effect_b.is_empty() {
            b
        } else {
            match b {
                Some(b) => Some(format!("{}+{}", b, effect_b.join("+"))),
                None => Some(effect_b.join("+")),
            }
        };

        let mut attack_bonus = ctx.ab_override.or_else(|| ctx.spell_attack_bonus());

        if let Some(bonus_expr) = &self.attack_bonus {
            let explicit = ctx.parse_annostr(bonus_expr)?;
            attack_bonus = Some(explicit.trim().parse::<i32>().map_err(|_| {
                AutomationError::Other(format!(
                    "{} cannot be interpreted as an attack bonus.",
                    explicit
                ))
            })?);
        }

        if attack_bonus.is_none() && b.is_none() {
            return Err(AutomationError::NoAttackBonus);
        }

        let mut damage = 0;

        if !(hit || miss) {
            let formatted_d20 = match adv {
                1 => "2d20kh1",
                2 => "3d20kh1",
                -1 => "2d20kl1",
                _ => "1d20",
            };
            let formatted_d20 = if reroll != 0 {
                format!("{}ro{}", formatted_d20, reroll)
            } else {
                formatted_d20.to_string()
            };

            let to_hit_label = match ac_arg {
                Some(ac) => format!("To Hit (AC {})", ac),
                None => "To Hit".to_string(),
            };

            let mut expression = formatted_d20;
            if let Some(bonus) = attack_bonus {
                if bonus >= 0 {
                    expression = format!("{}+{}", expression, bonus);
                } else {
                    expression = format!("{}{}", expression, bonus);
                }
            }
            if let Some(b) = &b {
                expression = format!("{}+{}", expression, b);
            }

            let to_hit = ctx.roll(&expression, &to_hit_label)?;
            ctx.queue(to_hit.result());

            let d20_value = to_hit.d20_total().unwrap_or(0);

            let mut outcome = if d20_value >= criton as i32 {
                AttackOutcome::Crit
            } else {
                match to_hit.crit {
                    RollCrit::Crit => AttackOutcome::Crit,
                    RollCrit::Fumble => AttackOutcome::Miss,
                    RollCrit::None => AttackOutcome::Hit,
                }
            };

            if outcome == AttackOutcome::Hit {
                let target = ctx.current_target();
                if let Some(ac) = ac_arg.or_else(|| target.ac(ctx)) {
                    if to_hit.total < ac {
                        outcome = AttackOutcome::Miss;
                    }
                }
            }

            damage += match outcome {
                AttackOutcome::Miss => self.on_miss(ctx)?,
                AttackOutcome::Crit => self.on_crit(ctx)?,
                AttackOutcome::Hit => self.on_hit(ctx)?,
            };
        } else if hit {
            ctx.queue("**To Hit**: Automatic hit!");
            damage += if crit {
                self.on_crit(ctx)?
            } else {
                self.on_hit(ctx)?
            };
        } else {
            ctx.queue("**To Hit**: Automatic miss!");
            damage += self.on_miss(ctx)?;
        }

        Ok(Some(damage))
    }

    fn on_hit(&self, ctx: &mut AutomationContext) -> Result<i32, AutomationError> {
        Effect::run_children_with_damage(&self.hit, ctx)
    }

    fn on_crit(&self, ctx: &mut AutomationContext) -> Result<i32, AutomationError> {
        let original = ctx.in_crit;
        ctx.in_crit = true;
        let result = self.on_hit(ctx);
        ctx.in_crit = original;
        result
    }

    fn on_miss(&self, ctx: &mut AutomationContext) -> Result<i32, AutomationError> {
        ctx.queue("**Miss!**");
        Effect::run_children_with_damage(&self.miss, ctx)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveNode {
    pub stat: String,
    pub fail: Vec<Effect>,
    pub success: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl SaveNode {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        let save_hint = ctx
            .args
            .last_str("save")
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.stat.clone());
        let auto_pass = ctx.args.take_flag("pass");
        let auto_fail = ctx.args.take_flag("fail");

        let mut dc_from_node = None;
        if let Some(dc_expr) = &self.dc {
            let parsed = ctx.parse_annostr(dc_expr)?;
            dc_from_node = Some(parsed.trim().parse::<i32>().map_err(|_| {
                AutomationError::Other(format!("{} cannot be interpreted as a DC.", parsed))
            })?);
        }

        let dc = ctx
            .args
            .last::<i32>("dc")
            .or(dc_from_node)
            .or(ctx.dc_override)
            .or_else(|| ctx.spell_dc())
            .ok_or(AutomationError::NoSpellDc)?;

        let ability = Ability::from_save_hint(&save_hint)?;

        ctx.meta_queue(format!("**DC**: {}", dc));

        let target = ctx.current_target();
        let is_success = if !target.is_simple() {
            let save_blurb = format!("{} Save", ability.acronym());
            if auto_pass {
                ctx.queue(format!("**{}:** Automatic success!", save_blurb));
                true
            } else if auto_fail {
                ctx.queue(format!("**{}:** Automatic failure!", save_blurb));
                false
            } else {
                let adv = ctx.args.advantage_bool();
                let save_dice = target.save_dice(ctx, ability, adv)?;
                let save_roll = ctx.roll(&save_dice, &save_blurb)?;
                let is_success = save_roll.total >= dc;
                let suffix = if is_success { "; Success!" } else { "; Failure!" };
                ctx.queue(format!("{}{}", save_roll.result(), suffix));
                is_success
            }
        } else {
            ctx.meta_queue(format!("{} Save", ability.acronym()));
            false
        };

        let damage = if is_success {
            Effect::run_children_with_damage(&self.success, ctx)?
        } else {
            Effect::run_children_with_damage(&self.fail, ctx)?
        };
        Ok(Some(damage))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageNode {
    pub damage: String,
    /// Up-cast add-ons, keyed by cast level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher: Option<HashMap<String, String>>,
    #[serde(default, rename = "cantripScale")]
    pub cantrip_scale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl DamageNode {
    pub fn new(damage: String) -> Self {
        Self {
            damage,
            higher: None,
            cantrip_scale: false,
            meta: None,
        }
    }

    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        // ephemeral arguments are consumed whether or not the roll happens
        let d = ctx.args.take_join("d", "+");
        let c = ctx.args.take_join("c", "+");
        let resist_args = ctx.args.take_list("resist");
        let immune_args = ctx.args.take_list("immune");
        let vuln_args = ctx.args.take_list("vuln");
        let neutral_args = ctx.args.take_list("neutral");
        let crit_arg = ctx.args.take_flag("crit");
        let max_arg = ctx.args.take_flag("max");
        let mi = ctx.args.last::<u32>("mi").unwrap_or(0);
        let mut critdice = ctx.args.last::<u32>("critdice").unwrap_or(0);

        if let Some(sheet) = ctx.character_sheet() {
            critdice = sheet.critdice.filter(|c| *c != 0).unwrap_or(critdice);
        }

        let target = ctx.current_target();
        let (resist, immune, vuln, neutral) = if target.is_simple() {
            (resist_args, immune_args, vuln_args, neutral_args)
        } else {
            let defaults = target.resistances(ctx);
            (
                or_default(resist_args, defaults.resist),
                or_default(immune_args, defaults.immune),
                or_default(vuln_args, defaults.vuln),
                or_default(neutral_args, defaults.neutral),
            )
        };

        // outside combat a roll of a bare meta-variable is redundant: the
        // value is already displayed
        if target.is_simple() && self.is_meta(ctx, true) {
            return Ok(None);
        }

        let effect_d = ctx.caster_effect_values("d");
        let d = if effect_d.is_empty() {
            d
        } else {
            match d {
                Some(d) => Some(format!("{}+{}", d, effect_d.join("+"))),
                None => Some(effect_d.join("+")),
            }
        };

        // a referenced meta-variable already folded -d in its Roll effect
        let d = if self.is_meta(ctx, false) { None } else { d };

        let mut damage = ctx.parse_annostr(&self.damage)?;

        if ctx.is_spell() {
            if self.cantrip_scale {
                damage = ctx.cantrip_scale(&damage);
            }
            if let Some(higher) = &self.higher {
                let cast_level = ctx.cast_level();
                let base_level = ctx.spell.as_ref().map(|s| s.level);
                if base_level != Some(cast_level) {
                    if let Some(extra) = higher.get(&cast_level.to_string()) {
                        damage = format!("{}+{}", damage, extra);
                    }
                }
            }
        }

        let in_crit = ctx.in_crit || crit_arg;
        let roll_label = if in_crit { "Damage (CRIT!)" } else { "Damage" };
        let weapon_crit_dice = if ctx.is_spell() { 0 } else { critdice };

        if mi != 0 {
            damage = rewrite::clamp_minimum(&damage, mi);
        }

        if in_crit {
            damage = rewrite::double_on_crit(&damage, weapon_crit_dice);
        }
        if let Some(d) = &d {
            let d = if in_crit {
                rewrite::double_on_crit(d, 0)
            } else {
                d.clone()
            };
            damage = format!("{}+{}", damage, d);
        }

        if let Some(c) = &c {
            if in_crit {
                damage = format!("{}+{}", damage, c);
            }
        }

        if max_arg {
            damage = rewrite::maximize(&damage);
        }

        let damage = rewrite::apply_resistances(&damage, &resist, &immune, &vuln, &neutral)?;

        let roll = ctx.roll(&damage, roll_label)?;
        ctx.queue(roll.result());

        target.damage(ctx, roll.total);

        Ok(Some(roll.total))
    }

    fn is_meta(&self, ctx: &AutomationContext, strict: bool) -> bool {
        references_metavar(&self.damage, ctx, strict)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempHpNode {
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher: Option<HashMap<String, String>>,
    #[serde(default, rename = "cantripScale")]
    pub cantrip_scale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl TempHpNode {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        let max_arg = ctx.args.take_flag("max");

        let target = ctx.current_target();
        if target.is_simple() && references_metavar(&self.amount, ctx, true) {
            return Ok(None);
        }

        let mut amount = ctx.parse_annostr(&self.amount)?;

        if ctx.is_spell() {
            if self.cantrip_scale {
                amount = ctx.cantrip_scale(&amount);
            }
            if let Some(higher) = &self.higher {
                let cast_level = ctx.cast_level();
                let base_level = ctx.spell.as_ref().map(|s| s.level);
                if base_level != Some(cast_level) {
                    if let Some(extra) = higher.get(&cast_level.to_string()) {
                        amount = format!("{}+{}", amount, extra);
                    }
                }
            }
        }

        if max_arg {
            amount = rewrite::maximize(&amount);
        }

        let roll = ctx.roll(&amount, "THP")?;
        ctx.queue(roll.result());

        if let Some(entity) = target.entity() {
            if combat::set_temp_hp(ctx.world, entity, roll.total.max(0)) {
                let name = combat::name(ctx.world, entity);
                if let Some(hp) = combat::hp_string(ctx.world, entity, false) {
                    ctx.footer_queue(format!("{}: {}", name, hp));
                }
            }
        }

        Ok(None)
    }
}

/// Duration of an attached effect: a round count, or an expression that
/// must evaluate to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Rounds(i32),
    Expr(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IEffectNode {
    pub name: String,
    pub duration: DurationValue,
    pub effects: String,
    #[serde(default, rename = "end")]
    pub tick_on_end: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl IEffectNode {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        let duration = match &self.duration {
            DurationValue::Rounds(rounds) => *rounds,
            DurationValue::Expr(expr) => {
                let parsed = ctx.parse_annostr(expr)?;
                match parsed.trim().parse::<i32>() {
                    Ok(rounds) => rounds,
                    // a dice expression is also a valid duration
                    Err(_) => match ctx.roll(parsed.trim(), "Duration") {
                        Ok(rolled) if rolled.has_dice() => rolled.total,
                        _ => {
                            return Err(AutomationError::InvalidArgument(format!(
                                "{} is not an integer (in effect duration)",
                                parsed
                            )));
                        }
                    },
                }
            }
        };
        let duration = ctx.args.last::<i32>("dur").unwrap_or(duration);

        let payload = ctx.parse_annostr(&self.effects)?;
        let mut effect = ActiveEffect::new(self.name.clone(), Some(duration), payload)
            .with_tick_on_end(self.tick_on_end);

        let target = ctx.current_target();
        if let Some(entity) = target.entity() {
            // loss of concentration cascades through this link
            effect.parent = ctx.conc_parent;
            let display = effect.to_string();
            combat::add_effect(ctx.world, entity, effect);
            ctx.queue(format!("**Effect**: {}", display));
        } else {
            ctx.queue(format!("**Effect**: {}", effect));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollNode {
    pub dice: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub higher: Option<HashMap<String, String>>,
    #[serde(default, rename = "cantripScale")]
    pub cantrip_scale: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl RollNode {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        let d = ctx.args.take_join("d", "+");
        let max_arg = ctx.args.take_flag("max");
        let mi = ctx.args.last::<u32>("mi").unwrap_or(0);

        let effect_d = ctx.caster_effect_values("d");
        let d = if effect_d.is_empty() {
            d
        } else {
            match d {
                Some(d) => Some(format!("{}+{}", d, effect_d.join("+"))),
                None => Some(effect_d.join("+")),
            }
        };

        let mut dice = self.dice.clone();

        if ctx.is_spell() {
            if self.cantrip_scale {
                dice = ctx.cantrip_scale(&dice);
            }
            if let Some(higher) = &self.higher {
                let cast_level = ctx.cast_level();
                let base_level = ctx.spell.as_ref().map(|s| s.level);
                if base_level != Some(cast_level) {
                    if let Some(extra) = higher.get(&cast_level.to_string()) {
                        dice = format!("{}+{}", dice, extra);
                    }
                }
            }
        }

        if !self.hidden {
            if mi != 0 {
                dice = rewrite::clamp_minimum(&dice, mi);
            }
            if let Some(d) = &d {
                dice = format!("{}+{}", dice, d);
            }
        }

        if max_arg {
            dice = rewrite::maximize(&dice);
        }

        let rolled = ctx.roll(&dice, &title_case(&self.name))?;
        if !self.hidden {
            ctx.meta_queue(rolled.result());
        }

        if !rolled.has_dice() {
            return Err(AutomationError::InvalidArgument(format!(
                "Invalid roll in meta roll: {}",
                rolled.result()
            )));
        }

        ctx.metavars.insert(self.name.clone(), rolled.consolidated());
        Ok(None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Vec<Effect>>,
}

impl TextNode {
    fn run(&self, ctx: &mut AutomationContext) -> Result<Option<i32>, AutomationError> {
        if self.text.is_empty() {
            return Ok(None);
        }
        let mut text = self.text.clone();
        if text.chars().count() > 1020 {
            text = format!("{}...", text.chars().take(1020).collect::<String>());
        }
        ctx.effect_queue(text);
        Ok(None)
    }
}

fn or_default(args: Vec<String>, defaults: Vec<String>) -> Vec<String> {
    if args.is_empty() { defaults } else { args }
}

/// Does `expression` reference any known meta-variable? With `strict`, is
/// it exactly one? The loose check is a substring heuristic: a name that
/// happens to occur inside another `{...}` token also matches.
fn references_metavar(expression: &str, ctx: &AutomationContext, strict: bool) -> bool {
    ctx.metavars.keys().any(|name| {
        let pattern = format!("{{{}}}", name);
        if strict {
            expression == pattern
        } else {
            expression.contains(&pattern)
        }
    })
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_target_tree() {
        let json = r#"[
            {"type": "target", "target": "each", "effects": [
                {"type": "attack", "hit": [{"type": "damage", "damage": "1d8+3"}], "miss": []}
            ]},
            {"type": "text", "text": "A stabbing attack."}
        ]"#;
        let effects: Vec<Effect> = serde_json::from_str(json).unwrap();
        assert_eq!(effects.len(), 2);
        match &effects[0] {
            Effect::Target(node) => {
                assert_eq!(
                    node.selector,
                    TargetSelector::Keyword(SelectorKeyword::Each)
                );
                assert_eq!(node.effects.len(), 1);
                match &node.effects[0] {
                    Effect::Attack(attack) => {
                        assert_eq!(attack.hit.len(), 1);
                        assert!(attack.attack_bonus.is_none());
                    }
                    _ => panic!("expected attack"),
                }
            }
            _ => panic!("expected target"),
        }
    }

    #[test]
    fn deserialize_numeric_selector() {
        let json = r#"{"type": "target", "target": 2, "effects": []}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        match effect {
            Effect::Target(node) => assert_eq!(node.selector, TargetSelector::Index(2)),
            _ => panic!("expected target"),
        }
    }

    #[test]
    fn deserialize_self_selector() {
        let json = r#"{"type": "target", "target": "self", "effects": []}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        match effect {
            Effect::Target(node) => {
                assert_eq!(
                    node.selector,
                    TargetSelector::Keyword(SelectorKeyword::Caster)
                );
            }
            _ => panic!("expected target"),
        }
    }

    #[test]
    fn deserialize_save_with_camel_case_fields() {
        let json = r#"{"type": "save", "stat": "dex", "dc": "{proficiency}+8",
            "fail": [{"type": "damage", "damage": "8d6[fire]", "higher": {"4": "1d6"}}],
            "success": []}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        match effect {
            Effect::Save(node) => {
                assert_eq!(node.stat, "dex");
                assert!(node.dc.is_some());
                match &node.fail[0] {
                    Effect::Damage(damage) => {
                        assert_eq!(
                            damage.higher.as_ref().unwrap().get("4").unwrap(),
                            "1d6"
                        );
                    }
                    _ => panic!("expected damage"),
                }
            }
            _ => panic!("expected save"),
        }
    }

    #[test]
    fn deserialize_ieffect_duration_forms() {
        let json = r#"{"type": "ieffect", "name": "Poisoned", "duration": 3, "effects": ""}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        match effect {
            Effect::IEffect(node) => assert_eq!(node.duration, DurationValue::Rounds(3)),
            _ => panic!("expected ieffect"),
        }

        let json =
            r#"{"type": "ieffect", "name": "Inspired", "duration": "1d4", "effects": "", "end": true}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        match effect {
            Effect::IEffect(node) => {
                assert_eq!(node.duration, DurationValue::Expr("1d4".to_string()));
                assert!(node.tick_on_end);
            }
            _ => panic!("expected ieffect"),
        }
    }

    #[test]
    fn deserialize_roll_and_temphp() {
        let json = r#"[
            {"type": "roll", "dice": "3d6", "name": "heal", "hidden": true},
            {"type": "temphp", "amount": "{heal}", "cantripScale": false}
        ]"#;
        let effects: Vec<Effect> = serde_json::from_str(json).unwrap();
        match &effects[0] {
            Effect::Roll(node) => {
                assert!(node.hidden);
                assert_eq!(node.name, "heal");
            }
            _ => panic!("expected roll"),
        }
        match &effects[1] {
            Effect::TempHp(node) => assert_eq!(node.amount, "{heal}"),
            _ => panic!("expected temphp"),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let json = r#"{"type": "heal", "amount": "2d4"}"#;
        assert!(serde_json::from_str::<Effect>(json).is_err());
    }

    #[test]
    fn meta_round_trips() {
        let json = r#"{"type": "text", "text": "hi", "meta": [
            {"type": "roll", "dice": "1d4", "name": "x"}
        ]}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        assert_eq!(effect.meta().unwrap().len(), 1);
        let serialized = serde_json::to_string(&effect).unwrap();
        let reparsed: Effect = serde_json::from_str(&serialized).unwrap();
        assert_eq!(reparsed.meta().unwrap().len(), 1);
    }

    #[test]
    fn kind_names_match_tags() {
        let json = r#"{"type": "temphp", "amount": "5"}"#;
        let effect: Effect = serde_json::from_str(json).unwrap();
        assert_eq!(effect.kind_name(), "TempHP");
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("sneak attack"), "Sneak Attack");
        assert_eq!(title_case("magnitude"), "Magnitude");
        assert_eq!(title_case("HEAL"), "Heal");
    }

    mod scoping {
        use super::super::*;
        use crate::args::Args;
        use crate::automation::RunOptions;
        use crate::automation::context::AutomationContext;
        use crate::test_utils::{FixedRoller, fixtures};

        #[test]
        fn target_pointer_is_cleared_after_a_run() {
            let effect: Effect = serde_json::from_str(
                r#"{"type": "target", "target": "self", "effects": [
                    {"type": "damage", "damage": "3"}
                ]}"#,
            )
            .unwrap();
            let mut world = hecs::World::new();
            let caster = fixtures::fighter(&mut world);
            let mut roller = FixedRoller::new([]);
            let mut ctx = AutomationContext::new(
                &mut world,
                caster,
                &[],
                Args::new(),
                &mut roller,
                RunOptions::default(),
            );

            effect.run(&mut ctx).unwrap();
            assert!(ctx.target.is_none());
        }

        #[test]
        fn target_pointer_is_cleared_when_a_child_fails() {
            let effect: Effect = serde_json::from_str(
                r#"{"type": "target", "target": "self", "effects": [
                    {"type": "save", "stat": "luck", "dc": "12", "fail": [], "success": []}
                ]}"#,
            )
            .unwrap();
            let mut world = hecs::World::new();
            let caster = fixtures::fighter(&mut world);
            let mut roller = FixedRoller::new([]);
            let mut ctx = AutomationContext::new(
                &mut world,
                caster,
                &[],
                Args::new(),
                &mut roller,
                RunOptions::default(),
            );

            assert!(effect.run(&mut ctx).is_err());
            assert!(ctx.target.is_none());
        }

        #[test]
        fn crit_flag_is_restored_when_the_hit_branch_fails() {
            let effect: Effect = serde_json::from_str(
                r#"{"type": "target", "target": "self", "effects": [
                    {"type": "attack", "attackBonus": "5", "hit": [
                        {"type": "damage", "damage": "not dice"}
                    ], "miss": []}
                ]}"#,
            )
            .unwrap();
            let mut world = hecs::World::new();
            let caster = fixtures::fighter(&mut world);
            let mut roller = FixedRoller::new([]);
            let args = Args::parse("-hit -crit");
            let mut ctx = AutomationContext::new(
                &mut world,
                caster,
                &[],
                args,
                &mut roller,
                RunOptions::default(),
            );

            assert!(effect.run(&mut ctx).is_err());
            assert!(!ctx.in_crit);
        }

        #[test]
        fn attack_total_is_the_sum_of_its_children() {
            let effect: Effect = serde_json::from_str(
                r#"{"type": "attack", "attackBonus": "5", "hit": [
                    {"type": "damage", "damage": "3"},
                    {"type": "damage", "damage": "4"}
                ], "miss": []}"#,
            )
            .unwrap();
            let mut world = hecs::World::new();
            let caster = fixtures::fighter(&mut world);
            let mut roller = FixedRoller::new([]);
            let args = Args::parse("-hit");
            let mut ctx = AutomationContext::new(
                &mut world,
                caster,
                &[],
                args,
                &mut roller,
                RunOptions::default(),
            );

            let total = effect.run(&mut ctx).unwrap();
            assert_eq!(total, Some(7));
        }
    }
}
