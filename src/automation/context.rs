use std::collections::HashMap;

use hecs::{Entity, World};
use uuid::Uuid;

use crate::args::Args;
use crate::components::combatant::CharacterSheet;
use crate::components::spellcasting::{SpellInfo, Spellbook};
use crate::dice::{self, DieRoller, RollResult, rewrite};
use crate::eval::Evaluator;
use crate::report::{Embed, EmbedField, Report};
use crate::systems::{combat, helpers};

use super::target::AutomationTarget;
use super::{AutomationError, RunOptions, TargetRef};

/// Per-run scratchpad. Created by `Automation::run`, threaded through every
/// effect, discarded once the report is built.
pub struct AutomationContext<'a> {
    pub world: &'a mut World,
    pub caster: Entity,
    pub targets: Vec<Option<TargetRef>>,
    pub args: Args,
    pub spell: Option<SpellInfo>,
    pub conc_parent: Option<(Entity, Uuid)>,
    pub ab_override: Option<i32>,
    pub dc_override: Option<i32>,
    pub title: Option<String>,

    /// Rebound by `Target` effects while their children run.
    pub target: Option<AutomationTarget>,
    pub in_crit: bool,
    pub metavars: HashMap<String, String>,

    roller: &'a mut dyn DieRoller,
    evaluator: Evaluator,
    embed_queue: Vec<String>,
    meta_queue: Vec<String>,
    effect_queue: Vec<String>,
    field_queue: Vec<EmbedField>,
    footer_queue: Vec<String>,
    pm_queue: HashMap<String, Vec<String>>,
}

impl<'a> AutomationContext<'a> {
    pub fn new(
        world: &'a mut World,
        caster: Entity,
        targets: &[TargetRef],
        args: Args,
        roller: &'a mut dyn DieRoller,
        options: RunOptions,
    ) -> Self {
        // no targets still yields one generic iteration
        let targets = if targets.is_empty() {
            vec![None]
        } else {
            targets.iter().cloned().map(Some).collect()
        };
        Self {
            world,
            caster,
            targets,
            args,
            spell: options.spell,
            conc_parent: options.conc_parent,
            ab_override: options.ab_override,
            dc_override: options.dc_override,
            title: options.title,
            target: None,
            in_crit: false,
            metavars: HashMap::new(),
            roller,
            evaluator: Evaluator::new(),
            embed_queue: Vec::new(),
            meta_queue: Vec::new(),
            effect_queue: Vec::new(),
            field_queue: Vec::new(),
            footer_queue: Vec::new(),
            pm_queue: HashMap::new(),
        }
    }

    pub fn is_spell(&self) -> bool {
        self.spell.is_some()
    }

    /// Appends to the current section buffer. Duplicates are allowed here.
    pub fn queue(&mut self, text: impl Into<String>) {
        self.embed_queue.push(text.into());
    }

    /// Appends to the meta section, deduplicated.
    pub fn meta_queue(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !self.meta_queue.contains(&text) {
            self.meta_queue.push(text);
        }
    }

    /// Appends to the effect section, deduplicated.
    pub fn effect_queue(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !self.effect_queue.contains(&text) {
            self.effect_queue.push(text);
        }
    }

    pub fn footer_queue(&mut self, text: impl Into<String>) {
        self.footer_queue.push(text.into());
    }

    /// Flushes the section buffer as a named field. Empty buffer is a
    /// no-op.
    pub fn push_embed_field(&mut self, name: impl Into<String>, inline: bool) {
        if self.embed_queue.is_empty() {
            return;
        }
        let value = self.embed_queue.join("\n");
        self.embed_queue.clear();
        self.field_queue.push(EmbedField {
            name: name.into(),
            value,
            inline,
        });
    }

    /// Flushes the section buffer into the meta section instead.
    pub fn flush_to_meta(&mut self) {
        self.meta_queue.append(&mut self.embed_queue);
    }

    /// Moves accumulated meta lines into a `Meta` field at the head of the
    /// report.
    pub fn insert_meta_field(&mut self) {
        if self.meta_queue.is_empty() {
            return;
        }
        let value = self.meta_queue.join("\n");
        self.meta_queue.clear();
        self.field_queue.insert(
            0,
            EmbedField {
                name: "Meta".to_string(),
                value,
                inline: false,
            },
        );
    }

    pub fn add_pm(&mut self, user: impl Into<String>, message: impl Into<String>) {
        self.pm_queue
            .entry(user.into())
            .or_default()
            .push(message.into());
    }

    /// Substitutes `{...}` chunks through the expression evaluator with the
    /// meta-variables bound.
    pub fn parse_annostr(&self, input: &str) -> Result<String, AutomationError> {
        Ok(self.evaluator.parse(input, &self.metavars)?)
    }

    /// Rewrites die counts for cantrip scaling. Not a spell: unchanged.
    pub fn cantrip_scale(&self, dice: &str) -> String {
        if !self.is_spell() {
            return dice.to_string();
        }
        let caster_level = helpers::try_component::<Spellbook>(self.world, self.caster)
            .map(|sb| sb.caster_level)
            .unwrap_or(0);
        rewrite::scale_cantrip(dice, caster_level)
    }

    /// The level this action is being cast at: `-l` override, else the
    /// spell's base level, else 0.
    pub fn cast_level(&self) -> u8 {
        match &self.spell {
            Some(spell) => self.args.last::<u8>("l").unwrap_or(spell.level),
            None => 0,
        }
    }

    pub fn character_sheet(&self) -> Option<CharacterSheet> {
        helpers::try_component_clone::<CharacterSheet>(self.world, self.caster)
    }

    pub fn spell_attack_bonus(&self) -> Option<i32> {
        helpers::try_component::<Spellbook>(self.world, self.caster)
            .and_then(|sb| sb.spell_attack_bonus)
    }

    pub fn spell_dc(&self) -> Option<i32> {
        helpers::try_component::<Spellbook>(self.world, self.caster).and_then(|sb| sb.spell_dc)
    }

    /// `-{key}` riders from the caster's own attached effects.
    pub fn caster_effect_values(&self, key: &str) -> Vec<String> {
        combat::active_effect_values(self.world, self.caster, key)
    }

    pub fn roll(&mut self, expression: &str, label: &str) -> Result<RollResult, AutomationError> {
        Ok(dice::roll(expression, label, &mut *self.roller)?)
    }

    /// The target currently bound by the enclosing `Target` effect.
    pub fn current_target(&self) -> AutomationTarget {
        self.target.clone().unwrap_or(AutomationTarget {
            target: None,
        })
    }

    pub fn into_report(mut self) -> Report {
        let mut embed = Embed::new();
        embed.title = self.title.clone();

        if let Some(phrase) = self.args.join("phrase", "\n") {
            embed.description = Some(format!("*{}*", phrase));
        }

        // anything left unflushed joins the meta section
        for text in std::mem::take(&mut self.embed_queue) {
            if !self.meta_queue.contains(&text) {
                self.meta_queue.push(text);
            }
        }
        self.insert_meta_field();

        embed.fields = std::mem::take(&mut self.field_queue);
        for effect in std::mem::take(&mut self.effect_queue) {
            embed.add_field("Effect", effect, false);
        }
        if !self.footer_queue.is_empty() {
            embed.footer = Some(self.footer_queue.join("\n"));
        }

        Report {
            embed,
            pm_queue: std::mem::take(&mut self.pm_queue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FixedRoller;

    fn context<'a>(
        world: &'a mut World,
        caster: Entity,
        roller: &'a mut dyn DieRoller,
    ) -> AutomationContext<'a> {
        AutomationContext::new(world, caster, &[], Args::new(), roller, RunOptions::default())
    }

    #[test]
    fn empty_target_list_yields_one_generic_target() {
        let mut world = World::new();
        let caster = world.spawn((crate::components::combatant::Name("Mage".to_string()),));
        let mut roller = FixedRoller::new([]);
        let ctx = context(&mut world, caster, &mut roller);
        assert_eq!(ctx.targets, vec![None]);
    }

    #[test]
    fn meta_queue_deduplicates() {
        let mut world = World::new();
        let caster = world.spawn(());
        let mut roller = FixedRoller::new([]);
        let mut ctx = context(&mut world, caster, &mut roller);
        ctx.meta_queue("**DC**: 15");
        ctx.meta_queue("**DC**: 15");
        ctx.queue("a line");
        ctx.queue("a line");
        let report = ctx.into_report();
        assert_eq!(report.embed.fields[0].name, "Meta");
        assert_eq!(report.embed.fields[0].value, "**DC**: 15\na line");
    }

    #[test]
    fn push_embed_field_flushes_buffer() {
        let mut world = World::new();
        let caster = world.spawn(());
        let mut roller = FixedRoller::new([]);
        let mut ctx = context(&mut world, caster, &mut roller);
        ctx.queue("one");
        ctx.queue("two");
        ctx.push_embed_field("Orc", false);
        ctx.push_embed_field("Empty", false);
        let report = ctx.into_report();
        assert_eq!(report.embed.fields.len(), 1);
        assert_eq!(report.embed.fields[0].name, "Orc");
        assert_eq!(report.embed.fields[0].value, "one\ntwo");
    }

    #[test]
    fn meta_field_is_inserted_first() {
        let mut world = World::new();
        let caster = world.spawn(());
        let mut roller = FixedRoller::new([]);
        let mut ctx = context(&mut world, caster, &mut roller);
        ctx.queue("damage line");
        ctx.push_embed_field("Orc", false);
        ctx.meta_queue("**DC**: 13");
        let report = ctx.into_report();
        assert_eq!(report.embed.fields[0].name, "Meta");
        assert_eq!(report.embed.fields[1].name, "Orc");
    }

    #[test]
    fn phrase_becomes_italic_description() {
        let mut world = World::new();
        let caster = world.spawn(());
        let mut roller = FixedRoller::new([]);
        let args = Args::parse("-phrase \"flames erupt\"");
        let ctx = AutomationContext::new(
            &mut world,
            caster,
            &[],
            args,
            &mut roller,
            RunOptions::default(),
        );
        let report = ctx.into_report();
        assert_eq!(report.embed.description.as_deref(), Some("*flames erupt*"));
    }

    #[test]
    fn cast_level_prefers_argument() {
        let mut world = World::new();
        let caster = world.spawn(());
        let mut roller = FixedRoller::new([]);
        let args = Args::parse("-l 5");
        let options = RunOptions {
            spell: Some(SpellInfo::new("Fireball", 3)),
            ..RunOptions::default()
        };
        let ctx = AutomationContext::new(&mut world, caster, &[], args, &mut roller, options);
        assert_eq!(ctx.cast_level(), 5);
    }

    #[test]
    fn cast_level_without_spell_is_zero() {
        let mut world = World::new();
        let caster = world.spawn(());
        let mut roller = FixedRoller::new([]);
        let ctx = context(&mut world, caster, &mut roller);
        assert_eq!(ctx.cast_level(), 0);
    }

    #[test]
    fn cantrip_scale_only_applies_to_spells() {
        let mut world = World::new();
        let caster = world.spawn((Spellbook::new(6, 14, 7),));
        let mut roller = FixedRoller::new([]);
        let ctx = context(&mut world, caster, &mut roller);
        assert_eq!(ctx.cantrip_scale("1d10"), "1d10");

        let mut roller = FixedRoller::new([]);
        let options = RunOptions {
            spell: Some(SpellInfo::new("Fire Bolt", 0)),
            ..RunOptions::default()
        };
        let ctx =
            AutomationContext::new(&mut world, caster, &[], Args::new(), &mut roller, options);
        assert_eq!(ctx.cantrip_scale("1d10"), "2d10");
    }
}
