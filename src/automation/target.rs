use hecs::Entity;

use crate::components::ability::Ability;
use crate::components::combatant::{ArmorClass, Controller, Private};
use crate::components::resistances::Resistances;
use crate::systems::{combat, helpers};

use super::context::AutomationContext;
use super::{AutomationError, TargetRef};

/// Uniform view over one element of the target list: a combatant entity, a
/// bare name, or nothing at all. Simple targets (name or nothing) can be
/// narrated but not rolled against or damaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationTarget {
    pub target: Option<TargetRef>,
}

impl AutomationTarget {
    pub fn new(target: Option<TargetRef>) -> Self {
        Self { target }
    }

    pub fn is_simple(&self) -> bool {
        !matches!(self.target, Some(TargetRef::Combatant(_)))
    }

    pub fn entity(&self) -> Option<Entity> {
        match self.target {
            Some(TargetRef::Combatant(entity)) => Some(entity),
            _ => None,
        }
    }

    pub fn name(&self, ctx: &AutomationContext) -> String {
        match &self.target {
            Some(TargetRef::Simple(name)) => name.clone(),
            Some(TargetRef::Combatant(entity)) => combat::name(ctx.world, *entity),
            None => String::new(),
        }
    }

    pub fn ac(&self, ctx: &AutomationContext) -> Option<i32> {
        let entity = self.entity()?;
        helpers::try_component::<ArmorClass>(ctx.world, entity).map(|ac| ac.0)
    }

    pub fn resistances(&self, ctx: &AutomationContext) -> Resistances {
        self.entity()
            .and_then(|entity| helpers::try_component_clone::<Resistances>(ctx.world, entity))
            .unwrap_or_default()
    }

    /// Save dice for this target, or `Target` error when it has no defined
    /// saves.
    pub fn save_dice(
        &self,
        ctx: &AutomationContext,
        ability: Ability,
        adv: Option<bool>,
    ) -> Result<String, AutomationError> {
        self.entity()
            .and_then(|entity| combat::save_dice(ctx.world, entity, ability, adv))
            .ok_or_else(|| {
                AutomationError::Target("Target does not have defined saves.".to_string())
            })
    }

    /// Applies damage to the target: mutates HP, queues the footer line,
    /// PMs exact HP to the controller of a private combatant, and raises a
    /// concentration check when a concentrating combatant loses HP.
    pub fn damage(&self, ctx: &mut AutomationContext, amount: i32) {
        let Some(entity) = self.entity() else {
            return;
        };
        let name = combat::name(ctx.world, entity);
        if combat::modify_hp(ctx.world, entity, -amount, false) {
            if let Some(hp) = combat::hp_string(ctx.world, entity, false) {
                ctx.footer_queue(format!("{}: {}", name, hp));
            }
            let is_private = helpers::has_component::<Private>(ctx.world, entity);
            if is_private {
                if let Some(controller) =
                    helpers::try_component_clone::<Controller>(ctx.world, entity)
                {
                    let hp = combat::hp_string(ctx.world, entity, true).unwrap_or_default();
                    ctx.add_pm(controller.0, format!("{}'s HP: {}", name, hp));
                }
            }
        } else {
            ctx.footer_queue(format!("Dealt {} damage to {}!", amount, name));
        }
        if combat::is_concentrating(ctx.world, entity) && amount > 0 {
            let dc = ((amount + 1) / 2).max(10);
            ctx.queue(format!("**Concentration**: DC {}", dc));
        }
    }
}
