pub mod expr;
pub mod rewrite;
pub mod roll;

pub use expr::{DiceError, DiceExpr, DiceGroup, Keep, Scale, Sign, Term, TermKind};
pub use roll::{
    DieRoller, RandRoller, RollCrit, RollResult, RolledDie, RolledGroup, RolledTerm, roll,
};
