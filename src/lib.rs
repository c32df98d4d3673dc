extern crate rand;
extern crate rstest;
extern crate strum;
extern crate uuid;

pub mod args;
pub mod automation;
pub mod components;
pub mod dice;
pub mod eval;
pub mod report;
pub mod systems;
pub mod test_utils;
