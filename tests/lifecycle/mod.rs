//! Lifecycle scenarios driven through the scripted inventory.

mod bdd_steps;
mod scenarios;
mod test_helpers;
