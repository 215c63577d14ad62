//! Cheese Maze - concurrent maze simulation of decision-driven mice

pub mod core;
pub mod decision;
pub mod entity;
pub mod persistence;
pub mod rules;
pub mod simulation;
pub mod world;
