//! NeoCalc: a terminal calculator with a keypad, a model-backed solver for
//! word problems and a photo solver for handwritten ones.

pub mod action;
pub mod app;
pub mod camera;
pub mod command;
pub mod config;
pub mod error;
pub mod expr;
pub mod image_input;
pub mod keypad;
pub mod solver;
pub mod types;
pub mod ui;
pub mod ui_state;
pub mod visualizer;
