//! ColorMagic — generate a coloring page from a prompt, paint over it, save the result.
//!
//! The library holds the two-surface canvas, stroke rendering, background
//! compositing, export, the generation client, the session state that ties
//! them together, and the egui widgets that draw them. The binary wires the
//! widgets into an eframe window.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod assets;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod project;

/// Edge length of both backing surfaces, in pixels.
pub const CANVAS_SIZE: u32 = 1024;
