pub mod config;
pub mod engine;
pub mod player;
pub mod renderer;
pub mod types;
pub mod view;

mod menubar;
