//! Domain types shared by the data and feed layers.

pub mod bar;

pub use bar::Bar;
