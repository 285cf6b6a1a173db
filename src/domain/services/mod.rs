pub mod agent;
mod cif;
mod image_refs;
mod media_loader;
mod optimade_filter;
pub mod plot_layout;

pub use cif::*;
pub use image_refs::*;
pub use media_loader::*;
pub use optimade_filter::*;
