mod client;
mod database;
mod error;
mod export;

pub use client::*;
pub use database::*;
pub use error::*;
pub use export::*;
