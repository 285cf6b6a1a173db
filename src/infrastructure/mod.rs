pub mod backends;
pub mod optimade;
pub mod plotting;
pub mod tools;
pub mod topas;
