mod author;
mod backend;
mod chat_command;
mod conversation;
mod media;
mod message;
mod pattern;
mod refinement;
mod structure;
mod tool;

pub use author::*;
pub use backend::*;
pub use chat_command::*;
pub use conversation::*;
pub use media::*;
pub use message::*;
pub use pattern::*;
pub use refinement::*;
pub use structure::*;
pub use tool::*;
