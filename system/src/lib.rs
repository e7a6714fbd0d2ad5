pub extern crate bincode;
pub extern crate serde;
pub extern crate uuid;

mod message;
mod palette;
mod replay;
mod types;

pub use message::*;
pub use palette::cursor_color;
pub use replay::{compact, visible_strokes};
pub use types::*;
