mod movement;

pub use movement::{apply_input, MOVE_SPEED};
