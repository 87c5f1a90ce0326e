pub mod delay;
pub mod export;
pub mod info;
pub mod play;
pub mod reset;
