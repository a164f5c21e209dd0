pub mod bearish;
pub mod verify;
