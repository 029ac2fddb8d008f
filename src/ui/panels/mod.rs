pub mod embed;
pub mod extract;
pub mod logs;
pub mod verify;
