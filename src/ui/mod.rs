pub mod executer;
pub mod helpers;
pub mod notify;
pub mod panels;
pub mod traits;

pub use executer::run;
