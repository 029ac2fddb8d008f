pub mod formatters;

pub use formatters::{format_file_size, format_percent, truncate_name};
