mod config;
mod interface;
mod layout;
mod machine;
mod snowflake;

pub use config::*;
pub use interface::*;
pub use layout::*;
pub use machine::*;
pub use snowflake::*;
