#![doc = include_str!("../README.md")]

mod error;
mod generator;
mod ratelimit;
mod time;

pub use crate::error::*;
pub use crate::generator::*;
pub use crate::ratelimit::*;
pub use crate::time::*;
