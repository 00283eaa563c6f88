mod bucket;
mod limiter;
mod pacer;
mod rule;

pub use bucket::*;
pub use limiter::*;
pub use pacer::*;
pub use rule::*;
