mod channel;
mod reading;
mod snapshot;
mod verdict;

pub use channel::*;
pub use reading::*;
pub use snapshot::*;
pub use verdict::*;
