pub mod market;
pub mod scan;
pub mod signals;

pub use market::*;
pub use scan::*;
pub use signals::*;
