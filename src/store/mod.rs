pub mod activity;
pub mod dynamic;
pub mod memory;
pub mod reflect;
pub mod traits;

pub use activity::*;
pub use dynamic::*;
pub use memory::*;
pub use traits::*;
