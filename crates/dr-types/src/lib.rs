pub mod context;
pub mod errors;
pub mod method;
pub mod mode;
pub mod mounts;
pub mod params;
pub mod resources;

pub use context::*;
pub use errors::*;
pub use method::*;
pub use mode::*;
pub use mounts::*;
pub use params::*;
pub use resources::*;
