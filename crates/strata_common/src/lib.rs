mod ids;
pub use ids::*;
mod runtime;
pub use runtime::*;
mod active_state;
pub use active_state::*;
mod location;
pub use location::*;
