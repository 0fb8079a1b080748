pub mod agent;
pub mod stage;
pub mod workflow;

pub use agent::*;
pub use stage::*;
pub use workflow::*;
