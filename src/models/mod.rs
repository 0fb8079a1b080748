pub mod feedback;
pub mod question;
pub mod version;

pub use feedback::*;
pub use question::*;
pub use version::*;
