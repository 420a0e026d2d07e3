mod root;
pub use root::{parse, Command, GuardianCommand};

pub mod hash;
pub mod server;
