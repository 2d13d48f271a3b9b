pub mod build;
pub mod bundlers;
pub mod discover;
pub mod init;
pub mod slice;
pub mod summarize;
pub mod util;

pub use build::*;
pub use bundlers::*;
pub use discover::*;
pub use init::*;
pub use slice::*;
pub use summarize::*;
pub use util::*;
