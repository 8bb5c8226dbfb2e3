mod cache;
mod vars;

pub use cache::MemCache;
pub use vars::Vars;
