mod collection_config;
mod document;
mod naming;
mod remote_effect;
mod schema;
#[cfg(feature = "testing")]
pub mod strategies;

pub use collection_config::*;
pub use document::*;
pub use naming::*;
pub use remote_effect::*;
pub use schema::*;
