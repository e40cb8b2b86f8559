pub mod flow;
pub mod providers;
pub mod state;

pub use providers::{Provider, ProviderRegistry};
pub use state::StateStore;
