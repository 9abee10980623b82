pub mod providers;
pub mod serializer;

pub use providers::{ContextProvider, EnvironmentProvider, StaticProvider};
pub use serializer::{BasicSerializer, Serializer};
