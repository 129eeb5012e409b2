mod bind;
mod executor;
pub mod normalize;
mod options;

pub use bind::{format_bind_parameters, Parameters};
pub use executor::{QueryExecutor, QueryState};
pub use options::{QueryOptions, QueryType};
