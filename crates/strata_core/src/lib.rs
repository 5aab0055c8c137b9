mod block;
pub use block::*;
mod block_modules;
pub(crate) use block_modules::*;
mod build_chunk_graph;
pub use build_chunk_graph::*;
mod chunk;
pub use chunk::*;
mod chunk_graph;
pub use chunk_graph::*;
mod chunk_group;
pub use chunk_group::*;
mod module_graph;
pub use module_graph::*;

// public exports

pub type BuildResult<T> = strata_error::Result<T>;
pub type BuildError = strata_error::Error;
