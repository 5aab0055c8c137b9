use hashlink::LinkedHashSet;
use strata_common::{ChunkGroupId, ChunkId, RuntimeSpec};

/// A set of modules destined to become one compiled output artifact.
///
/// Module membership is recorded in [`crate::ChunkGraph`] as a
/// bidirectional association, not here, so a module can belong to many
/// chunks without duplicating storage.
#[derive(Debug)]
pub struct Chunk {
  pub(crate) id: ChunkId,
  pub(crate) name: Option<String>,
  /// Merged from every chunk group containing this chunk once the fixed
  /// point is reached.
  pub(crate) runtime: RuntimeSpec,
  pub(crate) groups: LinkedHashSet<ChunkGroupId>,
  pub(crate) removed: bool,
}

impl Chunk {
  pub(crate) fn new(id: ChunkId, name: Option<String>) -> Self {
    Self {
      id,
      name,
      runtime: Default::default(),
      groups: Default::default(),
      removed: false,
    }
  }

  pub fn id(&self) -> ChunkId {
    self.id
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn runtime(&self) -> &RuntimeSpec {
    &self.runtime
  }

  pub fn groups(&self) -> impl Iterator<Item = ChunkGroupId> + '_ {
    self.groups.iter().copied()
  }
}
