/// Arena-index handles. Every graph node is referenced through one of these
/// instead of through pointers, so traversals of arbitrarily deep graphs
/// never build up recursive ownership. An id is only meaningful together
/// with the graph that issued it.
macro_rules! arena_id {
  ($(#[$doc:meta])* $name:ident) => {
    $(#[$doc])*
    #[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
    pub struct $name(u32);

    impl $name {
      pub fn new(index: usize) -> Self {
        Self(index as u32)
      }

      pub fn index(self) -> usize {
        self.0 as usize
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

arena_id! {
  /// Identity of an externally owned module node.
  ModuleId
}

arena_id! {
  /// Identity of a dependency, the edge descriptor owned by its origin
  /// module.
  DependencyId
}

arena_id! {
  /// Identity of a resolved connection (origin module, dependency, target
  /// module).
  ConnectionId
}

arena_id! {
  /// Identity of a dependencies block: a module's root block or a nested
  /// async boundary.
  BlockId
}

arena_id! {
  /// Identity of a chunk.
  ChunkId
}

arena_id! {
  /// Identity of a chunk group.
  ChunkGroupId
}
