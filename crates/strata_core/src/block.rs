use strata_common::{BlockId, DependencyId, DependencyLocation, ModuleId};

use crate::GroupOptions;

/// A grouping of dependencies belonging to one owner: either a module (its
/// root block) or a nested async boundary within that module.
#[derive(Debug)]
pub struct Block {
  owner: ModuleId,
  kind: BlockKind,
  pub(crate) dependencies: Vec<DependencyId>,
  /// Nested async boundaries, in declaration order.
  pub(crate) blocks: Vec<BlockId>,
}

#[derive(Debug)]
enum BlockKind {
  /// A module's direct dependencies.
  Root,
  /// An async boundary: loading may be deferred here, potentially creating
  /// a new chunk.
  Async {
    parent: BlockId,
    options: GroupOptions,
    loc: Option<DependencyLocation>,
  },
}

impl Block {
  pub(crate) fn root(owner: ModuleId) -> Self {
    Self {
      owner,
      kind: BlockKind::Root,
      dependencies: vec![],
      blocks: vec![],
    }
  }

  pub(crate) fn asynchronous(
    owner: ModuleId,
    parent: BlockId,
    options: GroupOptions,
    loc: Option<DependencyLocation>,
  ) -> Self {
    Self {
      owner,
      kind: BlockKind::Async {
        parent,
        options,
        loc,
      },
      dependencies: vec![],
      blocks: vec![],
    }
  }

  pub fn owner(&self) -> ModuleId {
    self.owner
  }

  pub fn is_async(&self) -> bool {
    matches!(self.kind, BlockKind::Async { .. })
  }

  pub fn parent(&self) -> Option<BlockId> {
    match &self.kind {
      BlockKind::Root => None,
      BlockKind::Async { parent, .. } => Some(*parent),
    }
  }

  pub fn group_options(&self) -> Option<&GroupOptions> {
    match &self.kind {
      BlockKind::Root => None,
      BlockKind::Async { options, .. } => Some(options),
    }
  }

  pub fn loc(&self) -> Option<DependencyLocation> {
    match &self.kind {
      BlockKind::Root => None,
      BlockKind::Async { loc, .. } => *loc,
    }
  }

  pub fn dependencies(&self) -> &[DependencyId] {
    &self.dependencies
  }

  pub fn blocks(&self) -> &[BlockId] {
    &self.blocks
  }
}
