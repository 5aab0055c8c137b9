use hashlink::LinkedHashSet;
use rustc_hash::FxHashMap;
use strata_common::{BlockId, ChunkGroupId, ChunkId, DependencyLocation, ModuleId};

/// Options attached to an async boundary and shared by every boundary that
/// resolves to the same named group.
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
  /// Explicit name. Boundaries with the same name resolve to one group.
  pub name: Option<String>,
  pub preload_order: Option<i32>,
  pub prefetch_order: Option<i32>,
  /// Marks the boundary as an async entrypoint instead of an ordinary
  /// dynamic chunk.
  pub entry_options: Option<EntryOptions>,
}

impl GroupOptions {
  pub fn with_name(name: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      ..Default::default()
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct EntryOptions {
  pub name: Option<String>,
  /// Runtime this entry executes under. Defaults to the entry name.
  pub runtime: Option<String>,
  /// Names of entrypoints guaranteed to be loaded before this one.
  pub depend_on: Option<Vec<String>>,
  /// `Some(false)` forbids creating new async chunks below this entry;
  /// async boundaries degrade to synchronous inclusion.
  pub async_chunks: Option<bool>,
  /// `Some(false)` disables on-demand loading below this entry entirely.
  pub chunk_loading: Option<bool>,
}

/// Where a chunk group was requested from; kept for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct OriginRecord {
  pub module: Option<ModuleId>,
  pub loc: Option<DependencyLocation>,
}

#[derive(Debug)]
pub enum ChunkGroupKind {
  /// A group loaded as an application start: an initial entrypoint from the
  /// build configuration, or an async entrypoint spawned at a boundary.
  Entrypoint {
    initial: bool,
    options: EntryOptions,
  },
  /// An ordinary dynamic-load site.
  Normal { options: GroupOptions },
}

/// An ordered collection of chunks forming one loadable unit (an entrypoint
/// or one dynamic-load site), linked to other groups as parent/child.
#[derive(Debug)]
pub struct ChunkGroup {
  pub(crate) id: ChunkGroupId,
  /// Stable creation-order index, assigned exactly once.
  pub(crate) index: u32,
  pub(crate) kind: ChunkGroupKind,
  pub(crate) chunks: Vec<ChunkId>,
  pub(crate) parents: LinkedHashSet<ChunkGroupId>,
  pub(crate) children: LinkedHashSet<ChunkGroupId>,
  /// Async entrypoints spawned from boundaries inside this group. These are
  /// not children: they start their own runtime.
  pub(crate) async_entrypoints: LinkedHashSet<ChunkGroupId>,
  /// Async boundaries that load this group.
  pub(crate) blocks: Vec<BlockId>,
  pub(crate) origins: Vec<OriginRecord>,
  pub(crate) module_pre_order_indices: FxHashMap<ModuleId, u32>,
  pub(crate) module_post_order_indices: FxHashMap<ModuleId, u32>,
  pub(crate) removed: bool,
}

impl ChunkGroup {
  pub(crate) fn new(id: ChunkGroupId, index: u32, kind: ChunkGroupKind) -> Self {
    Self {
      id,
      index,
      kind,
      chunks: vec![],
      parents: Default::default(),
      children: Default::default(),
      async_entrypoints: Default::default(),
      blocks: vec![],
      origins: vec![],
      module_pre_order_indices: Default::default(),
      module_post_order_indices: Default::default(),
      removed: false,
    }
  }

  pub fn id(&self) -> ChunkGroupId {
    self.id
  }

  pub fn index(&self) -> u32 {
    self.index
  }

  pub fn name(&self) -> Option<&str> {
    match &self.kind {
      ChunkGroupKind::Entrypoint { options, .. } => options.name.as_deref(),
      ChunkGroupKind::Normal { options } => options.name.as_deref(),
    }
  }

  pub fn is_entrypoint(&self) -> bool {
    matches!(self.kind, ChunkGroupKind::Entrypoint { .. })
  }

  /// Whether this group is part of the initial (synchronous) load.
  pub fn is_initial(&self) -> bool {
    matches!(self.kind, ChunkGroupKind::Entrypoint { initial: true, .. })
  }

  pub fn entry_options(&self) -> Option<&EntryOptions> {
    match &self.kind {
      ChunkGroupKind::Entrypoint { options, .. } => Some(options),
      ChunkGroupKind::Normal { .. } => None,
    }
  }

  pub fn group_options(&self) -> Option<&GroupOptions> {
    match &self.kind {
      ChunkGroupKind::Entrypoint { .. } => None,
      ChunkGroupKind::Normal { options } => Some(options),
    }
  }

  pub fn chunks(&self) -> &[ChunkId] {
    &self.chunks
  }

  /// The chunk traversal binds modules to; always the first one.
  pub fn entry_chunk(&self) -> ChunkId {
    self.chunks[0]
  }

  pub fn parents(&self) -> impl Iterator<Item = ChunkGroupId> + '_ {
    self.parents.iter().copied()
  }

  pub fn children(&self) -> impl Iterator<Item = ChunkGroupId> + '_ {
    self.children.iter().copied()
  }

  pub fn async_entrypoints(&self) -> impl Iterator<Item = ChunkGroupId> + '_ {
    self.async_entrypoints.iter().copied()
  }

  pub fn blocks(&self) -> &[BlockId] {
    &self.blocks
  }

  pub fn origins(&self) -> &[OriginRecord] {
    &self.origins
  }

  pub(crate) fn add_origin(&mut self, module: Option<ModuleId>, loc: Option<DependencyLocation>) {
    self.origins.push(OriginRecord { module, loc });
  }

  /// Merges the options of another boundary resolving to this group. Names
  /// are equal by construction (boundaries are matched up by name);
  /// conflicting load-order hints resolve to the strongest request.
  pub(crate) fn add_options(&mut self, options: &GroupOptions) {
    if let ChunkGroupKind::Normal { options: existing } = &mut self.kind {
      debug_assert_eq!(existing.name, options.name);
      existing.preload_order = max_order(existing.preload_order, options.preload_order);
      existing.prefetch_order = max_order(existing.prefetch_order, options.prefetch_order);
    }
  }

  pub fn module_pre_order_index(&self, module: ModuleId) -> Option<u32> {
    self.module_pre_order_indices.get(&module).copied()
  }

  pub fn module_post_order_index(&self, module: ModuleId) -> Option<u32> {
    self.module_post_order_indices.get(&module).copied()
  }
}

fn max_order(a: Option<i32>, b: Option<i32>) -> Option<i32> {
  match (a, b) {
    (Some(a), Some(b)) => Some(a.max(b)),
    (a, None) => a,
    (None, b) => b,
  }
}
