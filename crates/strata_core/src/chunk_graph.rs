use hashlink::LinkedHashSet;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_common::{BlockId, ChunkGroupId, ChunkId, ModuleId};
use strata_error::Error;

use crate::{Chunk, ChunkGroup, ChunkGroupKind};

/// The chunk ↔ module structure produced by [`crate::build_chunk_graph`].
///
/// Mutated only while the builder runs; once the fixed point is reached it
/// is read-only input for the downstream id-assignment, optimization and
/// code-generation stages.
#[derive(Debug, Default)]
pub struct ChunkGraph {
  pub(crate) chunks: Vec<Chunk>,
  pub(crate) chunk_groups: Vec<ChunkGroup>,
  /// Parallel to `chunks`. The order is only to make the output stable.
  chunk_modules: Vec<LinkedHashSet<ModuleId>>,
  module_chunks: FxHashMap<ModuleId, LinkedHashSet<ChunkId>>,
  /// Modules that bootstrap a chunk, with the entrypoint they belong to.
  chunk_entry_modules: FxHashMap<ChunkId, Vec<(ModuleId, ChunkGroupId)>>,
  named_chunk_groups: FxHashMap<String, ChunkGroupId>,
  block_chunk_groups: FxHashMap<BlockId, ChunkGroupId>,
  module_pre_order_indices: FxHashMap<ModuleId, u32>,
  module_post_order_indices: FxHashMap<ModuleId, u32>,
  /// Non-fatal problems recorded during construction.
  pub diagnostics: Vec<Error>,
}

impl ChunkGraph {
  pub(crate) fn add_chunk(&mut self, name: Option<String>) -> ChunkId {
    let id = ChunkId::new(self.chunks.len());
    self.chunks.push(Chunk::new(id, name));
    self.chunk_modules.push(Default::default());
    id
  }

  pub(crate) fn add_chunk_group(&mut self, kind: ChunkGroupKind) -> ChunkGroupId {
    let id = ChunkGroupId::new(self.chunk_groups.len());
    let index = self.chunk_groups.len() as u32;
    let group = ChunkGroup::new(id, index, kind);
    if let Some(name) = group.name() {
      self.named_chunk_groups.insert(name.to_string(), id);
    }
    self.chunk_groups.push(group);
    id
  }

  pub fn chunk(&self, id: ChunkId) -> &Chunk {
    &self.chunks[id.index()]
  }

  pub(crate) fn chunk_mut(&mut self, id: ChunkId) -> &mut Chunk {
    &mut self.chunks[id.index()]
  }

  pub fn chunk_group(&self, id: ChunkGroupId) -> &ChunkGroup {
    &self.chunk_groups[id.index()]
  }

  pub(crate) fn chunk_group_mut(&mut self, id: ChunkGroupId) -> &mut ChunkGroup {
    &mut self.chunk_groups[id.index()]
  }

  /// Live chunks, in creation order.
  pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
    self.chunks.iter().filter(|chunk| !chunk.removed)
  }

  /// Live chunk groups, in creation order.
  pub fn chunk_groups(&self) -> impl Iterator<Item = &ChunkGroup> {
    self.chunk_groups.iter().filter(|group| !group.removed)
  }

  pub fn chunk_group_by_name(&self, name: &str) -> Option<ChunkGroupId> {
    self.named_chunk_groups.get(name).copied()
  }

  pub(crate) fn connect_chunk_and_group(&mut self, chunk: ChunkId, group: ChunkGroupId) {
    self.chunks[chunk.index()].groups.insert(group);
    let group = &mut self.chunk_groups[group.index()];
    if !group.chunks.contains(&chunk) {
      group.chunks.push(chunk);
    }
  }

  pub(crate) fn connect_chunk_and_module(&mut self, chunk: ChunkId, module: ModuleId) {
    self.chunk_modules[chunk.index()].insert(module);
    self.module_chunks.entry(module).or_default().insert(chunk);
  }

  pub(crate) fn connect_chunk_and_entry_module(
    &mut self,
    chunk: ChunkId,
    module: ModuleId,
    group: ChunkGroupId,
  ) {
    let entries = self.chunk_entry_modules.entry(chunk).or_default();
    if !entries.iter().any(|(m, _)| *m == module) {
      entries.push((module, group));
    }
  }

  pub(crate) fn connect_block_and_chunk_group(&mut self, block: BlockId, group: ChunkGroupId) {
    if self.block_chunk_groups.insert(block, group).is_none() {
      self.chunk_groups[group.index()].blocks.push(block);
    }
  }

  pub fn is_module_in_chunk(&self, module: ModuleId, chunk: ChunkId) -> bool {
    self.chunk_modules[chunk.index()].contains(&module)
  }

  /// Modules of `chunk` in the order they were bound to it.
  pub fn chunk_modules(&self, chunk: ChunkId) -> impl Iterator<Item = ModuleId> + '_ {
    self.chunk_modules[chunk.index()].iter().copied()
  }

  pub fn num_chunk_modules(&self, chunk: ChunkId) -> usize {
    self.chunk_modules[chunk.index()].len()
  }

  pub fn chunks_of_module(&self, module: ModuleId) -> impl Iterator<Item = ChunkId> + '_ {
    self
      .module_chunks
      .get(&module)
      .into_iter()
      .flat_map(|chunks| chunks.iter().copied())
  }

  pub fn chunk_entry_modules(&self, chunk: ChunkId) -> &[(ModuleId, ChunkGroupId)] {
    self
      .chunk_entry_modules
      .get(&chunk)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// The chunk group an async boundary loads, if any survived construction.
  pub fn chunk_group_for_block(&self, block: BlockId) -> Option<ChunkGroupId> {
    self.block_chunk_groups.get(&block).copied()
  }

  pub(crate) fn set_module_pre_order_index_if_unset(
    &mut self,
    module: ModuleId,
    index: u32,
  ) -> bool {
    match self.module_pre_order_indices.entry(module) {
      std::collections::hash_map::Entry::Vacant(entry) => {
        entry.insert(index);
        true
      }
      std::collections::hash_map::Entry::Occupied(_) => false,
    }
  }

  pub(crate) fn set_module_post_order_index_if_unset(
    &mut self,
    module: ModuleId,
    index: u32,
  ) -> bool {
    match self.module_post_order_indices.entry(module) {
      std::collections::hash_map::Entry::Vacant(entry) => {
        entry.insert(index);
        true
      }
      std::collections::hash_map::Entry::Occupied(_) => false,
    }
  }

  /// Global pre-order traversal index of `module`, consumed by the
  /// deterministic id assignment stage.
  pub fn module_pre_order_index(&self, module: ModuleId) -> Option<u32> {
    self.module_pre_order_indices.get(&module).copied()
  }

  pub fn module_post_order_index(&self, module: ModuleId) -> Option<u32> {
    self.module_post_order_indices.get(&module).copied()
  }

  /// All chunks transitively reachable as async descendants of `chunk`:
  /// a breadth-first walk over chunk group children that does not descend
  /// into groups already part of the initial load, so initial chunks are
  /// never misclassified as async.
  pub fn all_async_chunks_of(&self, chunk: ChunkId) -> Vec<ChunkId> {
    let groups = &self.chunks[chunk.index()].groups;

    // Chunks guaranteed loaded whenever `chunk` is: the intersection of the
    // chunk lists of every group containing it.
    let mut initial_chunks: FxHashSet<ChunkId> = FxHashSet::default();
    for (i, group) in groups.iter().enumerate() {
      let group_chunks: FxHashSet<ChunkId> =
        self.chunk_groups[group.index()].chunks.iter().copied().collect();
      if i == 0 {
        initial_chunks = group_chunks;
      } else {
        initial_chunks.retain(|c| group_chunks.contains(c));
      }
    }

    let mut initial_queue: Vec<ChunkGroupId> = groups.iter().copied().collect();
    let mut visited_initial: FxHashSet<ChunkGroupId> = initial_queue.iter().copied().collect();
    let mut queue: Vec<ChunkGroupId> = vec![];
    let mut queued: FxHashSet<ChunkGroupId> = FxHashSet::default();

    let mut head = 0;
    while head < initial_queue.len() {
      let group = initial_queue[head];
      head += 1;
      for child in self.chunk_groups[group.index()].children.iter().copied() {
        if self.chunk_groups[child.index()].is_entrypoint() {
          if visited_initial.insert(child) {
            initial_queue.push(child);
          }
        } else if queued.insert(child) {
          queue.push(child);
        }
      }
    }

    let mut chunks: Vec<ChunkId> = vec![];
    let mut seen_chunks: FxHashSet<ChunkId> = FxHashSet::default();
    let mut head = 0;
    while head < queue.len() {
      let group = queue[head];
      head += 1;
      for &c in &self.chunk_groups[group.index()].chunks {
        if !initial_chunks.contains(&c) && seen_chunks.insert(c) {
          chunks.push(c);
        }
      }
      for child in self.chunk_groups[group.index()].children.iter().copied() {
        if queued.insert(child) {
          queue.push(child);
        }
      }
    }

    chunks
  }

  /// All chunks of the initial load reachable from `chunk`'s groups,
  /// including `chunk` itself when it is initial.
  pub fn all_initial_chunks_of(&self, chunk: ChunkId) -> Vec<ChunkId> {
    let mut queue: Vec<ChunkGroupId> = self.chunks[chunk.index()].groups.iter().copied().collect();
    let mut seen_groups: FxHashSet<ChunkGroupId> = queue.iter().copied().collect();
    let mut chunks: Vec<ChunkId> = vec![];
    let mut seen_chunks: FxHashSet<ChunkId> = FxHashSet::default();

    let mut head = 0;
    while head < queue.len() {
      let group = queue[head];
      head += 1;
      if !self.chunk_groups[group.index()].is_initial() {
        continue;
      }
      for &c in &self.chunk_groups[group.index()].chunks {
        if seen_chunks.insert(c) {
          chunks.push(c);
        }
      }
      for child in self.chunk_groups[group.index()].children.iter().copied() {
        if seen_groups.insert(child) {
          queue.push(child);
        }
      }
    }

    chunks
  }

  /// Severs a chunk from every module and group; used when a speculatively
  /// created group turns out to be unreferenced.
  pub(crate) fn disconnect_chunk(&mut self, chunk: ChunkId) {
    let modules: Vec<ModuleId> = self.chunk_modules[chunk.index()].iter().copied().collect();
    for module in modules {
      if let Some(chunks) = self.module_chunks.get_mut(&module) {
        chunks.remove(&chunk);
      }
    }
    self.chunk_modules[chunk.index()].clear();
    self.chunk_entry_modules.remove(&chunk);
    self.chunks[chunk.index()].groups.clear();
    self.chunks[chunk.index()].removed = true;
  }

  pub(crate) fn remove_chunk_group(&mut self, group_id: ChunkGroupId) {
    let children: Vec<ChunkGroupId> = self.chunk_groups[group_id.index()]
      .children
      .iter()
      .copied()
      .collect();
    for child in children {
      self.chunk_groups[child.index()].parents.remove(&group_id);
    }
    let blocks: Vec<BlockId> = std::mem::take(&mut self.chunk_groups[group_id.index()].blocks);
    for block in blocks {
      self.block_chunk_groups.remove(&block);
    }
    if let Some(name) = self.chunk_groups[group_id.index()].name() {
      let name = name.to_string();
      if self.named_chunk_groups.get(&name) == Some(&group_id) {
        self.named_chunk_groups.remove(&name);
      }
    }
    self.chunk_groups[group_id.index()].removed = true;
  }
}
