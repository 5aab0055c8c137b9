use std::mem;

use hashlink::{LinkedHashMap, LinkedHashSet};
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use strata_common::{BlockId, ChunkGroupId, ChunkId, ConnectionId, ModuleId, RuntimeSpec};
use strata_error::Error;

use crate::{
  block_modules::BlockModulesCache, ChunkGraph, ChunkGroupKind, EntryOptions, ModuleGraph,
};

mod available_modules;
use available_modules::AvailableModules;

/// Description of one entrypoint: its name, ordered root modules and entry
/// options, as provided by the surrounding build configuration.
#[derive(Debug, Clone, Default)]
pub struct EntryData {
  pub name: String,
  pub modules: Vec<ModuleId>,
  pub options: EntryOptions,
}

/// Builds the chunk graph for `entries` on top of `module_graph`.
///
/// Runs the queue-driven traversal to its fixed point and never fails:
/// configuration conflicts are recorded in the returned graph's
/// [`ChunkGraph::diagnostics`] and degrade locally.
pub fn build_chunk_graph(module_graph: &ModuleGraph, entries: &[EntryData]) -> ChunkGraph {
  ChunkGraphBuilder::new(module_graph, entries).build()
}

type InfoId = usize;

/// Traversal actions. Dependency depth is unbounded, so the walk is an
/// explicit stack of tagged items instead of recursion.
#[derive(Debug, Clone, Copy)]
enum QueueAction {
  EnterModule,
  ProcessBlock,
  ProcessEntryBlock,
  LeaveModule,
}

#[derive(Debug, Clone, Copy)]
struct QueueItem {
  action: QueueAction,
  block: BlockId,
  module: ModuleId,
  chunk: ChunkId,
  info: InfoId,
}

/// Working state of one chunk group during construction.
#[derive(Debug)]
struct ChunkGroupInfo {
  chunk_group: ChunkGroupId,
  runtime: RuntimeSpec,
  /// `None` until the first availability contribution arrives (or, for
  /// combining entrypoints, until every source is ready).
  min_available_modules: Option<AvailableModules>,
  /// Whether the base of `min_available_modules` may be mutated in place.
  min_available_modules_owned: bool,
  /// Pending contributions, merged by intersection.
  available_modules_to_be_merged: Vec<AvailableModules>,
  /// Modules skipped because they were already available; reconsidered when
  /// availability shrinks.
  skipped_items: LinkedHashSet<ModuleId>,
  /// Targets skipped because their connections were not unconditionally
  /// active; re-evaluated when the runtime grows.
  skipped_module_connections: LinkedHashSet<(ModuleId, Vec<ConnectionId>)>,
  /// Lazily computed `min_available_modules` ∪ own chunk modules.
  resulting_available_modules: Option<AvailableModules>,
  children: LinkedHashSet<InfoId>,
  /// For entrypoints combining other entrypoints: the sources whose
  /// availability feeds this group.
  available_sources: LinkedHashSet<InfoId>,
  available_children: LinkedHashSet<InfoId>,
  pre_order_index: u32,
  post_order_index: u32,
  chunk_loading: bool,
  async_chunks: bool,
}

struct ChunkGraphBuilder<'graph> {
  module_graph: &'graph ModuleGraph,
  entries: &'graph [EntryData],
  chunk_graph: ChunkGraph,
  block_modules: BlockModulesCache,

  infos: Vec<ChunkGroupInfo>,
  info_of_group: FxHashMap<ChunkGroupId, InfoId>,

  /// The main queue is a stack; buffered pushes are applied in reverse so
  /// declaration order wins for circular or re-entrant references.
  queue: Vec<QueueItem>,
  /// Async boundary contents, processed only once the main queue drained.
  queue_delayed: Vec<QueueItem>,
  queue_connect: LinkedHashMap<InfoId, LinkedHashSet<InfoId>>,
  chunk_groups_for_combining: LinkedHashSet<InfoId>,
  chunk_groups_for_merging: LinkedHashSet<InfoId>,
  outdated_chunk_group_info: LinkedHashSet<InfoId>,

  named_chunk_groups: FxHashMap<String, InfoId>,
  named_async_entrypoints: FxHashMap<String, InfoId>,
  block_chunk_groups: FxHashMap<BlockId, InfoId>,
  /// Pending parent→child edges per boundary, wired at finalization.
  block_connections: LinkedHashMap<BlockId, Vec<(InfoId, ChunkGroupId)>>,
  /// Boundaries containing nested boundaries must always be connected.
  blocks_with_nested_blocks: FxHashSet<BlockId>,
  /// Speculatively created groups; the parentless ones are deleted at the
  /// end.
  all_created_chunk_groups: LinkedHashSet<ChunkGroupId>,

  next_module_pre_order_index: u32,
  next_module_post_order_index: u32,

  stat_processed_queue_items: u64,
  stat_processed_blocks: u64,
  stat_connected_chunk_groups: u64,
  stat_merged_available_module_sets: u64,
  stat_forked_available_module_sets: u64,
}

impl<'graph> ChunkGraphBuilder<'graph> {
  fn new(module_graph: &'graph ModuleGraph, entries: &'graph [EntryData]) -> Self {
    Self {
      module_graph,
      entries,
      chunk_graph: Default::default(),
      block_modules: Default::default(),
      infos: vec![],
      info_of_group: Default::default(),
      queue: vec![],
      queue_delayed: vec![],
      queue_connect: Default::default(),
      chunk_groups_for_combining: Default::default(),
      chunk_groups_for_merging: Default::default(),
      outdated_chunk_group_info: Default::default(),
      named_chunk_groups: Default::default(),
      named_async_entrypoints: Default::default(),
      block_chunk_groups: Default::default(),
      block_connections: Default::default(),
      blocks_with_nested_blocks: Default::default(),
      all_created_chunk_groups: Default::default(),
      next_module_pre_order_index: 0,
      next_module_post_order_index: 0,
      stat_processed_queue_items: 0,
      stat_processed_blocks: 0,
      stat_connected_chunk_groups: 0,
      stat_merged_available_module_sets: 0,
      stat_forked_available_module_sets: 0,
    }
  }

  #[tracing::instrument(skip_all)]
  fn build(mut self) -> ChunkGraph {
    self.prepare_entrypoints();
    self.visit_modules();
    self.merge_chunk_runtimes();
    self.connect_chunk_groups();
    self.cleanup_unconnected_groups();
    tracing::debug!(
      processed_queue_items = self.stat_processed_queue_items,
      processed_blocks = self.stat_processed_blocks,
      connected_chunk_groups = self.stat_connected_chunk_groups,
      merged_available_module_sets = self.stat_merged_available_module_sets,
      forked_available_module_sets = self.stat_forked_available_module_sets,
      "chunk graph reached its fixed point"
    );
    tracing::debug!(
      "chunk groups: {:#?}",
      self
        .chunk_graph
        .chunk_groups()
        .map(|group| format!("{}: {}", group.index(), group.name().unwrap_or("<dynamic>")))
        .collect_vec()
    );
    self.chunk_graph
  }

  fn add_info(
    &mut self,
    chunk_group: ChunkGroupId,
    runtime: RuntimeSpec,
    chunk_loading: bool,
    async_chunks: bool,
  ) -> InfoId {
    let id = self.infos.len();
    self.infos.push(ChunkGroupInfo {
      chunk_group,
      runtime,
      min_available_modules: None,
      min_available_modules_owned: false,
      available_modules_to_be_merged: vec![],
      skipped_items: Default::default(),
      skipped_module_connections: Default::default(),
      resulting_available_modules: None,
      children: Default::default(),
      available_sources: Default::default(),
      available_children: Default::default(),
      pre_order_index: 0,
      post_order_index: 0,
      chunk_loading,
      async_chunks,
    });
    self.info_of_group.insert(chunk_group, id);
    id
  }

  fn connect_group_parent_and_child(&mut self, parent: ChunkGroupId, child: ChunkGroupId) {
    self.chunk_graph.chunk_group_mut(child).parents.insert(parent);
    self.chunk_graph.chunk_group_mut(parent).children.insert(child);
  }

  fn prepare_entrypoints(&mut self) {
    // 1. A chunk and an initial chunk group per entry.
    let mut entry_groups: Vec<ChunkGroupId> = vec![];
    let mut entry_index_by_name: FxHashMap<&str, usize> = FxHashMap::default();
    for (i, entry) in self.entries.iter().enumerate() {
      let chunk = self.chunk_graph.add_chunk(Some(entry.name.clone()));
      let mut options = entry.options.clone();
      if options.name.is_none() {
        options.name = Some(entry.name.clone());
      }
      let group = self.chunk_graph.add_chunk_group(ChunkGroupKind::Entrypoint {
        initial: true,
        options,
      });
      self.chunk_graph.connect_chunk_and_group(chunk, group);
      entry_groups.push(group);
      entry_index_by_name.insert(&entry.name, i);
    }

    // 2. Parent/child edges between entries declared via `depend_on`.
    let mut parents_of: Vec<Vec<usize>> = vec![vec![]; self.entries.len()];
    let mut edges: Vec<(usize, usize)> = vec![];
    let mut diagnostics: Vec<Error> = vec![];
    for (i, entry) in self.entries.iter().enumerate() {
      let Some(depend_on) = &entry.options.depend_on else {
        continue;
      };
      for name in depend_on {
        match entry_index_by_name.get(name.as_str()) {
          None => diagnostics.push(Error::depend_on_entry_not_found(&entry.name, name)),
          Some(&j) => {
            let mutual = self.entries[j]
              .options
              .depend_on
              .as_ref()
              .map_or(false, |back| back.contains(&entry.name));
            if mutual {
              if i < j {
                diagnostics
                  .push(Error::mutually_dependent_entries(&entry.name, &self.entries[j].name));
              }
              continue;
            }
            parents_of[i].push(j);
            edges.push((j, i));
          }
        }
      }
    }
    self.chunk_graph.diagnostics.extend(diagnostics);
    for (parent, child) in edges {
      self.connect_group_parent_and_child(entry_groups[parent], entry_groups[child]);
    }

    // 3. Runtimes: explicit, inherited from parents, or the entry name.
    let mut memo: Vec<Option<RuntimeSpec>> = vec![None; self.entries.len()];
    let runtimes: Vec<RuntimeSpec> = (0..self.entries.len())
      .map(|i| {
        let mut visiting = FxHashSet::default();
        entry_runtime(self.entries, &parents_of, &mut memo, &mut visiting, i)
      })
      .collect();

    // 4. Working records, entry modules and the initial queue.
    let mut seed: Vec<QueueItem> = vec![];
    for (i, entry) in self.entries.iter().enumerate() {
      let group_id = entry_groups[i];
      let info_id = self.add_info(
        group_id,
        runtimes[i].clone(),
        entry.options.chunk_loading.unwrap_or(true),
        entry.options.async_chunks.unwrap_or(true),
      );
      self.named_chunk_groups.insert(entry.name.clone(), info_id);
      let chunk = self.chunk_graph.chunk_group(group_id).entry_chunk();
      for &module in &entry.modules {
        self.chunk_graph.connect_chunk_and_entry_module(chunk, module, group_id);
      }
      if self.chunk_graph.chunk_group(group_id).parents.is_empty() {
        // The application may start here: nothing is available yet.
        self.infos[info_id].min_available_modules = Some(AvailableModules::empty());
        for &module in &entry.modules {
          seed.push(QueueItem {
            action: QueueAction::EnterModule,
            block: self.module_graph.root_block_of(module),
            module,
            chunk,
            info: info_id,
          });
        }
      } else {
        // Availability depends on entries not processed yet. Park the root
        // modules until the parent sets combine.
        for &module in &entry.modules {
          self.infos[info_id].skipped_items.insert(module);
        }
        self.chunk_groups_for_combining.insert(info_id);
      }
    }

    let combining: Vec<InfoId> = self.chunk_groups_for_combining.iter().copied().collect();
    for info_id in combining {
      let group_id = self.infos[info_id].chunk_group;
      let parents: Vec<ChunkGroupId> = self
        .chunk_graph
        .chunk_group(group_id)
        .parents
        .iter()
        .copied()
        .collect();
      for parent in parents {
        let parent_info = self.info_of_group[&parent];
        self.infos[info_id].available_sources.insert(parent_info);
        self.infos[parent_info].available_children.insert(info_id);
      }
    }

    // The queue is a stack; reverse so the first declared entry runs first.
    seed.reverse();
    self.queue = seed;
  }

  #[tracing::instrument(skip_all)]
  fn visit_modules(&mut self) {
    while !self.queue.is_empty() || !self.queue_connect.is_empty() {
      self.process_queue();
      if !self.chunk_groups_for_combining.is_empty() {
        self.process_chunk_groups_for_combining();
      }
      if !self.queue_connect.is_empty() {
        self.process_connect_queue();
        if !self.chunk_groups_for_merging.is_empty() {
          self.process_chunk_groups_for_merging();
        }
      }
      if !self.outdated_chunk_group_info.is_empty() {
        self.process_outdated_chunk_group_info();
      }
      if self.queue.is_empty() {
        // Delayed items only run once everything synchronous settled.
        mem::swap(&mut self.queue, &mut self.queue_delayed);
      }
    }
  }

  fn process_queue(&mut self) {
    while let Some(item) = self.queue.pop() {
      self.stat_processed_queue_items += 1;
      match item.action {
        QueueAction::EnterModule => self.enter_module(item),
        QueueAction::ProcessBlock => self.process_block(item),
        QueueAction::ProcessEntryBlock => self.process_entry_block(item),
        QueueAction::LeaveModule => self.leave_module(item),
      }
    }
  }

  fn enter_module(&mut self, item: QueueItem) {
    if self.chunk_graph.is_module_in_chunk(item.module, item.chunk) {
      return;
    }
    self.chunk_graph.connect_chunk_and_module(item.chunk, item.module);

    let info = &mut self.infos[item.info];
    let group = self.chunk_graph.chunk_group_mut(info.chunk_group);
    if group.module_pre_order_index(item.module).is_none() {
      group
        .module_pre_order_indices
        .insert(item.module, info.pre_order_index);
      info.pre_order_index += 1;
    }
    if self
      .chunk_graph
      .set_module_pre_order_index_if_unset(item.module, self.next_module_pre_order_index)
    {
      self.next_module_pre_order_index += 1;
    }

    self.queue.push(QueueItem {
      action: QueueAction::LeaveModule,
      ..item
    });
    self.process_block(item);
  }

  fn leave_module(&mut self, item: QueueItem) {
    let info = &mut self.infos[item.info];
    let group = self.chunk_graph.chunk_group_mut(info.chunk_group);
    if group.module_post_order_index(item.module).is_none() {
      group
        .module_post_order_indices
        .insert(item.module, info.post_order_index);
      info.post_order_index += 1;
    }
    if self
      .chunk_graph
      .set_module_post_order_index_if_unset(item.module, self.next_module_post_order_index)
    {
      self.next_module_post_order_index += 1;
    }
  }

  fn process_block(&mut self, item: QueueItem) {
    self.stat_processed_blocks += 1;
    let graph = self.module_graph;
    let runtime = self.infos[item.info].runtime.clone();
    let block_modules = self.block_modules.get(graph, item.block, &runtime);

    let mut skip_buffer: Vec<ModuleId> = vec![];
    let mut skip_connection_buffer: Vec<(ModuleId, Vec<ConnectionId>)> = vec![];
    let mut queue_buffer: Vec<QueueItem> = vec![];

    for entry in block_modules.iter() {
      if self.chunk_graph.is_module_in_chunk(entry.module, item.chunk) {
        // skip early if already connected
        continue;
      }
      let active_state = entry.active_state;
      if !active_state.is_always() {
        skip_connection_buffer.push((entry.module, entry.connections.clone()));
        if active_state.is_never() {
          continue;
        }
      }
      if active_state.is_always()
        && self.infos[item.info]
          .min_available_modules
          .as_ref()
          .map_or(false, |available| available.contains(entry.module))
      {
        // Already guaranteed loaded through every parent; reconsidered if
        // availability shrinks later.
        skip_buffer.push(entry.module);
        continue;
      }
      queue_buffer.push(QueueItem {
        action: if active_state.is_always() {
          QueueAction::EnterModule
        } else {
          QueueAction::ProcessBlock
        },
        block: graph.root_block_of(entry.module),
        module: entry.module,
        chunk: item.chunk,
        info: item.info,
      });
    }

    // Apply buffers in reverse order so declaration order determines the
    // final index assignment.
    {
      let info = &mut self.infos[item.info];
      for module in skip_buffer.into_iter().rev() {
        info.skipped_items.insert(module);
      }
      for entry in skip_connection_buffer.into_iter().rev() {
        info.skipped_module_connections.insert(entry);
      }
    }
    for queued in queue_buffer.into_iter().rev() {
      self.queue.push(queued);
    }

    let block = graph.block(item.block);
    for &nested in block.blocks() {
      self.handle_async_boundary(nested, &item);
    }
    if !block.blocks().is_empty() && block.is_async() {
      self.blocks_with_nested_blocks.insert(item.block);
    }
  }

  fn process_entry_block(&mut self, item: QueueItem) {
    self.stat_processed_blocks += 1;
    let graph = self.module_graph;
    let runtime = self.infos[item.info].runtime.clone();
    let block_modules = self.block_modules.get(graph, item.block, &runtime);

    let mut skip_connection_buffer: Vec<(ModuleId, Vec<ConnectionId>)> = vec![];
    let mut queue_buffer: Vec<QueueItem> = vec![];

    for entry in block_modules.iter() {
      let active_state = entry.active_state;
      if !active_state.is_always() {
        skip_connection_buffer.push((entry.module, entry.connections.clone()));
        if active_state.is_never() {
          continue;
        }
      }
      if active_state.is_always() {
        let group = self.infos[item.info].chunk_group;
        self
          .chunk_graph
          .connect_chunk_and_entry_module(item.chunk, entry.module, group);
      }
      queue_buffer.push(QueueItem {
        action: if active_state.is_always() {
          QueueAction::EnterModule
        } else {
          QueueAction::ProcessEntryBlock
        },
        block: graph.root_block_of(entry.module),
        module: entry.module,
        chunk: item.chunk,
        info: item.info,
      });
    }

    {
      let info = &mut self.infos[item.info];
      for entry in skip_connection_buffer.into_iter().rev() {
        info.skipped_module_connections.insert(entry);
      }
    }
    for queued in queue_buffer.into_iter().rev() {
      self.queue.push(queued);
    }

    let block = graph.block(item.block);
    for &nested in block.blocks() {
      self.handle_async_boundary(nested, &item);
    }
    if !block.blocks().is_empty() && block.is_async() {
      self.blocks_with_nested_blocks.insert(item.block);
    }
  }

  /// Resolves an async boundary to a chunk group: reuse by explicit name,
  /// create a new chunk + group, spawn an async entrypoint, or degrade to
  /// synchronous inclusion.
  fn handle_async_boundary(&mut self, block_id: BlockId, item: &QueueItem) {
    let graph = self.module_graph;
    let block = graph.block(block_id);
    let entry_options = block
      .group_options()
      .and_then(|options| options.entry_options.clone());
    let chunk_name: Option<String> = block.group_options().and_then(|options| {
      options
        .name
        .clone()
        .or_else(|| options.entry_options.as_ref().and_then(|entry| entry.name.clone()))
    });

    let mut connect_target: Option<InfoId> = None;
    let mut async_entry: Option<InfoId> = None;

    match self.block_chunk_groups.get(&block_id).copied() {
      Some(info_id) => {
        if entry_options.is_some() {
          async_entry = Some(info_id);
        } else if self
          .chunk_graph
          .chunk_group(self.infos[info_id].chunk_group)
          .is_initial()
        {
          // A boundary that already degraded keeps degrading.
          self.queue.push(QueueItem {
            action: QueueAction::ProcessBlock,
            block: block_id,
            ..*item
          });
          return;
        } else {
          connect_target = Some(info_id);
        }
      }
      None => {
        if let Some(entry_options) = entry_options {
          let existing = chunk_name
            .as_deref()
            .and_then(|name| self.named_async_entrypoints.get(name).copied());
          let info_id = match existing {
            Some(info_id) => {
              let group_id = self.infos[info_id].chunk_group;
              self
                .chunk_graph
                .chunk_group_mut(group_id)
                .add_origin(Some(item.module), block.loc());
              info_id
            }
            None => self.create_async_entrypoint(block_id, &entry_options, &chunk_name, item),
          };
          self.block_chunk_groups.insert(block_id, info_id);
          async_entry = Some(info_id);
        } else if !self.infos[item.info].async_chunks || !self.infos[item.info].chunk_loading {
          // Async chunks are disabled below this entry: include the
          // boundary's contents synchronously.
          self.queue.push(QueueItem {
            action: QueueAction::ProcessBlock,
            block: block_id,
            ..*item
          });
          return;
        } else {
          let existing = chunk_name
            .as_deref()
            .and_then(|name| self.named_chunk_groups.get(name).copied());
          match existing {
            Some(info_id) => {
              let group_id = self.infos[info_id].chunk_group;
              if self.chunk_graph.chunk_group(group_id).is_initial() {
                let origin = graph.module(item.module).request().to_string();
                self.chunk_graph.diagnostics.push(
                  Error::async_dependency_to_initial_chunk(
                    chunk_name.clone().unwrap_or_default(),
                    origin,
                    block.loc(),
                  ),
                );
                tracing::trace!(
                  "async boundary in {} degraded: name {:?} is an initial chunk",
                  graph.module(item.module).request(),
                  chunk_name
                );
                self.block_chunk_groups.insert(block_id, info_id);
                self.queue.push(QueueItem {
                  action: QueueAction::ProcessBlock,
                  block: block_id,
                  ..*item
                });
                return;
              }
              if let Some(options) = block.group_options() {
                self.chunk_graph.chunk_group_mut(group_id).add_options(options);
              }
              self
                .chunk_graph
                .chunk_group_mut(group_id)
                .add_origin(Some(item.module), block.loc());
              self.block_chunk_groups.insert(block_id, info_id);
              connect_target = Some(info_id);
            }
            None => {
              let chunk = self.chunk_graph.add_chunk(chunk_name.clone());
              let options = block.group_options().cloned().unwrap_or_default();
              let group_id = self
                .chunk_graph
                .add_chunk_group(ChunkGroupKind::Normal { options });
              self.chunk_graph.connect_chunk_and_group(chunk, group_id);
              self
                .chunk_graph
                .chunk_group_mut(group_id)
                .add_origin(Some(item.module), block.loc());
              self.all_created_chunk_groups.insert(group_id);
              let origin_info = &self.infos[item.info];
              let runtime = origin_info.runtime.clone();
              let chunk_loading = origin_info.chunk_loading;
              let async_chunks = origin_info.async_chunks;
              let info_id = self.add_info(group_id, runtime, chunk_loading, async_chunks);
              if let Some(name) = &chunk_name {
                self.named_chunk_groups.insert(name.clone(), info_id);
              }
              self.block_chunk_groups.insert(block_id, info_id);
              connect_target = Some(info_id);
            }
          }
        }
      }
    }

    if let Some(target) = connect_target {
      let target_group = self.infos[target].chunk_group;
      // Stored for the finalization pass, which wires parent/child edges
      // only where a connection is actually needed.
      self
        .block_connections
        .entry(block_id)
        .or_insert_with(Vec::new)
        .push((item.info, target_group));
      self
        .queue_connect
        .entry(item.info)
        .or_insert_with(Default::default)
        .insert(target);
      // Boundary contents run only after the synchronous queue drained, so
      // synchronous traversal determines global indices first.
      let chunk = self.chunk_graph.chunk_group(target_group).entry_chunk();
      self.queue_delayed.push(QueueItem {
        action: QueueAction::ProcessBlock,
        block: block_id,
        module: item.module,
        chunk,
        info: target,
      });
    } else if let Some(entry_info) = async_entry {
      let entry_group = self.infos[entry_info].chunk_group;
      let origin_group = self.infos[item.info].chunk_group;
      self
        .chunk_graph
        .chunk_group_mut(origin_group)
        .async_entrypoints
        .insert(entry_group);
      let chunk = self.chunk_graph.chunk_group(entry_group).entry_chunk();
      self.queue_delayed.push(QueueItem {
        action: QueueAction::ProcessEntryBlock,
        block: block_id,
        module: item.module,
        chunk,
        info: entry_info,
      });
    }
  }

  fn create_async_entrypoint(
    &mut self,
    block_id: BlockId,
    entry_options: &EntryOptions,
    chunk_name: &Option<String>,
    item: &QueueItem,
  ) -> InfoId {
    let block_loc = self.module_graph.block(block_id).loc();
    let chunk = self.chunk_graph.add_chunk(chunk_name.clone());
    let mut options = entry_options.clone();
    if options.name.is_none() {
      options.name = chunk_name.clone();
    }
    let group_id = self.chunk_graph.add_chunk_group(ChunkGroupKind::Entrypoint {
      initial: false,
      options: options.clone(),
    });
    self.chunk_graph.connect_chunk_and_group(chunk, group_id);
    self
      .chunk_graph
      .chunk_group_mut(group_id)
      .add_origin(Some(item.module), block_loc);
    self.chunk_graph.connect_block_and_chunk_group(block_id, group_id);
    // A fresh runtime begins here; nothing is assumed loaded.
    let runtime = options
      .runtime
      .as_deref()
      .map(RuntimeSpec::of)
      .or_else(|| chunk_name.as_deref().map(RuntimeSpec::of))
      .unwrap_or_else(|| self.infos[item.info].runtime.clone());
    let chunk_loading = options
      .chunk_loading
      .unwrap_or(self.infos[item.info].chunk_loading);
    let async_chunks = options
      .async_chunks
      .unwrap_or(self.infos[item.info].async_chunks);
    let info_id = self.add_info(group_id, runtime, chunk_loading, async_chunks);
    self.infos[info_id].min_available_modules = Some(AvailableModules::empty());
    if let Some(name) = chunk_name {
      self.named_async_entrypoints.insert(name.clone(), info_id);
    }
    info_id
  }

  /// `min_available_modules` ∪ modules bound to the group's own chunks,
  /// computed lazily and cached. Picks whichever two-level layout copies
  /// less.
  fn calculate_resulting_available_modules(&mut self, info_id: InfoId) -> AvailableModules {
    if let Some(cached) = &self.infos[info_id].resulting_available_modules {
      return cached.clone();
    }
    let min = self.infos[info_id]
      .min_available_modules
      .clone()
      .unwrap_or_default();
    let group_id = self.infos[info_id].chunk_group;
    let chunks: Vec<ChunkId> = self.chunk_graph.chunk_group(group_id).chunks.clone();

    let resulting = if min.base().len() > min.overflow().len() {
      // Share the large base with the children; copy only the delta.
      let mut fresh: FxHashSet<ModuleId> = min.overflow().iter().copied().collect();
      for &chunk in &chunks {
        fresh.extend(self.chunk_graph.chunk_modules(chunk));
      }
      // The base is referenced by the children now; it must not be mutated
      // in place anymore.
      self.infos[info_id].min_available_modules_owned = false;
      AvailableModules::with_overflow(fresh, std::rc::Rc::clone(min.base()))
    } else {
      let mut fresh: FxHashSet<ModuleId> =
        min.base().iter().chain(min.overflow().iter()).copied().collect();
      for &chunk in &chunks {
        fresh.extend(self.chunk_graph.chunk_modules(chunk));
      }
      AvailableModules::from_set(fresh)
    };

    self.infos[info_id].resulting_available_modules = Some(resulting.clone());
    resulting
  }

  /// Finalizes pending parent→child connections: adds the targets to the
  /// source's children, hands the source's resulting availability to every
  /// target, and merges runtimes forward.
  fn process_connect_queue(&mut self) {
    let queue_connect = mem::take(&mut self.queue_connect);
    for (info_id, targets) in queue_connect {
      for &target in targets.iter() {
        self.infos[info_id].children.insert(target);
      }
      let resulting = self.calculate_resulting_available_modules(info_id);
      let runtime = self.infos[info_id].runtime.clone();
      for target in targets {
        let runtime_grew = {
          let target_info = &mut self.infos[target];
          target_info
            .available_modules_to_be_merged
            .push(resulting.clone());
          target_info.runtime.merge(&runtime)
        };
        self.chunk_groups_for_merging.insert(target);
        if runtime_grew {
          // Skipped connections were evaluated under the smaller runtime.
          self.outdated_chunk_group_info.insert(target);
        }
        self.stat_connected_chunk_groups += 1;
      }
    }
  }

  /// Merges pending availability contributions by intersection: a module is
  /// available to a child only if every contributing parent path guarantees
  /// it. Smallest contribution first keeps the merge work minimal.
  fn process_chunk_groups_for_merging(&mut self) {
    let for_merging = mem::take(&mut self.chunk_groups_for_merging);
    for info_id in for_merging {
      let mut to_merge = mem::take(&mut self.infos[info_id].available_modules_to_be_merged);
      if to_merge.len() > 1 {
        to_merge.sort_by_key(AvailableModules::size_hint);
      }
      let mut changed = false;
      for available in to_merge {
        match self.infos[info_id].min_available_modules.take() {
          None => {
            let info = &mut self.infos[info_id];
            info.min_available_modules = Some(available);
            info.min_available_modules_owned = false;
            changed = true;
          }
          Some(mut min) => {
            if self.infos[info_id].min_available_modules_owned {
              changed |= min.intersect_in_place(&available);
              self.stat_merged_available_module_sets += 1;
            } else {
              let (forked, shrank) = min.intersect_forked(&available);
              min = forked;
              changed |= shrank;
              self.infos[info_id].min_available_modules_owned = true;
              self.stat_forked_available_module_sets += 1;
            }
            self.infos[info_id].min_available_modules = Some(min);
          }
        }
      }
      if changed {
        self.infos[info_id].resulting_available_modules = None;
        self.outdated_chunk_group_info.insert(info_id);
      }
    }
  }

  /// Entrypoints combining other entrypoints take the union of every
  /// source's resulting availability: all of them are loaded beforehand.
  fn process_chunk_groups_for_combining(&mut self) {
    let candidates: Vec<InfoId> = self.chunk_groups_for_combining.iter().copied().collect();
    self.chunk_groups_for_combining.clear();

    for info_id in candidates {
      let sources: Vec<InfoId> = self.infos[info_id].available_sources.iter().copied().collect();
      // Sources without availability are not ready; the group comes back
      // through `available_children` once they are.
      if sources
        .iter()
        .any(|&source| self.infos[source].min_available_modules.is_none())
      {
        continue;
      }
      let mut parts: Vec<AvailableModules> = vec![];
      for source in sources {
        parts.push(self.calculate_resulting_available_modules(source));
      }
      let combined = AvailableModules::union(parts.iter());
      let info = &mut self.infos[info_id];
      info.min_available_modules = Some(combined);
      info.min_available_modules_owned = false;
      info.resulting_available_modules = None;
      self.outdated_chunk_group_info.insert(info_id);
    }
  }

  /// Re-examines groups whose availability shrank or whose runtime grew:
  /// previously skipped work may apply now, children inherit the change,
  /// and combining groups waiting on this one get another chance.
  fn process_outdated_chunk_group_info(&mut self) {
    let outdated = mem::take(&mut self.outdated_chunk_group_info);
    for info_id in outdated {
      let chunk = self
        .chunk_graph
        .chunk_group(self.infos[info_id].chunk_group)
        .entry_chunk();

      // 1. Skipped modules the shrunken set no longer covers.
      let to_requeue: Vec<ModuleId> = self.infos[info_id]
        .skipped_items
        .iter()
        .copied()
        .filter(|&module| {
          !self.infos[info_id]
            .min_available_modules
            .as_ref()
            .map_or(true, |available| available.contains(module))
        })
        .collect();
      for module in to_requeue {
        self.infos[info_id].skipped_items.remove(&module);
        self.queue.push(QueueItem {
          action: QueueAction::EnterModule,
          block: self.module_graph.root_block_of(module),
          module,
          chunk,
          info: info_id,
        });
      }

      // 2. Skipped connections, re-evaluated under the current runtime.
      let runtime = self.infos[info_id].runtime.clone();
      let entries: Vec<(ModuleId, Vec<ConnectionId>)> = self.infos[info_id]
        .skipped_module_connections
        .iter()
        .cloned()
        .collect();
      for entry in entries {
        let active_state = self
          .module_graph
          .active_state_of_connections(&entry.1, &runtime);
        if active_state.is_never() {
          continue;
        }
        if active_state.is_always() {
          self.infos[info_id].skipped_module_connections.remove(&entry);
          if self.infos[info_id]
            .min_available_modules
            .as_ref()
            .map_or(false, |available| available.contains(entry.0))
          {
            self.infos[info_id].skipped_items.insert(entry.0);
            continue;
          }
        }
        self.queue.push(QueueItem {
          action: if active_state.is_always() {
            QueueAction::EnterModule
          } else {
            QueueAction::ProcessBlock
          },
          block: self.module_graph.root_block_of(entry.0),
          module: entry.0,
          chunk,
          info: info_id,
        });
      }

      // 3. Children inherit the shrunken availability.
      let children: Vec<InfoId> = self.infos[info_id].children.iter().copied().collect();
      if !children.is_empty() {
        let list = self
          .queue_connect
          .entry(info_id)
          .or_insert_with(Default::default);
        for child in children {
          list.insert(child);
        }
      }

      // 4. Combining groups waiting on this one.
      let available_children: Vec<InfoId> =
        self.infos[info_id].available_children.iter().copied().collect();
      for child in available_children {
        self.chunk_groups_for_combining.insert(child);
      }
    }
  }

  /// Every chunk executes under the union of the runtimes of the groups
  /// containing it.
  fn merge_chunk_runtimes(&mut self) {
    for info_id in 0..self.infos.len() {
      let group_id = self.infos[info_id].chunk_group;
      let chunks: Vec<ChunkId> = self.chunk_graph.chunk_group(group_id).chunks.clone();
      let runtime = self.infos[info_id].runtime.clone();
      for chunk in chunks {
        self.chunk_graph.chunk_mut(chunk).runtime.merge(&runtime);
      }
    }
  }

  /// Wires the recorded boundary edges into group parent/child links,
  /// skipping boundaries whose target would contribute nothing new.
  fn connect_chunk_groups(&mut self) {
    let block_connections = mem::take(&mut self.block_connections);
    for (block, connections) in block_connections {
      if !self.blocks_with_nested_blocks.contains(&block)
        && connections
          .iter()
          .all(|&(origin, target)| self.are_modules_available(target, origin))
      {
        tracing::trace!("boundary {block} skipped: target fully available");
        continue;
      }
      for (origin, target_group) in connections {
        let origin_group = self.infos[origin].chunk_group;
        self.chunk_graph.connect_block_and_chunk_group(block, target_group);
        self.connect_group_parent_and_child(origin_group, target_group);
      }
    }
  }

  /// Whether every module of every chunk of `group` is already available
  /// from `origin`.
  fn are_modules_available(&mut self, group: ChunkGroupId, origin: InfoId) -> bool {
    let resulting = self.calculate_resulting_available_modules(origin);
    let chunks: Vec<ChunkId> = self.chunk_graph.chunk_group(group).chunks.clone();
    for chunk in chunks {
      for module in self.chunk_graph.chunk_modules(chunk) {
        if !resulting.contains(module) {
          return false;
        }
      }
    }
    true
  }

  /// Deletes groups created speculatively but never connected, e.g. because
  /// a conditional boundary evaluated to never-active.
  fn cleanup_unconnected_groups(&mut self) {
    let created: Vec<ChunkGroupId> = self.all_created_chunk_groups.iter().copied().collect();
    for group_id in created {
      if self.chunk_graph.chunk_group(group_id).parents.is_empty() {
        tracing::trace!("removing unconnected chunk group {group_id}");
        let chunks: Vec<ChunkId> = self.chunk_graph.chunk_group(group_id).chunks.clone();
        for chunk in chunks {
          self.chunk_graph.disconnect_chunk(chunk);
        }
        self.chunk_graph.remove_chunk_group(group_id);
      }
    }
  }
}

/// Runtime of one entry: explicit, else the union of the runtimes of the
/// entries it depends on, else its own name.
fn entry_runtime(
  entries: &[EntryData],
  parents_of: &[Vec<usize>],
  memo: &mut Vec<Option<RuntimeSpec>>,
  visiting: &mut FxHashSet<usize>,
  index: usize,
) -> RuntimeSpec {
  if let Some(runtime) = &memo[index] {
    return runtime.clone();
  }
  let entry = &entries[index];
  let runtime = if let Some(name) = &entry.options.runtime {
    RuntimeSpec::of(name)
  } else if !parents_of[index].is_empty() && visiting.insert(index) {
    let mut merged = RuntimeSpec::default();
    for &parent in &parents_of[index] {
      merged.merge(&entry_runtime(entries, parents_of, memo, visiting, parent));
    }
    visiting.remove(&index);
    if merged.is_empty() {
      RuntimeSpec::of(&entry.name)
    } else {
      merged
    }
  } else {
    RuntimeSpec::of(&entry.name)
  };
  memo[index] = Some(runtime.clone());
  runtime
}
