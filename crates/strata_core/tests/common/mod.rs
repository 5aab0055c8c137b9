use std::fmt::Write;

use rustc_hash::FxHashMap;
use strata_common::{BlockId, ChunkGroupId, ChunkId, DependencyLocation, ModuleId};
use strata_core::{
  build_chunk_graph, ChunkGraph, DependencyCondition, EntryData, EntryOptions, GroupOptions,
  ModuleGraph,
};

/// Programmatic fixture builder: the upstream resolution stage in miniature.
#[derive(Default)]
pub struct TestGraph {
  pub graph: ModuleGraph,
  modules: FxHashMap<String, ModuleId>,
  entries: Vec<EntryData>,
}

#[allow(dead_code)]
impl TestGraph {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn module(&mut self, request: &str) -> ModuleId {
    if let Some(&module) = self.modules.get(request) {
      return module;
    }
    let module = self.graph.add_module(request);
    self.modules.insert(request.to_string(), module);
    module
  }

  /// An always-active dependency between the root blocks of two modules.
  pub fn dep(&mut self, from: &str, to: &str) {
    self.dep_with(from, to, DependencyCondition::True, false);
  }

  pub fn weak_dep(&mut self, from: &str, to: &str) {
    self.dep_with(from, to, DependencyCondition::True, true);
  }

  pub fn dep_with(&mut self, from: &str, to: &str, condition: DependencyCondition, weak: bool) {
    let from = self.module(from);
    let block = self.graph.root_block_of(from);
    self.block_dep_with(block, to, condition, weak);
  }

  pub fn block_dep(&mut self, block: BlockId, to: &str) {
    self.block_dep_with(block, to, DependencyCondition::True, false);
  }

  pub fn block_dep_with(
    &mut self,
    block: BlockId,
    to: &str,
    condition: DependencyCondition,
    weak: bool,
  ) {
    let to = self.module(to);
    let dependency = self.graph.add_dependency(block, condition, weak);
    self.graph.resolve_dependency(dependency, to);
  }

  /// An async boundary under `from`'s root block.
  pub fn async_block(&mut self, from: &str, options: GroupOptions) -> BlockId {
    let from = self.module(from);
    let root = self.graph.root_block_of(from);
    self
      .graph
      .add_async_block(root, options, Some(DependencyLocation::new(1, 0)))
  }

  /// An async boundary nested inside another async boundary.
  pub fn nested_async_block(&mut self, parent: BlockId, options: GroupOptions) -> BlockId {
    self
      .graph
      .add_async_block(parent, options, Some(DependencyLocation::new(2, 0)))
  }

  /// An async boundary with a single always-active dependency.
  pub fn async_dep(&mut self, from: &str, to: &str, name: Option<&str>) -> BlockId {
    let options = match name {
      Some(name) => GroupOptions::with_name(name),
      None => GroupOptions::default(),
    };
    let block = self.async_block(from, options);
    self.block_dep(block, to);
    block
  }

  pub fn entry(&mut self, name: &str, modules: &[&str]) {
    self.entry_with(name, modules, EntryOptions::default());
  }

  pub fn entry_with(&mut self, name: &str, modules: &[&str], options: EntryOptions) {
    let modules = modules.iter().map(|request| self.module(request)).collect();
    self.entries.push(EntryData {
      name: name.to_string(),
      modules,
      options,
    });
  }

  pub fn build(&self) -> ChunkGraph {
    strata_tracing::init();
    build_chunk_graph(&self.graph, &self.entries)
  }

  pub fn id_of(&self, request: &str) -> ModuleId {
    self.modules[request]
  }

  /// Requests of the modules of the chunk group named `name`, first chunk,
  /// in binding order.
  pub fn modules_of(&self, chunks: &ChunkGraph, name: &str) -> Vec<String> {
    let group = chunks
      .chunk_group_by_name(name)
      .unwrap_or_else(|| panic!("no chunk group named {name}"));
    let chunk = chunks.chunk_group(group).entry_chunk();
    chunks
      .chunk_modules(chunk)
      .map(|module| self.graph.module(module).request().to_string())
      .collect()
  }

  /// Requests of the modules of `chunk`, in binding order.
  pub fn requests_of(&self, chunks: &ChunkGraph, chunk: ChunkId) -> Vec<String> {
    chunks
      .chunk_modules(chunk)
      .map(|module| self.graph.module(module).request().to_string())
      .collect()
  }
}

fn group_label(chunks: &ChunkGraph, id: ChunkGroupId) -> String {
  let group = chunks.chunk_group(id);
  group
    .name()
    .map(str::to_string)
    .unwrap_or_else(|| format!("#{}", group.index()))
}

/// Deterministic textual rendering of a chunk graph, used for snapshot
/// assertions and the determinism checks.
#[allow(dead_code)]
pub fn render(graph: &ModuleGraph, chunks: &ChunkGraph) -> String {
  let mut out = String::new();
  let mut groups: Vec<_> = chunks.chunk_groups().collect();
  groups.sort_by_key(|group| group.index());
  for group in groups {
    let kind = if group.is_initial() {
      "entry"
    } else if group.is_entrypoint() {
      "async entry"
    } else {
      "dynamic"
    };
    let parents: Vec<_> = group
      .parents()
      .map(|parent| group_label(chunks, parent))
      .collect();
    let children: Vec<_> = group
      .children()
      .map(|child| group_label(chunks, child))
      .collect();
    write!(
      out,
      "group {} ({kind}) parents=[{}] children=[{}]",
      group_label(chunks, group.id()),
      parents.join(", "),
      children.join(", ")
    )
    .unwrap();
    let async_entries: Vec<_> = group
      .async_entrypoints()
      .map(|entry| group_label(chunks, entry))
      .collect();
    if !async_entries.is_empty() {
      write!(out, " async_entries=[{}]", async_entries.join(", ")).unwrap();
    }
    out.push('\n');
    for &chunk_id in group.chunks() {
      let chunk = chunks.chunk(chunk_id);
      let modules: Vec<_> = chunks
        .chunk_modules(chunk_id)
        .map(|module| graph.module(module).request().to_string())
        .collect();
      write!(
        out,
        "  chunk {} runtime={} modules=[{}]",
        chunk.name().unwrap_or("<anon>"),
        chunk.runtime(),
        modules.join(", ")
      )
      .unwrap();
      let entry_modules: Vec<_> = chunks
        .chunk_entry_modules(chunk_id)
        .iter()
        .map(|&(module, _)| graph.module(module).request().to_string())
        .collect();
      if !entry_modules.is_empty() {
        write!(out, " entry=[{}]", entry_modules.join(", ")).unwrap();
      }
      out.push('\n');
    }
  }
  for error in &chunks.diagnostics {
    writeln!(out, "error: {error}").unwrap();
  }
  out
}
