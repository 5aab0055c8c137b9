use derivative::Derivative;
use rustc_hash::FxHashMap;
use strata_common::{
  ActiveState, BlockId, ConnectionId, DependencyId, DependencyLocation, ModuleId, RuntimeSpec,
};

use crate::{Block, GroupOptions};

/// Activation predicate of a dependency.
pub enum DependencyCondition {
  /// The dependency is active in every runtime.
  True,
  /// The dependency can never become active (e.g. it was optimized away
  /// upstream).
  False,
  /// Runtime-dependent activation.
  Fn(Box<dyn Fn(&RuntimeSpec) -> ActiveState>),
}

/// An edge descriptor owned by its origin module through a block. Whether it
/// actually links two modules is decided by the upstream resolution stage,
/// which records a [`Connection`] for it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Dependency {
  #[derivative(Debug = "ignore")]
  pub(crate) condition: DependencyCondition,
  pub(crate) block: BlockId,
  /// Position within the owning block's dependency list. Recomputed by an
  /// identity scan when missing or stale.
  pub(crate) index_in_block: Option<u32>,
  /// Weak references must not force the target module to be loaded.
  pub(crate) weak: bool,
}

impl Dependency {
  pub fn block(&self) -> BlockId {
    self.block
  }

  pub fn weak(&self) -> bool {
    self.weak
  }
}

/// A resolved edge. Connections are the only way the chunk graph builder
/// learns that one module depends on another.
#[derive(Debug, Clone, Copy)]
pub struct Connection {
  pub origin: ModuleId,
  pub dependency: DependencyId,
  /// The target module.
  pub module: ModuleId,
}

/// An externally owned module node. The chunking core never creates or
/// destroys modules, it only references them; `request` exists purely for
/// diagnostics and stable test output.
#[derive(Debug)]
pub struct Module {
  pub(crate) request: String,
  pub(crate) root_block: BlockId,
  pub(crate) outgoing_connections: Vec<ConnectionId>,
}

impl Module {
  pub fn request(&self) -> &str {
    &self.request
  }

  pub fn root_block(&self) -> BlockId {
    self.root_block
  }

  pub fn outgoing_connections(&self) -> &[ConnectionId] {
    &self.outgoing_connections
  }
}

/// The module dependency graph handed over by the upstream resolution
/// stage. The chunking core consumes it read-only and assumes it is
/// internally consistent (every connection's target module exists).
#[derive(Debug, Default)]
pub struct ModuleGraph {
  modules: Vec<Module>,
  blocks: Vec<Block>,
  dependencies: Vec<Dependency>,
  connections: Vec<Connection>,
  connection_by_dependency: FxHashMap<DependencyId, ConnectionId>,
}

impl ModuleGraph {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn add_module(&mut self, request: impl Into<String>) -> ModuleId {
    let module_id = ModuleId::new(self.modules.len());
    let root_block = BlockId::new(self.blocks.len());
    self.blocks.push(Block::root(module_id));
    self.modules.push(Module {
      request: request.into(),
      root_block,
      outgoing_connections: vec![],
    });
    module_id
  }

  /// Creates a nested async boundary under `parent` (a root block or
  /// another async block of the same module).
  pub fn add_async_block(
    &mut self,
    parent: BlockId,
    options: GroupOptions,
    loc: Option<DependencyLocation>,
  ) -> BlockId {
    let owner = self.blocks[parent.index()].owner();
    let block_id = BlockId::new(self.blocks.len());
    self
      .blocks
      .push(Block::asynchronous(owner, parent, options, loc));
    self.blocks[parent.index()].blocks.push(block_id);
    block_id
  }

  pub fn add_dependency(
    &mut self,
    block: BlockId,
    condition: DependencyCondition,
    weak: bool,
  ) -> DependencyId {
    let dependency_id = DependencyId::new(self.dependencies.len());
    let index_in_block = self.blocks[block.index()].dependencies.len() as u32;
    self.dependencies.push(Dependency {
      condition,
      block,
      index_in_block: Some(index_in_block),
      weak,
    });
    self.blocks[block.index()].dependencies.push(dependency_id);
    dependency_id
  }

  /// Records the result of the upstream resolution stage: `dependency`
  /// points at `target`.
  pub fn resolve_dependency(&mut self, dependency: DependencyId, target: ModuleId) -> ConnectionId {
    let origin = self.blocks[self.dependencies[dependency.index()].block.index()].owner();
    let connection_id = ConnectionId::new(self.connections.len());
    self.connections.push(Connection {
      origin,
      dependency,
      module: target,
    });
    self.modules[origin.index()]
      .outgoing_connections
      .push(connection_id);
    self.connection_by_dependency.insert(dependency, connection_id);
    connection_id
  }

  pub fn module(&self, id: ModuleId) -> &Module {
    &self.modules[id.index()]
  }

  pub fn block(&self, id: BlockId) -> &Block {
    &self.blocks[id.index()]
  }

  pub fn dependency(&self, id: DependencyId) -> &Dependency {
    &self.dependencies[id.index()]
  }

  pub fn connection(&self, id: ConnectionId) -> &Connection {
    &self.connections[id.index()]
  }

  pub fn module_count(&self) -> usize {
    self.modules.len()
  }

  pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
    (0..self.modules.len()).map(ModuleId::new)
  }

  pub fn root_block_of(&self, module: ModuleId) -> BlockId {
    self.modules[module.index()].root_block
  }

  pub fn connection_for(&self, dependency: DependencyId) -> Option<ConnectionId> {
    self.connection_by_dependency.get(&dependency).copied()
  }

  pub(crate) fn active_state_of_connection(
    &self,
    connection: ConnectionId,
    runtime: &RuntimeSpec,
  ) -> ActiveState {
    let dependency = &self.dependencies[self.connections[connection.index()].dependency.index()];
    match &dependency.condition {
      DependencyCondition::True => ActiveState::Always,
      DependencyCondition::False => ActiveState::Never,
      DependencyCondition::Fn(condition) => condition(runtime),
    }
  }

  pub(crate) fn active_state_of_connections(
    &self,
    connections: &[ConnectionId],
    runtime: &RuntimeSpec,
  ) -> ActiveState {
    let mut merged = ActiveState::Never;
    for &connection in connections {
      merged = merged.merge(self.active_state_of_connection(connection, runtime));
      if merged.is_always() {
        break;
      }
    }
    merged
  }

  /// Position of `dependency` inside its owning block. Falls back to an
  /// identity scan when the recorded position is missing or stale.
  pub(crate) fn position_in_block(&self, dependency: DependencyId) -> Option<usize> {
    let dep = &self.dependencies[dependency.index()];
    let block = &self.blocks[dep.block.index()];
    if let Some(index) = dep.index_in_block {
      if block.dependencies.get(index as usize) == Some(&dependency) {
        return Some(index as usize);
      }
    }
    block.dependencies.iter().position(|d| *d == dependency)
  }
}
