use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_common::{ActiveState, BlockId, ConnectionId, ModuleId, RuntimeSpec};

use crate::ModuleGraph;

/// One de-duplicated target of a block: the referenced module, the merged
/// activation state of every connection to it, and those connections (kept
/// so skipped targets can be re-evaluated when a group's runtime grows).
#[derive(Debug, Clone)]
pub(crate) struct BlockModule {
  pub module: ModuleId,
  pub active_state: ActiveState,
  pub connections: Vec<ConnectionId>,
}

/// Past this many distinct targets a block switches from linear-scan
/// de-duplication to an index-assisted lookup, keeping the amortized cost
/// near-linear for blocks with very large fan-out.
const INDEX_MAP_THRESHOLD: usize = 16;

/// Cache of per-block target lists, keyed by runtime. The fixed-point loop
/// queries the same blocks repeatedly, so results are extracted once per
/// (module, runtime) and shared.
#[derive(Debug, Default)]
pub(crate) struct BlockModulesCache {
  by_runtime: FxHashMap<RuntimeSpec, RuntimeEntry>,
}

#[derive(Debug, Default)]
struct RuntimeEntry {
  extracted: FxHashSet<ModuleId>,
  by_block: FxHashMap<BlockId, Rc<Vec<BlockModule>>>,
}

impl BlockModulesCache {
  pub fn get(
    &mut self,
    graph: &ModuleGraph,
    block: BlockId,
    runtime: &RuntimeSpec,
  ) -> Rc<Vec<BlockModule>> {
    let owner = graph.block(block).owner();
    let entry = self.by_runtime.entry(runtime.clone()).or_default();
    if entry.extracted.insert(owner) {
      extract_block_modules(graph, owner, runtime, entry);
    }
    entry
      .by_block
      .get(&block)
      .cloned()
      .unwrap_or_else(|| Rc::new(vec![]))
  }
}

/// Fills `entry` with the target lists of every block of `module`, nested
/// async boundaries included, so empty blocks are cached too.
fn extract_block_modules(
  graph: &ModuleGraph,
  module: ModuleId,
  runtime: &RuntimeSpec,
  entry: &mut RuntimeEntry,
) {
  let mut block_ids = vec![];
  let mut stack = vec![graph.module(module).root_block()];
  while let Some(block) = stack.pop() {
    block_ids.push(block);
    stack.extend(graph.block(block).blocks().iter().copied());
  }

  // One slot per dependency position keeps declaration order intact even
  // though connections are iterated in resolution order.
  let mut slots: FxHashMap<BlockId, Vec<Option<(ModuleId, ActiveState, ConnectionId)>>> = block_ids
    .iter()
    .map(|&block| (block, vec![None; graph.block(block).dependencies().len()]))
    .collect();

  for &connection_id in graph.module(module).outgoing_connections() {
    let connection = graph.connection(connection_id);
    let dependency = graph.dependency(connection.dependency);
    if dependency.weak() {
      continue;
    }
    let Some(position) = graph.position_in_block(connection.dependency) else {
      continue;
    };
    let state = graph.active_state_of_connection(connection_id, runtime);
    if let Some(block_slots) = slots.get_mut(&dependency.block()) {
      block_slots[position] = Some((connection.module, state, connection_id));
    }
  }

  for block_id in block_ids {
    let filled = slots.remove(&block_id).unwrap_or_default();
    let mut modules: Vec<BlockModule> = vec![];
    let mut index_map: Option<FxHashMap<ModuleId, usize>> = None;
    for (target, state, connection) in filled.into_iter().flatten() {
      let existing = match &index_map {
        Some(map) => map.get(&target).copied(),
        None => modules.iter().position(|entry| entry.module == target),
      };
      match existing {
        Some(i) => {
          modules[i].active_state = modules[i].active_state.merge(state);
          modules[i].connections.push(connection);
        }
        None => {
          if index_map.is_none() && modules.len() >= INDEX_MAP_THRESHOLD {
            index_map = Some(
              modules
                .iter()
                .enumerate()
                .map(|(i, entry)| (entry.module, i))
                .collect(),
            );
          }
          if let Some(map) = &mut index_map {
            map.insert(target, modules.len());
          }
          modules.push(BlockModule {
            module: target,
            active_state: state,
            connections: vec![connection],
          });
        }
      }
    }
    entry.by_block.insert(block_id, Rc::new(modules));
  }
}

#[cfg(test)]
mod tests {
  use strata_common::{ActiveState, RuntimeSpec};

  use super::{BlockModulesCache, INDEX_MAP_THRESHOLD};
  use crate::{DependencyCondition, ModuleGraph};

  #[test]
  fn merges_duplicate_targets_preserving_declaration_order() {
    let mut graph = ModuleGraph::new();
    let a = graph.add_module("a");
    let b = graph.add_module("b");
    let c = graph.add_module("c");
    let root = graph.root_block_of(a);

    let to_b = graph.add_dependency(root, DependencyCondition::True, false);
    let to_c = graph.add_dependency(
      root,
      DependencyCondition::Fn(Box::new(|_| ActiveState::Transitive)),
      false,
    );
    let to_b_again = graph.add_dependency(
      root,
      DependencyCondition::Fn(Box::new(|_| ActiveState::Transitive)),
      false,
    );
    graph.resolve_dependency(to_b, b);
    graph.resolve_dependency(to_c, c);
    graph.resolve_dependency(to_b_again, b);

    let mut cache = BlockModulesCache::default();
    let runtime = RuntimeSpec::of("main");
    let modules = cache.get(&graph, root, &runtime);

    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].module, b);
    assert_eq!(modules[0].active_state, ActiveState::Always);
    assert_eq!(modules[0].connections.len(), 2);
    assert_eq!(modules[1].module, c);
    assert_eq!(modules[1].active_state, ActiveState::Transitive);
  }

  #[test]
  fn weak_dependencies_are_skipped() {
    let mut graph = ModuleGraph::new();
    let a = graph.add_module("a");
    let b = graph.add_module("b");
    let root = graph.root_block_of(a);
    let weak = graph.add_dependency(root, DependencyCondition::True, true);
    graph.resolve_dependency(weak, b);

    let mut cache = BlockModulesCache::default();
    let runtime = RuntimeSpec::of("main");
    assert!(cache.get(&graph, root, &runtime).is_empty());
  }

  #[test]
  fn large_fanout_switches_to_index_lookup() {
    let mut graph = ModuleGraph::new();
    let origin = graph.add_module("origin");
    let root = graph.root_block_of(origin);
    let count = INDEX_MAP_THRESHOLD * 2 + 1;
    let mut targets = vec![];
    for i in 0..count {
      let target = graph.add_module(format!("target/{i}"));
      let dep = graph.add_dependency(root, DependencyCondition::True, false);
      graph.resolve_dependency(dep, target);
      targets.push(target);
    }
    // A late duplicate must still merge into the first occurrence.
    let dup = graph.add_dependency(root, DependencyCondition::True, false);
    graph.resolve_dependency(dup, targets[0]);

    let mut cache = BlockModulesCache::default();
    let runtime = RuntimeSpec::of("main");
    let modules = cache.get(&graph, root, &runtime);
    assert_eq!(modules.len(), count);
    assert_eq!(modules[0].connections.len(), 2);
    let order: Vec<_> = modules.iter().map(|entry| entry.module).collect();
    assert_eq!(order, targets);
  }
}
