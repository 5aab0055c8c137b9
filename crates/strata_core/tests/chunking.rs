use strata_common::ActiveState;
use strata_core::{DependencyCondition, GroupOptions};

mod common;
use common::{render, TestGraph};

#[test]
fn single_entry_single_chunk() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  t.dep("a", "b");
  t.dep("b", "c");
  t.dep("a", "c");

  let chunks = t.build();
  assert_eq!(chunks.chunk_groups().count(), 1);
  assert_eq!(chunks.chunks().count(), 1);
  assert_eq!(t.modules_of(&chunks, "main"), ["a", "b", "c"]);
  assert!(chunks.diagnostics.is_empty());
}

#[test]
fn dynamic_import_creates_a_chunk() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  t.dep("a", "c");
  t.async_dep("a", "l", Some("lazy"));
  t.dep("l", "c");

  let chunks = t.build();
  // The lazy chunk excludes `c`: it is already guaranteed loaded by the
  // entry by the time the boundary can run.
  insta::assert_snapshot!(render(&t.graph, &chunks), @r###"
group main (entry) parents=[] children=[lazy]
  chunk main runtime=main modules=[a, c] entry=[a]
group lazy (dynamic) parents=[main] children=[]
  chunk lazy runtime=main modules=[l]
"###);
}

#[test]
fn modules_available_from_the_entry_are_not_duplicated() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  t.dep("a", "m");
  let block = t.async_dep("a", "d", None);
  t.dep("d", "m");

  let chunks = t.build();
  let lazy = chunks.chunk_group_for_block(block).expect("boundary group");
  let lazy_chunk = chunks.chunk_group(lazy).entry_chunk();
  assert_eq!(t.requests_of(&chunks, lazy_chunk), ["d"]);
  // `m` lives in exactly one chunk.
  assert_eq!(chunks.chunks_of_module(t.id_of("m")).count(), 1);
}

#[test]
fn shared_name_resolves_to_one_group() {
  let mut t = TestGraph::new();
  t.entry("e1", &["a"]);
  t.entry("e2", &["b"]);
  t.dep("a", "x");
  t.async_dep("a", "s", Some("shared"));
  t.async_dep("b", "s", Some("shared"));
  t.dep("s", "x");

  let chunks = t.build();
  insta::assert_snapshot!(render(&t.graph, &chunks), @r###"
group e1 (entry) parents=[] children=[shared]
  chunk e1 runtime=e1 modules=[a, x] entry=[a]
group e2 (entry) parents=[] children=[shared]
  chunk e2 runtime=e2 modules=[b] entry=[b]
group shared (dynamic) parents=[e1, e2] children=[]
  chunk shared runtime=e1+e2 modules=[s, x]
"###);
  // `x` stays in the shared chunk: only one of the two parent paths
  // guarantees it, so the intersection does not.
  assert_eq!(t.modules_of(&chunks, "shared"), ["s", "x"]);
}

#[test]
fn async_boundary_naming_an_entry_degrades() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  t.entry("second", &["b"]);
  t.async_dep("b", "c", Some("main"));

  let chunks = t.build();
  assert_eq!(chunks.diagnostics.len(), 1);
  assert_eq!(chunks.diagnostics[0].code(), "ASYNC_DEPENDENCY_TO_INITIAL_CHUNK");
  // The dependency is included synchronously in the requesting chunk.
  assert_eq!(t.modules_of(&chunks, "second"), ["b", "c"]);
  assert_eq!(chunks.chunk_groups().count(), 2);
}

#[test]
fn disabled_async_chunks_inline_the_boundary() {
  let mut t = TestGraph::new();
  t.entry_with(
    "main",
    &["a"],
    strata_core::EntryOptions {
      async_chunks: Some(false),
      ..Default::default()
    },
  );
  t.async_dep("a", "l", Some("lazy"));

  let chunks = t.build();
  assert_eq!(chunks.chunk_groups().count(), 1);
  assert_eq!(t.modules_of(&chunks, "main"), ["a", "l"]);
  assert!(chunks.chunk_group_by_name("lazy").is_none());
  assert!(chunks.diagnostics.is_empty());
}

#[test]
fn never_active_boundary_leaves_no_group_behind() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  let block = t.async_block("a", GroupOptions::default());
  t.block_dep_with(block, "x", DependencyCondition::False, false);

  let chunks = t.build();
  // The speculatively created group gained no parents and was deleted.
  assert_eq!(chunks.chunk_groups().count(), 1);
  assert_eq!(chunks.chunks().count(), 1);
  assert!(chunks.chunk_group_for_block(block).is_none());
  assert_eq!(chunks.chunks_of_module(t.id_of("x")).count(), 0);
}

#[test]
fn weak_dependencies_do_not_force_loading() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  t.weak_dep("a", "w");

  let chunks = t.build();
  assert_eq!(t.modules_of(&chunks, "main"), ["a"]);
  assert_eq!(chunks.chunks_of_module(t.id_of("w")).count(), 0);
}

#[test]
fn transitive_only_connections_skip_the_module_but_not_its_deps() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  t.dep_with(
    "a",
    "t",
    DependencyCondition::Fn(Box::new(|_| ActiveState::Transitive)),
    false,
  );
  t.dep("t", "u");

  let chunks = t.build();
  assert_eq!(t.modules_of(&chunks, "main"), ["a", "u"]);
  assert_eq!(chunks.chunks_of_module(t.id_of("t")).count(), 0);
  assert!(chunks.module_pre_order_index(t.id_of("t")).is_none());
  assert!(chunks.module_pre_order_index(t.id_of("u")).is_some());
}

#[test]
fn dependency_cycles_terminate() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  t.dep("a", "b");
  t.dep("b", "a");

  let chunks = t.build();
  assert_eq!(t.modules_of(&chunks, "main"), ["a", "b"]);
  assert_eq!(chunks.module_pre_order_index(t.id_of("a")), Some(0));
  assert_eq!(chunks.module_pre_order_index(t.id_of("b")), Some(1));
  assert_eq!(chunks.module_post_order_index(t.id_of("b")), Some(0));
  assert_eq!(chunks.module_post_order_index(t.id_of("a")), Some(1));
}

#[test]
fn declaration_order_assigns_pre_order_indices() {
  let mut t = TestGraph::new();
  t.entry("main", &["x", "y", "z"]);

  let chunks = t.build();
  assert_eq!(chunks.module_pre_order_index(t.id_of("x")), Some(0));
  assert_eq!(chunks.module_pre_order_index(t.id_of("y")), Some(1));
  assert_eq!(chunks.module_pre_order_index(t.id_of("z")), Some(2));

  let main = chunks.chunk_group_by_name("main").unwrap();
  let group = chunks.chunk_group(main);
  assert_eq!(group.module_pre_order_index(t.id_of("x")), Some(0));
  assert_eq!(group.module_pre_order_index(t.id_of("y")), Some(1));
  assert_eq!(group.module_pre_order_index(t.id_of("z")), Some(2));
}

#[test]
fn nested_boundaries_connect_their_groups() {
  let mut t = TestGraph::new();
  t.entry("main", &["a"]);
  let outer = t.async_block("a", GroupOptions::default());
  t.block_dep(outer, "l");
  let inner = t.nested_async_block(outer, GroupOptions::default());
  t.block_dep(inner, "m");

  let chunks = t.build();
  assert_eq!(chunks.chunk_groups().count(), 3);

  let outer_group = chunks.chunk_group_for_block(outer).expect("outer group");
  let inner_group = chunks.chunk_group_for_block(inner).expect("inner group");
  assert_eq!(
    chunks.chunk_group(inner_group).parents().collect::<Vec<_>>(),
    [outer_group]
  );
  assert_eq!(
    t.requests_of(&chunks, chunks.chunk_group(outer_group).entry_chunk()),
    ["l"]
  );
  assert_eq!(
    t.requests_of(&chunks, chunks.chunk_group(inner_group).entry_chunk()),
    ["m"]
  );
}
