use std::{collections::BTreeSet, fmt, sync::Arc};

/// The set of runtime execution contexts a chunk or chunk group executes
/// under. Entrypoints introduce runtimes; chunks shared between groups
/// accumulate them.
///
/// Internally an ordered set of interned names, so equality, hashing and
/// iteration order are stable across runs.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeSpec(BTreeSet<Arc<str>>);

impl RuntimeSpec {
  pub fn of(name: &str) -> Self {
    Self(BTreeSet::from([Arc::from(name)]))
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.contains(name)
  }

  /// Adds every runtime of `other`. Returns whether the set grew.
  pub fn merge(&mut self, other: &RuntimeSpec) -> bool {
    let before = self.0.len();
    for name in &other.0 {
      if !self.0.contains(name.as_ref()) {
        self.0.insert(Arc::clone(name));
      }
    }
    self.0.len() != before
  }

  pub fn union(a: &RuntimeSpec, b: &RuntimeSpec) -> RuntimeSpec {
    let mut merged = a.clone();
    merged.merge(b);
    merged
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(|name| name.as_ref())
  }
}

impl fmt::Display for RuntimeSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for name in self.iter() {
      if !first {
        write!(f, "+")?;
      }
      first = false;
      write!(f, "{name}")?;
    }
    Ok(())
  }
}

impl fmt::Debug for RuntimeSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "RuntimeSpec({self})")
  }
}

#[cfg(test)]
mod tests {
  use super::RuntimeSpec;

  #[test]
  fn merge_reports_growth() {
    let mut runtime = RuntimeSpec::of("main");
    assert!(!runtime.merge(&RuntimeSpec::of("main")));
    assert!(runtime.merge(&RuntimeSpec::of("worker")));
    assert_eq!(runtime.to_string(), "main+worker");
    assert_eq!(runtime.len(), 2);
  }

  #[test]
  fn union_is_order_independent() {
    let a = RuntimeSpec::union(&RuntimeSpec::of("b"), &RuntimeSpec::of("a"));
    let b = RuntimeSpec::union(&RuntimeSpec::of("a"), &RuntimeSpec::of("b"));
    assert_eq!(a, b);
    assert_eq!(a.to_string(), "a+b");
  }
}
