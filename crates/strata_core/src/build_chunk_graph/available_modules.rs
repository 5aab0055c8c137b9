use std::rc::Rc;

use rustc_hash::FxHashSet;
use strata_common::ModuleId;

/// The modules guaranteed already loaded by the time a chunk group
/// executes.
///
/// Two-level representation for cheap structural sharing: a `base` set plus
/// an `overflow` set on top, both behind `Rc`. Forking a group's set costs
/// only the delta, not a full copy. The base may only be mutated in place
/// while the owning group's ownership flag says no other group references
/// it; the overflow is always treated as shared.
#[derive(Debug, Clone, Default)]
pub(crate) struct AvailableModules {
  base: Rc<FxHashSet<ModuleId>>,
  overflow: Rc<FxHashSet<ModuleId>>,
}

impl AvailableModules {
  pub fn empty() -> Self {
    Default::default()
  }

  pub fn from_set(base: FxHashSet<ModuleId>) -> Self {
    Self {
      base: Rc::new(base),
      overflow: Default::default(),
    }
  }

  pub fn with_overflow(base: FxHashSet<ModuleId>, overflow: Rc<FxHashSet<ModuleId>>) -> Self {
    Self {
      base: Rc::new(base),
      overflow,
    }
  }

  pub fn contains(&self, module: ModuleId) -> bool {
    self.base.contains(&module) || self.overflow.contains(&module)
  }

  /// Approximate size used for merge ordering; the two levels may overlap.
  pub fn size_hint(&self) -> usize {
    self.base.len() + self.overflow.len()
  }

  pub fn base(&self) -> &Rc<FxHashSet<ModuleId>> {
    &self.base
  }

  pub fn overflow(&self) -> &Rc<FxHashSet<ModuleId>> {
    &self.overflow
  }

  /// Intersects `self` with `other`, mutating the base in place. Only legal
  /// while the caller exclusively owns the set. Returns whether the set of
  /// available modules actually shrank.
  pub fn intersect_in_place(&mut self, other: &AvailableModules) -> bool {
    if Rc::ptr_eq(&self.overflow, &other.overflow) {
      // Identical overflow on both sides: it survives the intersection
      // untouched, only the bases need intersecting.
      let overflow = Rc::clone(&self.overflow);
      let base = Rc::make_mut(&mut self.base);
      let mut changed = false;
      base.retain(|&module| {
        if other.base.contains(&module) {
          return true;
        }
        // A module kept alive by the shared overflow may leave the base
        // without the set shrinking.
        if !overflow.contains(&module) {
          changed = true;
        }
        false
      });
      changed
    } else {
      // Differing overflows: fold everything into one base so it can be
      // filtered.
      let mut folded: FxHashSet<ModuleId> =
        self.base.iter().chain(self.overflow.iter()).copied().collect();
      let before = folded.len();
      folded.retain(|&module| other.contains(module));
      let changed = folded.len() != before;
      self.base = Rc::new(folded);
      self.overflow = Default::default();
      changed
    }
  }

  /// Intersection that leaves `self` untouched, for sets referenced by more
  /// than one group. Returns the forked result and whether it is smaller
  /// than `self`.
  pub fn intersect_forked(&self, other: &AvailableModules) -> (AvailableModules, bool) {
    if Rc::ptr_eq(&self.overflow, &other.overflow) {
      let mut fresh = FxHashSet::default();
      let mut changed = false;
      for &module in self.base.iter() {
        if other.base.contains(&module) {
          fresh.insert(module);
        } else if !self.overflow.contains(&module) {
          changed = true;
        }
      }
      (
        AvailableModules {
          base: Rc::new(fresh),
          overflow: Rc::clone(&self.overflow),
        },
        changed,
      )
    } else {
      let mut fresh = FxHashSet::default();
      let mut changed = false;
      for &module in self.base.iter().chain(self.overflow.iter()) {
        if other.contains(module) {
          fresh.insert(module);
        } else {
          changed = true;
        }
      }
      (
        AvailableModules {
          base: Rc::new(fresh),
          overflow: Default::default(),
        },
        changed,
      )
    }
  }

  /// Union of several already-computed sets, used when an entrypoint
  /// combines the availability of the entrypoints it depends on. The
  /// largest contribution stays shared as the overflow level.
  pub fn union<'a>(parts: impl Iterator<Item = &'a AvailableModules>) -> AvailableModules {
    let mut base: FxHashSet<ModuleId> = FxHashSet::default();
    let mut overflow: Rc<FxHashSet<ModuleId>> = Default::default();
    for part in parts {
      fold_level(&mut base, &mut overflow, &part.base);
      fold_level(&mut base, &mut overflow, &part.overflow);
    }
    AvailableModules {
      base: Rc::new(base),
      overflow,
    }
  }
}

fn fold_level(
  base: &mut FxHashSet<ModuleId>,
  overflow: &mut Rc<FxHashSet<ModuleId>>,
  level: &Rc<FxHashSet<ModuleId>>,
) {
  if level.len() > overflow.len() {
    base.extend(overflow.iter().copied());
    *overflow = Rc::clone(level);
  } else {
    base.extend(level.iter().copied());
  }
}
