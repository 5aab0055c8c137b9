/// Activation state of a connection under a concrete runtime.
///
/// Variant order matters: merging two states takes the maximum, so
/// `Always` dominates and two `Transitive` connections stay transitive.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActiveState {
  /// The connection can never become active.
  Never,
  /// Only the transitive effects of the connection are active: the target
  /// module itself is not forced into a chunk, but its dependencies are
  /// still followed.
  Transitive,
  /// The connection is unconditionally active.
  Always,
}

impl ActiveState {
  /// Combined state of several connections to the same module.
  pub fn merge(self, other: ActiveState) -> ActiveState {
    self.max(other)
  }

  pub fn is_always(self) -> bool {
    matches!(self, ActiveState::Always)
  }

  pub fn is_never(self) -> bool {
    matches!(self, ActiveState::Never)
  }
}

#[cfg(test)]
mod tests {
  use super::ActiveState;

  #[test]
  fn always_dominates() {
    assert_eq!(
      ActiveState::Never.merge(ActiveState::Always),
      ActiveState::Always
    );
    assert_eq!(
      ActiveState::Transitive.merge(ActiveState::Transitive),
      ActiveState::Transitive
    );
    assert_eq!(
      ActiveState::Never.merge(ActiveState::Transitive),
      ActiveState::Transitive
    );
  }
}
