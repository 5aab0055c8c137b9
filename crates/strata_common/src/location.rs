use std::fmt;

/// Line/column provenance of an async boundary, carried through to
/// diagnostics so configuration conflicts can point at their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyLocation {
  pub line: u32,
  pub column: u32,
}

impl DependencyLocation {
  pub fn new(line: u32, column: u32) -> Self {
    Self { line, column }
  }
}

impl fmt::Display for DependencyLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}
