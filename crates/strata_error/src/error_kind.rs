use std::fmt::Display;

use strata_common::DependencyLocation;

use crate::error_code;

#[derive(Debug)]
pub enum ErrorKind {
  /// An async boundary's explicit name resolved to a chunk group that is
  /// already an initial (entry) chunk. The boundary degrades to synchronous
  /// inclusion in the requesting chunk.
  AsyncDependencyToInitialChunk {
    chunk_name: String,
    module: String,
    loc: Option<DependencyLocation>,
  },

  /// An entrypoint's `depend_on` names an entry that does not exist. The
  /// edge is ignored.
  DependOnEntryNotFound { entry: String, depend_on: String },

  /// Two entrypoints name each other in `depend_on`. Both edges are
  /// ignored.
  MutuallyDependentEntries { entry: String, other: String },

  /// This error means that the builder hit an unrecoverable internal error.
  ///
  /// It only exists to carry `anyhow` errors across the crate boundary and
  /// is never produced by the chunking algorithm itself.
  Panic { source: anyhow::Error },
}

impl Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ErrorKind::AsyncDependencyToInitialChunk {
        chunk_name,
        module,
        loc,
      } => {
        write!(
          f,
          r#"Chunk name "{chunk_name}" is already used by an entrypoint, which cannot be loaded on demand (requested by "{module}""#,
        )?;
        if let Some(loc) = loc {
          write!(f, " at {loc}")?;
        }
        write!(f, ")")
      }
      ErrorKind::DependOnEntryNotFound { entry, depend_on } => write!(
        f,
        r#"Entry "{entry}" depends on "{depend_on}", but this entry was not found"#
      ),
      ErrorKind::MutuallyDependentEntries { entry, other } => write!(
        f,
        r#"Entries "{entry}" and "{other}" depend on each other"#
      ),
      ErrorKind::Panic { source } => source.fmt(f),
    }
  }
}

impl ErrorKind {
  pub fn code(&self) -> &'static str {
    match self {
      ErrorKind::AsyncDependencyToInitialChunk { .. } => {
        error_code::ASYNC_DEPENDENCY_TO_INITIAL_CHUNK
      }
      ErrorKind::DependOnEntryNotFound { .. } => error_code::DEPEND_ON_ENTRY_NOT_FOUND,
      ErrorKind::MutuallyDependentEntries { .. } => error_code::MUTUALLY_DEPENDENT_ENTRIES,
      ErrorKind::Panic { .. } => error_code::PANIC,
    }
  }
}
