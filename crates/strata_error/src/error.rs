use std::fmt::Display;

use strata_common::DependencyLocation;

use crate::ErrorKind;

#[derive(Debug)]
pub struct Error {
  contexts: Vec<String>,
  pub kind: ErrorKind,
}

impl PartialEq for Error {
  fn eq(&self, other: &Self) -> bool {
    self.kind.to_string().eq(&other.kind.to_string())
  }
}

impl Eq for Error {}

impl PartialOrd for Error {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Error {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self.kind.to_string().cmp(&other.kind.to_string())
  }
}

impl Error {
  fn with_kind(kind: ErrorKind) -> Self {
    Self {
      contexts: vec![],
      kind,
    }
  }

  pub fn context(mut self, context: String) -> Self {
    self.contexts.push(context);
    self
  }

  pub fn code(&self) -> &'static str {
    self.kind.code()
  }

  pub fn async_dependency_to_initial_chunk(
    chunk_name: impl Into<String>,
    module: impl Into<String>,
    loc: Option<DependencyLocation>,
  ) -> Self {
    Self::with_kind(ErrorKind::AsyncDependencyToInitialChunk {
      chunk_name: chunk_name.into(),
      module: module.into(),
      loc,
    })
  }

  pub fn depend_on_entry_not_found(
    entry: impl Into<String>,
    depend_on: impl Into<String>,
  ) -> Self {
    Self::with_kind(ErrorKind::DependOnEntryNotFound {
      entry: entry.into(),
      depend_on: depend_on.into(),
    })
  }

  pub fn mutually_dependent_entries(entry: impl Into<String>, other: impl Into<String>) -> Self {
    Self::with_kind(ErrorKind::MutuallyDependentEntries {
      entry: entry.into(),
      other: other.into(),
    })
  }

  pub fn panic(msg: String) -> Self {
    anyhow::format_err!(msg).into()
  }
}

impl std::convert::From<anyhow::Error> for Error {
  fn from(value: anyhow::Error) -> Self {
    Self::with_kind(ErrorKind::Panic { source: value })
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match &self.kind {
      ErrorKind::Panic { source, .. } => Some(source.as_ref()),
      _ => None,
    }
  }
}

impl Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    for ctx in self.contexts.iter().rev() {
      writeln!(f, "{}: {}", ansi_term::Color::Yellow.paint("context"), ctx)?;
    }

    self.kind.fmt(f)
  }
}
