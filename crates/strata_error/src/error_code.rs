pub const ASYNC_DEPENDENCY_TO_INITIAL_CHUNK: &str = "ASYNC_DEPENDENCY_TO_INITIAL_CHUNK";
pub const DEPEND_ON_ENTRY_NOT_FOUND: &str = "DEPEND_ON_ENTRY_NOT_FOUND";
pub const MUTUALLY_DEPENDENT_ENTRIES: &str = "MUTUALLY_DEPENDENT_ENTRIES";
pub const PANIC: &str = "PANIC";
