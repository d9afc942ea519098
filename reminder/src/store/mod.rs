mod memory;

pub use memory::MemoryWorkflowStore;
