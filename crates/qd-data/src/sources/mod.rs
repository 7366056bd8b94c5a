pub mod json_file;
pub mod memory;

pub use json_file::JsonFileService;
pub use memory::MemoryService;
