//! Prompt 模板：编译、后端存储、带 LRU 缓存的渲染器

pub mod renderer;
pub mod source;
pub mod template;

pub use renderer::{CacheInfo, PromptRenderer, DEFAULT_CACHE_CAPACITY};
pub use source::{FileSystemSource, MemorySource, TemplateSource};
pub use template::CompiledTemplate;
