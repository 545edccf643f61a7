//! 带 LRU 缓存的 Prompt 渲染器
//!
//! 未命中时从 TemplateSource 加载并编译，命中时复用编译结果；容量满时淘汰最久未使用的条目。
//! 查找、加载、编译、插入在同一把锁内完成，同一 id 在两次 clear 之间至多编译一次。
//! 代价是未命中时的来源 IO（如读文件）也在锁内进行，期间其他渲染（包括命中）都要等待。

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use serde_json::Value;

use crate::core::SdkError;
use crate::prompt::{CompiledTemplate, FileSystemSource, TemplateSource};

/// 默认缓存容量
pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// 缓存统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

struct CacheState {
    entries: LruCache<String, Arc<CompiledTemplate>>,
    hits: u64,
    misses: u64,
}

/// Prompt 渲染器
pub struct PromptRenderer {
    source: Box<dyn TemplateSource>,
    cache: Mutex<CacheState>,
}

impl PromptRenderer {
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self::with_capacity(source, DEFAULT_CACHE_CAPACITY)
    }

    /// 指定容量；0 按 1 处理
    pub fn with_capacity(source: impl TemplateSource + 'static, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source: Box::new(source),
            cache: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// 以目录为模板根的渲染器
    pub fn from_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(FileSystemSource::new(base_dir))
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 取编译结果（必要时加载并编译）
    pub fn compiled(&self, template_id: &str) -> Result<Arc<CompiledTemplate>, SdkError> {
        let mut state = self.state();
        if let Some(hit) = state.entries.get(template_id) {
            let hit = Arc::clone(hit);
            state.hits += 1;
            return Ok(hit);
        }
        state.misses += 1;

        let text = self.source.load(template_id)?;
        let compiled = Arc::new(CompiledTemplate::compile(template_id, &text)?);
        tracing::debug!(template = template_id, "prompt template compiled");

        if let Some((evicted, _)) = state
            .entries
            .push(template_id.to_string(), Arc::clone(&compiled))
        {
            if evicted != template_id {
                tracing::debug!(template = %evicted, "prompt template evicted");
            }
        }
        Ok(compiled)
    }

    /// 渲染模板
    pub fn render(&self, template_id: &str, variables: &Value) -> Result<String, SdkError> {
        self.compiled(template_id)?.render(variables)
    }

    /// 清空缓存（统计计数保留）
    pub fn clear(&self) {
        self.state().entries.clear();
    }

    /// 是否已缓存（不影响 LRU 顺序）
    pub fn contains(&self, template_id: &str) -> bool {
        self.state().entries.peek(template_id).is_some()
    }

    pub fn cache_info(&self) -> CacheInfo {
        let state = self.state();
        CacheInfo {
            hits: state.hits,
            misses: state.misses,
            size: state.entries.len(),
            capacity: state.entries.cap().get(),
        }
    }
}
