//! 模板后端存储
//!
//! TemplateSource 按 id 返回模板原文；找不到时返回 PromptNotFound，与编译/渲染错误区分。

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::core::SdkError;

/// 模板来源：按 id 加载原文
pub trait TemplateSource: Send + Sync {
    fn load(&self, id: &str) -> Result<String, SdkError>;
}

/// 文件系统来源：相对 id 解析到 base_dir 下，绝对路径原样使用
#[derive(Debug, Clone)]
pub struct FileSystemSource {
    base_dir: PathBuf,
}

impl FileSystemSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 解析 id 为文件路径；相对 id 不得通过 `..` 跳出 base_dir
    pub fn resolve(&self, id: &str) -> Result<PathBuf, SdkError> {
        let candidate = Path::new(id);
        if candidate.is_absolute() {
            return Ok(candidate.to_path_buf());
        }
        let mut depth: i32 = 0;
        for component in candidate.components() {
            match component {
                Component::ParentDir => depth -= 1,
                Component::Normal(_) => depth += 1,
                _ => {}
            }
            if depth < 0 {
                return Err(SdkError::input_validation(format!(
                    "Template path escapes template directory: {id}"
                ))
                .with_context("template", id)
                .with_context("base_dir", self.base_dir.display().to_string()));
            }
        }
        Ok(self.base_dir.join(candidate))
    }
}

impl TemplateSource for FileSystemSource {
    fn load(&self, id: &str) -> Result<String, SdkError> {
        let path = self.resolve(id)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(SdkError::prompt_not_found(
                format!("Template not found: {id}"),
            )
            .with_context("template", id)
            .with_context("path", path.display().to_string())),
            Err(e) => Err(SdkError::prompt_not_found(format!("Template unreadable: {id}"))
                .with_context("template", id)
                .with_context("path", path.display().to_string())
                .with_source(e)),
        }
    }
}

/// 内存来源：name → 模板原文
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    templates: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(id.into(), text.into());
    }
}

impl TemplateSource for MemorySource {
    fn load(&self, id: &str) -> Result<String, SdkError> {
        self.templates.get(id).cloned().ok_or_else(|| {
            SdkError::prompt_not_found(format!("Template not found: {id}"))
                .with_context("template", id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    #[test]
    fn test_memory_source_lookup() {
        let source = MemorySource::new().with_template("a", "hello");
        assert_eq!(source.load("a").unwrap(), "hello");
        assert!(source.load("b").unwrap_err().is(ErrorKind::PromptNotFound));
    }

    #[test]
    fn test_filesystem_source_reads_relative_and_absolute() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let file = dir.path().join("nested").join("t.txt");
        std::fs::write(&file, "body").unwrap();

        let source = FileSystemSource::new(dir.path());
        assert_eq!(source.load("nested/t.txt").unwrap(), "body");
        assert_eq!(source.load(file.to_str().unwrap()).unwrap(), "body");
        assert_eq!(source.load("nested/../nested/t.txt").unwrap(), "body");
    }

    #[test]
    fn test_filesystem_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSystemSource::new(dir.path()).load("nope.txt").unwrap_err();
        assert!(err.is(ErrorKind::PromptNotFound));
        assert!(err.to_string().contains("Template not found"));
    }

    #[test]
    fn test_filesystem_source_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSystemSource::new(dir.path())
            .load("../outside.txt")
            .unwrap_err();
        assert!(err.is(ErrorKind::InputValidation));
    }
}
