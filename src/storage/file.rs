use crate::config::expand_tilde;
use crate::error::{Result, StorageError};
use crate::storage::BlobBackend;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 基于本地目录的 Blob 存储
///
/// 路径 `users/abc/__long-memories/data.json` 映射为 `{root}/users/abc/__long-memories/data.json`，
/// 写入时自动创建父目录。含 `..` 或绝对路径的 key 会被拒绝。
pub struct FileBlobBackend {
    root: PathBuf,
}

impl FileBlobBackend {
    /// 打开或创建根目录
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = expand_tilde(root.as_ref());
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::Io(format!("创建目录失败: {e}")))?;
        info!(root = %root.display(), "🗄️ FileBlobBackend 初始化");
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(StorageError::InvalidPath(path.to_string()).into());
        }
        Ok(self.root.join(relative))
    }

    /// 同目录下每次写入独占的临时文件：`data.json` → `data.json.<pid>-<n>.tmp`
    fn temp_path(file: &Path) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = file.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}-{n}.tmp", std::process::id()));
        file.with_file_name(name)
    }
}

#[async_trait]
impl BlobBackend for FileBlobBackend {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(format!("读取 {} 失败: {e}", file.display())).into()),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(format!("创建目录失败: {e}")))?;
        }
        // 先写临时文件再改名，避免读到写了一半的文档
        let tmp = Self::temp_path(&file);
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::Io(format!("写入 {} 失败: {e}", tmp.display())).into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &file).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(path = %tmp.display(), error = %cleanup, "临时文件清理失败");
            }
            return Err(StorageError::Io(format!("重命名 {} 失败: {e}", file.display())).into());
        }
        debug!(path = %file.display(), size = bytes.len(), "💾 Blob 已写入");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let file = self.resolve(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(format!("删除 {} 失败: {e}", file.display())).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EchoError;

    #[tokio::test]
    async fn test_put_get_delete() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = FileBlobBackend::new(dir.path())?;

        assert!(backend.get("users/u1/data.json").await?.is_none());
        backend.put("users/u1/data.json", b"{}".to_vec()).await?;
        assert_eq!(backend.get("users/u1/data.json").await?, Some(b"{}".to_vec()));
        assert!(dir.path().join("users/u1/data.json").exists());

        backend.put("users/u1/data.json", b"[1]".to_vec()).await?;
        assert_eq!(backend.get("users/u1/data.json").await?, Some(b"[1]".to_vec()));

        assert!(backend.delete("users/u1/data.json").await?);
        assert!(!backend.delete("users/u1/data.json").await?);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sibling_files_do_not_share_temp_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = std::sync::Arc::new(FileBlobBackend::new(dir.path())?);
        let facts = "users/u/__long-memories/data.json";
        let profile = "users/u/__long-memories/data.txt";
        let document = br#"{"memories":[],"last_deduplicated_at":null}"#.to_vec();

        for _ in 0..100 {
            let (a, b) = (backend.clone(), backend.clone());
            let doc = document.clone();
            let json = tokio::spawn(async move { a.put(facts, doc).await });
            let text = tokio::spawn(async move { b.put(profile, b"- Name: Alice".to_vec()).await });
            json.await.unwrap()?;
            text.await.unwrap()?;

            assert_eq!(backend.get(facts).await?, Some(document.clone()));
            assert_eq!(backend.get(profile).await?, Some(b"- Name: Alice".to_vec()));
        }

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("users/u/__long-memories"))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = FileBlobBackend::new(dir.path())?;
        for bad in ["../etc/passwd", "/abs/path", "a/../../b", ""] {
            let err = backend.get(bad).await.unwrap_err();
            assert!(matches!(err, EchoError::Storage(StorageError::InvalidPath(_))), "{bad}");
        }
        Ok(())
    }
}
