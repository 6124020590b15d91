//! 游标存储后端：文件（文本形式的十进制整数）与内存实现

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::fs;

use crate::core::BotError;

/// 单个可选整数的读写槽位，需在进程重启后保留
#[async_trait]
pub trait CursorSlot: Send + Sync {
    async fn read(&self) -> Result<Option<u64>, BotError>;

    async fn write(&self, value: u64) -> Result<(), BotError>;
}

/// 文件槽位：文件不存在或内容为空表示无游标；写入先写临时文件再 rename
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 游标文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CursorSlot for FileSlot {
    async fn read(&self) -> Result<Option<u64>, BotError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BotError::Persistence(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<u64>().map(Some).map_err(|e| {
            BotError::Persistence(format!("corrupt cursor file {}: {}", self.path.display(), e))
        })
    }

    async fn write(&self, value: u64) -> Result<(), BotError> {
        let to_err =
            |e: std::io::Error| BotError::Persistence(format!("write {}: {}", self.path.display(), e));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(to_err)?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, value.to_string()).await.map_err(to_err)?;
        fs::rename(&tmp, &self.path).await.map_err(to_err)?;
        Ok(())
    }
}

/// 内存槽位（测试用）；Clone 共享同一份数据，便于测试外部观察
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    value: Arc<Mutex<Option<u64>>>,
    writes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemorySlot {
    /// 预置一个已持久化的游标
    pub fn with_value(value: u64) -> Self {
        let slot = Self::default();
        *slot.lock() = Some(value);
        slot
    }

    pub fn value(&self) -> Option<u64> {
        *self.lock()
    }

    /// 成功写入的次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 模拟存储不可写
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<u64>> {
        self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CursorSlot for MemorySlot {
    async fn read(&self) -> Result<Option<u64>, BotError> {
        Ok(self.value())
    }

    async fn write(&self, value: u64) -> Result<(), BotError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::Persistence("memory slot is read-only".to_string()));
        }
        *self.lock() = Some(value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_slot_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileSlot::new(dir.path().join("latest_id.txt"));
        assert_eq!(slot.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_slot_empty_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest_id.txt");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(FileSlot::new(&path).read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_slot_roundtrip_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("latest_id.txt");
        FileSlot::new(&path).write(1234567890123).await.unwrap();
        assert_eq!(FileSlot::new(&path).read().await.unwrap(), Some(1234567890123));
        assert!(!dir.path().join("state").join("latest_id.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_slot_corrupt_content_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest_id.txt");
        std::fs::write(&path, "not-a-number").unwrap();
        let err = FileSlot::new(&path).read().await.unwrap_err();
        assert!(matches!(err, BotError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_file_slot_unwritable_dir_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        // 以普通文件充当父目录，create_dir_all 必然失败
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let slot = FileSlot::new(blocker.join("latest_id.txt"));
        assert!(matches!(slot.write(1).await, Err(BotError::Persistence(_))));
    }
}
