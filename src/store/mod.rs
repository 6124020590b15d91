//! 游标持久化：记录已完整处理的最大提及 id，使重启后可幂等续跑
//!
//! CursorStore 负责单调性（只增不减、重复 advance 无副作用），CursorSlot 只负责读写一个可选整数。

pub mod slot;

use crate::core::BotError;
use crate::mention::MentionId;

pub use slot::{CursorSlot, FileSlot, MemorySlot};

/// 游标存储：持有当前值并通过 CursorSlot 持久化
pub struct CursorStore {
    slot: Box<dyn CursorSlot>,
    current: Option<MentionId>,
}

impl CursorStore {
    /// 创建游标存储；需调用 load 读取已持久化的值
    pub fn new(slot: impl CursorSlot + 'static) -> Self {
        Self {
            slot: Box::new(slot),
            current: None,
        }
    }

    /// 启动时读取持久化的游标；None 表示首次运行（bootstrap 模式）
    pub async fn load(&mut self) -> Result<Option<MentionId>, BotError> {
        self.current = self.slot.read().await?.map(MentionId);
        Ok(self.current)
    }

    /// 内存中的当前游标（不访问存储）
    pub fn current(&self) -> Option<MentionId> {
        self.current
    }

    /// 将游标推进到 id；id 不大于当前值时不写盘。写盘失败为致命错误。
    pub async fn advance(&mut self, id: MentionId) -> Result<(), BotError> {
        if self.current.is_some_and(|cur| id <= cur) {
            return Ok(());
        }
        self.slot.write(id.0).await?;
        self.current = Some(id);
        tracing::debug!(cursor = %id, "cursor advanced");
        Ok(())
    }
}
