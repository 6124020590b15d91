//! 状态定义：主循环阶段与单轮报告
//!
//! CycleReport 是一轮 Fetching → Classifying → Acting 的投影，供日志与测试断言使用。

use serde::Serialize;

use crate::dispatch::{ResponseKind, ResponseOutcome};
use crate::mention::MentionId;

/// 主循环阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LoopPhase {
    Fetching,
    Classifying,
    Acting,
    Resting,
}

/// 单轮处理结果
#[derive(Clone, Debug, Default, Serialize)]
pub struct CycleReport {
    /// 本轮拉取到的提及数
    pub fetched: usize,
    /// 分类后需要响应的提及数
    pub actionable: usize,
    /// 本轮是否处于首次启动（无游标）模式
    pub bootstrap: bool,
    /// 按处理顺序记录的 (提及 id, 结果)
    pub responses: Vec<(MentionId, ResponseOutcome)>,
    /// 空闲时是否发出了主动推文
    pub unsolicited: Option<ResponseOutcome>,
}

impl CycleReport {
    pub fn sent_count(&self, kind: ResponseKind) -> usize {
        self.responses
            .iter()
            .filter(|(_, outcome)| outcome.kind() == Some(kind))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.responses
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ResponseOutcome::Failed(_)))
            .count()
    }
}
