//! Mock 流水线（用于测试）：记录调用模式，返回固定的四个产物路径或注入的错误

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::BotError;
use crate::pipeline::{TransformMode, TransformPipeline, ARTIFACT_NAMES};

#[derive(Debug, Default)]
pub struct MockPipeline {
    failures: Mutex<VecDeque<BotError>>,
    calls: Mutex<Vec<TransformMode>>,
}

impl MockPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, err: BotError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(err);
    }

    pub fn calls(&self) -> Vec<TransformMode> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl TransformPipeline for MockPipeline {
    async fn transform(&self, mode: &TransformMode) -> Result<Vec<PathBuf>, BotError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(mode.clone());
        if let Some(err) = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            return Err(err);
        }
        Ok(ARTIFACT_NAMES
            .iter()
            .map(|name| PathBuf::from("output").join(name))
            .collect())
    }
}
