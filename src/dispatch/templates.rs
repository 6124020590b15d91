//! 回复文案

use crate::config::RepliesSection;

#[derive(Debug, Clone)]
pub struct ReplyTemplates {
    introduction: String,
    error_notice: String,
}

impl ReplyTemplates {
    pub fn new(introduction: impl Into<String>, error_notice: impl Into<String>) -> Self {
        Self {
            introduction: introduction.into(),
            error_notice: error_notice.into(),
        }
    }

    pub fn from_config(cfg: &RepliesSection) -> Self {
        Self::new(cfg.introduction.clone(), cfg.error_notice.clone())
    }

    /// 自我介绍回复
    pub fn introduction(&self, handle: &str) -> String {
        format!("@{} {}", handle, self.introduction)
    }

    /// 转换结果只 @ 作者，内容全在图片里
    pub fn transform(&self, handle: &str) -> String {
        format!("@{}", handle)
    }

    /// 转换失败时的致歉回复
    pub fn error_notice(&self, handle: &str) -> String {
        format!("@{} {}", handle, self.error_notice)
    }
}

impl Default for ReplyTemplates {
    fn default() -> Self {
        Self::from_config(&RepliesSection::default())
    }
}
