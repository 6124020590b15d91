//! Mondrian Bot - 推特提及自动回复机器人
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与退避、时钟、主循环监管、优雅关闭
//! - **dispatch**: 单条提及的响应流程与回复文案
//! - **media**: 下载提及中的图片并规整为 JPEG
//! - **mention**: 提及模型与分类
//! - **observability**: 日志初始化
//! - **pacing**: 发推节流
//! - **pipeline**: 外部图像转换流水线
//! - **platform**: 推特接口抽象（搜索、上传、发推）与实现
//! - **schedule**: 空闲时段的主动发推调度
//! - **store**: 游标持久化

pub mod config;
pub mod core;
pub mod dispatch;
pub mod media;
pub mod mention;
pub mod observability;
pub mod pacing;
pub mod pipeline;
pub mod platform;
pub mod schedule;
pub mod store;
