//! 提及分类：按结构谓词（是否带媒体、是否为回复）划分响应类别
//!
//! 纯函数，无跨提及状态；同一批输入总得到同样的输出，且不含 Ignored。

use serde::Serialize;

use crate::mention::Mention;

/// 响应类别（派生，不存储）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ResponseCategory {
    /// 无媒体且不是回复：发送自我介绍
    Introduction,
    /// 至少一个 png / jpeg 媒体：转换图片并回复
    TransformRequest,
    Ignored,
}

impl ResponseCategory {
    pub fn of(mention: &Mention) -> Self {
        if mention.media.is_empty() && !mention.is_reply() {
            ResponseCategory::Introduction
        } else if mention.first_transformable_media().is_some() {
            ResponseCategory::TransformRequest
        } else {
            ResponseCategory::Ignored
        }
    }
}

/// 对一批提及分类，保持输入顺序并剔除 Ignored
pub fn classify(batch: Vec<Mention>) -> Vec<(Mention, ResponseCategory)> {
    batch
        .into_iter()
        .map(|m| {
            let category = ResponseCategory::of(&m);
            (m, category)
        })
        .filter(|(_, category)| *category != ResponseCategory::Ignored)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_mention_is_introduction() {
        let m = Mention::new(1, "alice");
        assert_eq!(ResponseCategory::of(&m), ResponseCategory::Introduction);
    }

    #[test]
    fn test_plain_reply_is_ignored() {
        let m = Mention::new(2, "alice").in_reply_to(1);
        assert_eq!(ResponseCategory::of(&m), ResponseCategory::Ignored);
    }

    #[test]
    fn test_image_reply_is_transform_request() {
        for url in ["https://x/a.png", "https://x/a.jpg", "https://x/a.jpeg"] {
            let m = Mention::new(3, "bob").in_reply_to(1).with_media(url);
            assert_eq!(ResponseCategory::of(&m), ResponseCategory::TransformRequest, "{url}");
        }
    }

    #[test]
    fn test_unsupported_media_is_ignored() {
        let m = Mention::new(4, "carol").with_media("https://x/a.gif");
        assert_eq!(ResponseCategory::of(&m), ResponseCategory::Ignored);
    }

    #[test]
    fn test_classify_scenario_batch() {
        let batch = vec![
            Mention::new(10, "m1").with_media("https://x/m1.jpg"),
            Mention::new(11, "m2"),
            Mention::new(9, "m3").with_media("https://x/m3.gif"),
        ];
        let out = classify(batch);
        let summary: Vec<_> = out.iter().map(|(m, c)| (m.id.0, *c)).collect();
        assert_eq!(
            summary,
            vec![
                (10, ResponseCategory::TransformRequest),
                (11, ResponseCategory::Introduction),
            ]
        );
    }

    #[test]
    fn test_classify_is_deterministic_and_drops_ignored() {
        let batch = vec![
            Mention::new(5, "a").with_media("https://x/a.webp"),
            Mention::new(6, "b").in_reply_to(2),
            Mention::new(7, "c").with_media("https://x/c.png"),
            Mention::new(8, "d"),
        ];
        let first = classify(batch.clone());
        let second = classify(batch);
        assert_eq!(first, second);
        assert!(first.iter().all(|(_, c)| *c != ResponseCategory::Ignored));
        assert_eq!(first.len(), 2);
    }
}
