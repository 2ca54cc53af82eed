// ==========================================
// 社区生鲜速达 - 通知分发
// ==========================================
// 职责: 定义通知分发 trait, 实现依赖倒置
// 说明: 核心只负责"发出"结构化消息; 推送/短信/邮件等传输
//       通道是外部协作方的事情
// 红线: 通知失败绝不回滚触发它的订单变更 (fire-and-forget)
// ==========================================

use crate::domain::order::Notification;
use crate::repository::NotificationRepository;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// 通知消息
// ==========================================

/// 结构化通知消息
///
/// 核心层发出的最小载荷, 由分发实现决定落库还是外推
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// 接收用户
    pub user_id: String,
    /// 标题
    pub title: String,
    /// 正文
    pub message: String,
    /// 关联订单
    pub order_id: Option<String>,
}

impl NotificationMessage {
    /// 构造订单相关通知
    pub fn for_order(user_id: &str, title: &str, message: String, order_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
            message,
            order_id: Some(order_id.to_string()),
        }
    }
}

// ==========================================
// 通知分发 Trait
// ==========================================

/// 通知分发者 Trait
///
/// 核心层定义, 基础设施层实现
/// 通过 trait 解除核心对具体通知通道的依赖
pub trait NotificationDispatcher: Send + Sync {
    /// 分发一条通知
    fn notify(&self, message: NotificationMessage) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作分发者
///
/// 用于不需要通知的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpDispatcher;

impl NotificationDispatcher for NoOpDispatcher {
    fn notify(&self, message: NotificationMessage) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpDispatcher: 跳过通知分发 - user_id={}, title={}",
            message.user_id,
            message.title
        );
        Ok(())
    }
}

/// 落库分发者
///
/// 默认实现: 通知写入 notifications 表, 传输通道由外部服务轮询消费
pub struct RepositoryDispatcher {
    repo: Arc<NotificationRepository>,
}

impl RepositoryDispatcher {
    /// 创建落库分发者
    pub fn new(repo: Arc<NotificationRepository>) -> Self {
        Self { repo }
    }
}

impl NotificationDispatcher for RepositoryDispatcher {
    fn notify(&self, message: NotificationMessage) -> Result<(), Box<dyn Error + Send + Sync>> {
        let notification = Notification {
            notification_id: Uuid::new_v4().to_string(),
            user_id: message.user_id,
            title: message.title,
            message: message.message,
            order_id: message.order_id,
            read_flag: false,
            created_at: Utc::now(),
        };
        self.repo.insert(&notification).map_err(|e| Box::new(e) as _)
    }
}

// ==========================================
// 可选分发者包装
// ==========================================

/// 可选的通知分发者包装
///
/// 简化 Option<Arc<dyn NotificationDispatcher>> 的使用;
/// 分发失败只告警不上抛, 保证订单变更不被通知连累
pub struct OptionalDispatcher {
    inner: Option<Arc<dyn NotificationDispatcher>>,
}

impl OptionalDispatcher {
    /// 创建带分发者的实例
    pub fn with_dispatcher(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            inner: Some(dispatcher),
        }
    }

    /// 创建空实例（不分发通知）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 尽力分发（失败只记录, 不上抛）
    pub fn notify_best_effort(&self, message: NotificationMessage) {
        match &self.inner {
            Some(dispatcher) => {
                if let Err(e) = dispatcher.notify(message.clone()) {
                    tracing::warn!(
                        "通知分发失败（不回滚业务变更）: user_id={}, title={}, err={}",
                        message.user_id,
                        message.title,
                        e
                    );
                }
            }
            None => {
                tracing::debug!(
                    "OptionalDispatcher: 未配置分发者, 跳过通知 - user_id={}, title={}",
                    message.user_id,
                    message.title
                );
            }
        }
    }

    /// 检查是否配置了分发者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalDispatcher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_dispatcher_ok() {
        let dispatcher = NoOpDispatcher;
        let message = NotificationMessage::for_order("U001", "测试", "正文".to_string(), "O001");
        assert!(dispatcher.notify(message).is_ok());
    }

    #[test]
    fn test_optional_dispatcher_none_is_silent() {
        let dispatcher = OptionalDispatcher::none();
        assert!(!dispatcher.is_configured());
        // 未配置时不 panic, 不报错
        dispatcher.notify_best_effort(NotificationMessage::for_order(
            "U001",
            "测试",
            "正文".to_string(),
            "O001",
        ));
    }
}
