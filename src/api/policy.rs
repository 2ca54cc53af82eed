// ==========================================
// 社区生鲜速达 - 访问策略
// ==========================================
// 职责: 角色解析接口 (policy-as-interface)
// 说明: 原系统靠托管后端的行级安全规则兜底;
//       此处改为在每个变更操作入口显式调用策略检查
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::Role;
use crate::repository::RoleRepository;
use std::collections::HashMap;
use std::sync::Arc;

// ==========================================
// Actor - 操作主体
// ==========================================

/// 操作主体: 已解析的调用方身份
///
/// user_id 为 None 表示匿名调用, 所有变更操作一律拒绝
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<String>,
    pub role: Role,
}

impl Actor {
    /// 已登录用户
    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            role: Role::User,
        }
    }

    /// 管理员
    pub fn admin(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            role: Role::Admin,
        }
    }

    /// 配送员
    pub fn delivery_partner(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            role: Role::DeliveryPartner,
        }
    }

    /// 匿名调用方
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            role: Role::User,
        }
    }

    /// 要求已登录, 返回用户ID
    pub fn require_user(&self) -> ApiResult<&str> {
        self.user_id.as_deref().ok_or(ApiError::NotAuthenticated)
    }

    /// 要求管理员角色
    pub fn require_admin(&self, operation: &str) -> ApiResult<&str> {
        let user_id = self.require_user()?;
        if self.role != Role::Admin {
            return Err(ApiError::PermissionDenied {
                role: self.role,
                operation: operation.to_string(),
            });
        }
        Ok(user_id)
    }

    /// 要求管理员或配送员角色
    pub fn require_staff(&self, operation: &str) -> ApiResult<&str> {
        let user_id = self.require_user()?;
        if self.role == Role::User {
            return Err(ApiError::PermissionDenied {
                role: self.role,
                operation: operation.to_string(),
            });
        }
        Ok(user_id)
    }
}

// ==========================================
// AccessPolicy Trait
// ==========================================

/// 访问策略: 解析调用方的生效角色
///
/// 核心层定义, 由身份基础设施实现
pub trait AccessPolicy: Send + Sync {
    /// 查询用户的生效角色
    fn role_of(&self, user_id: &str) -> ApiResult<Role>;

    /// 把外部会话解析为操作主体
    fn resolve_actor(&self, user_id: Option<&str>) -> ApiResult<Actor> {
        match user_id {
            Some(id) => Ok(Actor {
                user_id: Some(id.to_string()),
                role: self.role_of(id)?,
            }),
            None => Ok(Actor::anonymous()),
        }
    }
}

/// 基于 user_roles / delivery_partners 表的策略实现
pub struct SqliteAccessPolicy {
    role_repo: Arc<RoleRepository>,
}

impl SqliteAccessPolicy {
    /// 创建策略实例
    pub fn new(role_repo: Arc<RoleRepository>) -> Self {
        Self { role_repo }
    }
}

impl AccessPolicy for SqliteAccessPolicy {
    fn role_of(&self, user_id: &str) -> ApiResult<Role> {
        Ok(self.role_repo.resolve_role(user_id)?)
    }
}

/// 静态映射策略（测试用）
#[derive(Debug, Clone, Default)]
pub struct StaticAccessPolicy {
    roles: HashMap<String, Role>,
}

impl StaticAccessPolicy {
    /// 创建空映射（所有人都是普通用户）
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定固定角色
    pub fn with_role(mut self, user_id: &str, role: Role) -> Self {
        self.roles.insert(user_id.to_string(), role);
        self
    }
}

impl AccessPolicy for StaticAccessPolicy {
    fn role_of(&self, user_id: &str) -> ApiResult<Role> {
        Ok(self.roles.get(user_id).copied().unwrap_or(Role::User))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_actor_rejected() {
        let actor = Actor::anonymous();
        assert!(matches!(actor.require_user(), Err(ApiError::NotAuthenticated)));
    }

    #[test]
    fn test_role_gates() {
        let user = Actor::user("U001");
        let admin = Actor::admin("A001");
        let partner = Actor::delivery_partner("D001");

        assert!(user.require_admin("confirm_order").is_err());
        assert!(admin.require_admin("confirm_order").is_ok());

        assert!(user.require_staff("pack_order").is_err());
        assert!(partner.require_staff("pack_order").is_ok());
        assert!(admin.require_staff("pack_order").is_ok());
    }

    #[test]
    fn test_static_policy_resolution() {
        let policy = StaticAccessPolicy::new().with_role("A001", Role::Admin);

        let actor = policy.resolve_actor(Some("A001")).unwrap();
        assert_eq!(actor.role, Role::Admin);

        let actor = policy.resolve_actor(Some("stranger")).unwrap();
        assert_eq!(actor.role, Role::User);

        let actor = policy.resolve_actor(None).unwrap();
        assert!(actor.user_id.is_none());
    }
}
