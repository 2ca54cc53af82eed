// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库装配、商品/礼包/配送员等测试数据生成
// ==========================================

use chrono::Utc;
use std::error::Error;
use tempfile::NamedTempFile;
use uuid::Uuid;

use grocery_order_engine::domain::catalog::{Kit, KitItem, Product};
use grocery_order_engine::domain::order::{DeliveryInfo, DeliveryPartner, Profile};
use grocery_order_engine::domain::types::Role;
use grocery_order_engine::AppState;

/// 创建临时测试数据库并装配应用状态
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - AppState: 已建表的应用状态
pub fn create_test_state() -> Result<(NamedTempFile, AppState), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();

    let state = AppState::new(&db_path)?;
    Ok((temp_file, state))
}

/// 插入测试商品
pub fn seed_product(
    state: &AppState,
    product_id: &str,
    name: &str,
    price_paise: i64,
    in_stock: bool,
) -> Result<(), Box<dyn Error>> {
    let now = Utc::now();
    state.product_repo.upsert(&Product {
        product_id: product_id.to_string(),
        name: name.to_string(),
        description: None,
        unit: "500g".to_string(),
        price_paise,
        original_price_paise: None,
        discount_percentage: None,
        category: Some("蔬菜".to_string()),
        in_stock,
        created_at: now,
        updated_at: now,
    })?;
    Ok(())
}

/// 插入带折扣的测试商品（原价高于现价）
pub fn seed_discounted_product(
    state: &AppState,
    product_id: &str,
    name: &str,
    price_paise: i64,
    original_price_paise: i64,
    discount_percentage: i64,
) -> Result<(), Box<dyn Error>> {
    let now = Utc::now();
    state.product_repo.upsert(&Product {
        product_id: product_id.to_string(),
        name: name.to_string(),
        description: None,
        unit: "500g".to_string(),
        price_paise,
        original_price_paise: Some(original_price_paise),
        discount_percentage: Some(discount_percentage),
        category: Some("蔬菜".to_string()),
        in_stock: true,
        created_at: now,
        updated_at: now,
    })?;
    Ok(())
}

/// 插入测试礼包
///
/// # 参数
/// - items: (商品ID, 数量, 是否强制) 三元组, 按给定顺序编排 sort_no
pub fn seed_kit(
    state: &AppState,
    kit_id: &str,
    name: &str,
    items: &[(&str, i64, bool)],
) -> Result<(), Box<dyn Error>> {
    let now = Utc::now();
    let kit = Kit {
        kit_id: kit_id.to_string(),
        name: name.to_string(),
        description: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let kit_items: Vec<KitItem> = items
        .iter()
        .enumerate()
        .map(|(idx, (product_id, quantity, is_mandatory))| KitItem {
            kit_item_id: Uuid::new_v4().to_string(),
            kit_id: kit_id.to_string(),
            product_id: product_id.to_string(),
            quantity: *quantity,
            is_mandatory: *is_mandatory,
            sort_no: idx as i64,
        })
        .collect();

    state.kit_repo.upsert_with_items(&kit, &kit_items)?;
    Ok(())
}

/// 授予管理员角色
pub fn seed_admin(state: &AppState, user_id: &str) -> Result<(), Box<dyn Error>> {
    state.role_repo.grant(user_id, Role::Admin)?;
    Ok(())
}

/// 登记配送员
pub fn seed_partner(
    state: &AppState,
    user_id: &str,
    is_active: bool,
) -> Result<(), Box<dyn Error>> {
    let now = Utc::now();
    state.partner_repo.upsert(&DeliveryPartner {
        user_id: user_id.to_string(),
        vehicle_type: "电动车".to_string(),
        is_active,
        created_at: now,
        updated_at: now,
    })?;
    Ok(())
}

/// 登记用户资料（配送简报取姓名/电话用）
pub fn seed_profile(
    state: &AppState,
    user_id: &str,
    full_name: &str,
    phone: &str,
) -> Result<(), Box<dyn Error>> {
    let now = Utc::now();
    state.profile_repo.upsert(&Profile {
        user_id: user_id.to_string(),
        full_name: Some(full_name.to_string()),
        phone: Some(phone.to_string()),
        address: None,
        created_at: now,
        updated_at: now,
    })?;
    Ok(())
}

/// 标准配送信息
pub fn delivery_info() -> DeliveryInfo {
    DeliveryInfo {
        address: "幸福小区 3 栋 502".to_string(),
        latitude: Some(28.6139),
        longitude: Some(77.2090),
        instructions: Some("放门口".to_string()),
    }
}
