// ==========================================
// 购物车管理测试
// ==========================================
// 测试范围:
// 1. 散装加购合并重复行
// 2. 礼包整体加购的幂等与 max 合并
// 3. 礼包锁: 不可删行、不可跌破下限
// 4. 清空只清散装行
// 5. 聚合口径: 件数/小计/配送费/起送差额
// ==========================================

mod test_helpers;

use grocery_order_engine::{ApiError, Actor, MAX_LINE_QUANTITY};
use test_helpers::*;

// ==========================================
// 散装加购
// ==========================================

#[test]
fn test_add_product_merges_duplicate_lines() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_product(&buyer, "P001", 2).expect("加购失败");
    state.cart_api.add_product(&buyer, "P001", 3).expect("加购失败");

    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert_eq!(lines.len(), 1, "同商品散装行应合并为一行");
    assert_eq!(lines[0].quantity, 5, "合并后数量应累加");
    assert!(!lines[0].is_kit_item);
    assert_eq!(lines[0].kit_id, None);
}

#[test]
fn test_add_product_rejections() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");
    seed_product(&state, "P002", "土豆", 3_000, false).expect("插入商品失败");

    let buyer = Actor::user("U001");

    // 匿名拒绝
    let err = state
        .cart_api
        .add_product(&Actor::anonymous(), "P001", 1)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotAuthenticated));

    // 数量非法
    let err = state.cart_api.add_product(&buyer, "P001", 0).unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuantity { quantity: 0 }));

    // 数量超出上限
    let over = MAX_LINE_QUANTITY + 1;
    let err = state.cart_api.add_product(&buyer, "P001", over).unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuantity { quantity } if quantity == over));

    // 商品不存在
    let err = state.cart_api.add_product(&buyer, "P404", 1).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // 售罄
    let err = state.cart_api.add_product(&buyer, "P002", 1).unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    // 全部被拒, 购物车应保持为空
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert!(lines.is_empty(), "被拒绝的加购不应留下任何行");
}

// ==========================================
// 礼包加购
// ==========================================

#[test]
fn test_add_kit_inserts_all_lines_atomically() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");
    seed_product(&state, "P002", "土豆", 3_000, true).expect("插入商品失败");
    seed_kit(
        &state,
        "K001",
        "周末家宴礼包",
        &[("P001", 2, true), ("P002", 3, false)],
    )
    .expect("插入礼包失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_kit(&buyer, "K001").expect("礼包加购失败");

    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert_eq!(lines.len(), 2);
    for line in &lines {
        assert!(line.is_kit_item);
        assert_eq!(line.kit_id.as_deref(), Some("K001"));
    }

    let onion = lines.iter().find(|l| l.product_id == "P001").unwrap();
    assert_eq!(onion.quantity, 2);
    assert_eq!(onion.min_quantity, 2, "强制明细下限应为礼包数量");

    let potato = lines.iter().find(|l| l.product_id == "P002").unwrap();
    assert_eq!(potato.quantity, 3);
    assert_eq!(potato.min_quantity, 1, "非强制明细下限应为 1");
}

#[test]
fn test_add_kit_is_idempotent_and_never_decreases() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");
    seed_kit(&state, "K001", "周末家宴礼包", &[("P001", 2, true)]).expect("插入礼包失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_kit(&buyer, "K001").expect("礼包加购失败");

    // 用户抬高数量后重复加购, 数量不回落
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    let line_id = lines[0].cart_line_id.clone();
    state.cart_api.set_quantity(&buyer, &line_id, 5).expect("改量失败");

    state.cart_api.add_kit(&buyer, "K001").expect("重复礼包加购失败");

    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert_eq!(lines.len(), 1, "重复加购不应新增行");
    assert_eq!(lines[0].quantity, 5, "已抬高的数量不应被礼包数量拉回");
}

#[test]
fn test_add_kit_rejections() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    let buyer = Actor::user("U001");

    let err = state.cart_api.add_kit(&buyer, "K404").unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ==========================================
// 礼包锁
// ==========================================

#[test]
fn test_kit_line_cannot_be_removed() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");
    seed_kit(&state, "K001", "周末家宴礼包", &[("P001", 2, true)]).expect("插入礼包失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_kit(&buyer, "K001").expect("礼包加购失败");

    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    let line_id = lines[0].cart_line_id.clone();

    let err = state.cart_api.remove_line(&buyer, &line_id).unwrap_err();
    assert!(matches!(err, ApiError::ImmutableKitItem { .. }));

    // 行原样保留
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
}

#[test]
fn test_kit_line_quantity_cannot_drop_below_floor() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");
    seed_kit(&state, "K001", "周末家宴礼包", &[("P001", 3, true)]).expect("插入礼包失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_kit(&buyer, "K001").expect("礼包加购失败");

    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    let line_id = lines[0].cart_line_id.clone();

    // 跌破下限拒绝, 报错携带下限值
    let err = state.cart_api.set_quantity(&buyer, &line_id, 2).unwrap_err();
    match err {
        ApiError::BelowKitMinimum { floor, .. } => assert_eq!(floor, 3),
        other => panic!("期望 BelowKitMinimum, 实得 {:?}", other),
    }

    // 行保持原数量
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert_eq!(lines[0].quantity, 3);

    // 下限之上可自由调整
    state.cart_api.set_quantity(&buyer, &line_id, 4).expect("改量失败");
    state.cart_api.set_quantity(&buyer, &line_id, 3).expect("改量失败");
}

#[test]
fn test_non_kit_line_free_to_edit_and_remove() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_product(&buyer, "P001", 2).expect("加购失败");

    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    let line_id = lines[0].cart_line_id.clone();

    state.cart_api.set_quantity(&buyer, &line_id, 1).expect("改量失败");

    let err = state.cart_api.set_quantity(&buyer, &line_id, 0).unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuantity { quantity: 0 }));

    let err = state
        .cart_api
        .set_quantity(&buyer, &line_id, MAX_LINE_QUANTITY + 1)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuantity { .. }));

    state.cart_api.remove_line(&buyer, &line_id).expect("删行失败");
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert!(lines.is_empty());
}

#[test]
fn test_line_ownership_is_enforced() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_product(&buyer, "P001", 2).expect("加购失败");
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    let line_id = lines[0].cart_line_id.clone();

    // 他人不能操作该行
    let intruder = Actor::user("U002");
    let err = state.cart_api.remove_line(&intruder, &line_id).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

// ==========================================
// 清空与聚合
// ==========================================

#[test]
fn test_clear_keeps_kit_lines() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");
    seed_product(&state, "P002", "土豆", 3_000, true).expect("插入商品失败");
    seed_kit(&state, "K001", "周末家宴礼包", &[("P001", 2, true)]).expect("插入礼包失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_product(&buyer, "P002", 3).expect("加购失败");
    state.cart_api.add_kit(&buyer, "K001").expect("礼包加购失败");

    let removed = state.cart_api.clear(&buyer).expect("清空失败");
    assert_eq!(removed, 1, "只应清掉散装行");

    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].is_kit_item, "礼包行应保留");
}

#[test]
fn test_totals_recomputed_on_demand() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "黄洋葱", 4_000, true).expect("插入商品失败");
    seed_product(&state, "P002", "土豆", 3_000, true).expect("插入商品失败");

    let buyer = Actor::user("U001");
    state.cart_api.add_product(&buyer, "P001", 2).expect("加购失败");
    state.cart_api.add_product(&buyer, "P002", 3).expect("加购失败");

    // 小计 2×40 + 3×30 = ₹170, 低于起送额 ₹300
    let totals = state.cart_api.totals(&buyer).expect("聚合失败");
    assert_eq!(totals.total_items, 5);
    assert_eq!(totals.subtotal_paise, 17_000);
    assert_eq!(totals.delivery_charge_paise, 3_000);
    assert_eq!(totals.total_paise, 20_000);
    assert!(totals.below_minimum_order);
    assert_eq!(totals.to_minimum_order_paise, 13_000);
    assert_eq!(totals.to_free_delivery_paise, 38_000);

    // 重复查询结果一致（幂等, 无持久化缓存）
    let again = state.cart_api.totals(&buyer).expect("聚合失败");
    assert_eq!(again, totals);

    // 加量冲过免配送门槛后配送费归零
    state.cart_api.add_product(&buyer, "P001", 10).expect("加购失败");
    let totals = state.cart_api.totals(&buyer).expect("聚合失败");
    assert_eq!(totals.subtotal_paise, 57_000);
    assert_eq!(totals.delivery_charge_paise, 0);
    assert!(!totals.below_minimum_order);
    assert_eq!(totals.to_free_delivery_paise, 0);
}

// ==========================================
// 目录视图
// ==========================================

#[test]
fn test_kit_totals_view() {
    let (_tmp, state) = create_test_state().expect("创建测试数据库失败");
    // 原价 ₹50 现价 ₹40, 折 20%; 另一件无原价按现价计
    seed_discounted_product(&state, "P001", "黄洋葱", 4_000, 5_000, 20).expect("插入商品失败");
    seed_product(&state, "P002", "土豆", 3_000, true).expect("插入商品失败");
    seed_kit(
        &state,
        "K001",
        "周末家宴礼包",
        &[("P001", 2, true), ("P002", 1, false)],
    )
    .expect("插入礼包失败");

    let product = state.catalog_api.get_product("P001").expect("查询商品失败");
    assert!(product.discount_is_consistent());
    assert_eq!(state.catalog_api.list_products().expect("查询失败").len(), 2);
    assert_eq!(state.catalog_api.list_kits().expect("查询失败").len(), 1);

    let (kit, totals) = state
        .catalog_api
        .get_kit_with_totals("K001")
        .expect("查询礼包失败");
    assert_eq!(kit.items.len(), 2);
    // 现价总计 2×40 + 30 = ₹110; 原价口径 2×50 + 30 = ₹130
    assert_eq!(totals.offered_total_paise, 11_000);
    assert_eq!(totals.original_total_paise, 13_000);
    assert_eq!(totals.savings_paise, 2_000);
    // round(100 × 20 / 130) = 15
    assert_eq!(totals.discount_percent, 15);
}
