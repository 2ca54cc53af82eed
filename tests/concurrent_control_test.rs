// ==========================================
// 并发控制测试
// ==========================================
// 测试范围:
// 1. 多线程散装加购不丢更新（条件 upsert 累加）
// 2. 状态 CAS: 同一推进并发提交恰好生效一次
// 3. 取件码核销: 并发提交恰好一个成功
// 4. 改量与删行竞争: 落败方如实定性
// ==========================================

mod test_helpers;

use std::sync::Arc;
use std::thread;

use grocery_order_engine::{Actor, ApiError, AppState, OrderStatus, PaymentMethod};
use test_helpers::*;

fn setup() -> (tempfile::NamedTempFile, Arc<AppState>) {
    let (tmp, state) = create_test_state().expect("创建测试数据库失败");
    seed_product(&state, "P001", "有机大米", 20_000, true).expect("插入商品失败");
    seed_admin(&state, "ADMIN").expect("授权失败");
    seed_partner(&state, "RIDER", true).expect("登记配送员失败");
    (tmp, Arc::new(state))
}

#[test]
fn test_concurrent_add_product_never_loses_updates() {
    let (_tmp, state) = setup();

    let threads: i64 = 4;
    let adds_per_thread: i64 = 5;
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                let buyer = Actor::user("U001");
                for _ in 0..adds_per_thread {
                    state.cart_api.add_product(&buyer, "P001", 1).expect("加购失败");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("线程异常退出");
    }

    let buyer = Actor::user("U001");
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    assert_eq!(lines.len(), 1, "并发加购应始终命中同一行");
    assert_eq!(
        lines[0].quantity,
        threads * adds_per_thread,
        "累计数量应为全部加购之和"
    );
}

#[test]
fn test_concurrent_status_cas_applies_exactly_once() {
    let (_tmp, state) = setup();
    let buyer = Actor::user("U001");
    state.cart_api.add_product(&buyer, "P001", 2).expect("加购失败");
    let order = state
        .order_api
        .create_order(&buyer, &delivery_info(), PaymentMethod::Cod)
        .expect("建单失败");

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let state = Arc::clone(&state);
            let order_id = order.order_id.clone();
            thread::spawn(move || {
                let admin = Actor::admin("ADMIN");
                state
                    .order_api
                    .update_status(&admin, &order_id, OrderStatus::Confirmed)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("线程异常退出"))
        .collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "同一推进并发提交应恰好生效一次");

    // 落败方得到如实定性, 不得是假成功
    for result in results {
        if let Err(err) = result {
            assert!(matches!(
                err,
                ApiError::InvalidTransition { .. } | ApiError::OrderAlreadyFinalized { .. }
            ));
        }
    }

    let admin = Actor::admin("ADMIN");
    let (reread, _items) = state
        .order_api
        .get_order(&admin, &order.order_id)
        .expect("查询订单失败");
    assert_eq!(reread.status, OrderStatus::Confirmed);
}

#[test]
fn test_concurrent_otp_verification_single_winner() {
    let (_tmp, state) = setup();
    let buyer = Actor::user("U001");
    let admin = Actor::admin("ADMIN");
    let rider = Actor::delivery_partner("RIDER");

    state.cart_api.add_product(&buyer, "P001", 2).expect("加购失败");
    let order = state
        .order_api
        .create_order(&buyer, &delivery_info(), PaymentMethod::Cod)
        .expect("建单失败");
    state
        .order_api
        .update_status(&admin, &order.order_id, OrderStatus::Confirmed)
        .expect("确认失败");
    state
        .order_api
        .assign_delivery_partner(&admin, &order.order_id, "RIDER")
        .expect("指派失败");
    state
        .order_api
        .update_status(&rider, &order.order_id, OrderStatus::Packed)
        .expect("打包失败");
    state
        .order_api
        .update_status(&rider, &order.order_id, OrderStatus::OutForDelivery)
        .expect("出发失败");

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let state = Arc::clone(&state);
            let order_id = order.order_id.clone();
            let otp = order.otp_code.clone();
            thread::spawn(move || {
                let rider = Actor::delivery_partner("RIDER");
                state.order_api.verify_delivery(&rider, &order_id, &otp)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("线程异常退出"))
        .collect();

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "并发核销应恰好一个成功");

    for result in results {
        if let Err(err) = result {
            assert!(matches!(err, ApiError::OrderAlreadyFinalized { .. }));
        }
    }
}

#[test]
fn test_set_quantity_racing_remove_reports_not_found() {
    let (_tmp, state) = setup();
    let buyer = Actor::user("U001");
    state.cart_api.add_product(&buyer, "P001", 1).expect("加购失败");
    let (_cart, lines) = state.cart_api.get_cart(&buyer).expect("查询购物车失败");
    let line_id = lines[0].cart_line_id.clone();

    let writer = {
        let state = Arc::clone(&state);
        let line_id = line_id.clone();
        thread::spawn(move || {
            let buyer = Actor::user("U001");
            let mut errors = Vec::new();
            for quantity in 1..=50 {
                if let Err(err) = state.cart_api.set_quantity(&buyer, &line_id, quantity) {
                    errors.push(err);
                }
            }
            errors
        })
    };
    let remover = {
        let state = Arc::clone(&state);
        let line_id = line_id.clone();
        thread::spawn(move || {
            let buyer = Actor::user("U001");
            state.cart_api.remove_line(&buyer, &line_id).expect("删行失败");
        })
    };

    remover.join().expect("线程异常退出");
    let errors = writer.join().expect("线程异常退出");

    // 行被并发删除后, 改量落败只能定性为 NotFound,
    // 散装行绝不能误报礼包下限
    for err in errors {
        assert!(
            matches!(err, ApiError::NotFound(_)),
            "期望 NotFound, 实得 {:?}",
            err
        );
    }
}
