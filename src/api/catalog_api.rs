// ==========================================
// 社区生鲜速达 - 商品目录 API
// ==========================================
// 职责: 商品 / 礼包的只读视图, 含礼包让利计算
// 说明: 目录维护走仓储层（后台导入）, 本层不提供写入口
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::catalog::{Kit, KitWithItems, Product};
use crate::engine::pricing::{self, KitTotals};
use crate::repository::{KitRepository, ProductRepository};

// ==========================================
// CatalogApi - 商品目录 API
// ==========================================

/// 商品目录API
pub struct CatalogApi {
    product_repo: Arc<ProductRepository>,
    kit_repo: Arc<KitRepository>,
}

impl CatalogApi {
    /// 创建新的CatalogApi实例
    pub fn new(product_repo: Arc<ProductRepository>, kit_repo: Arc<KitRepository>) -> Self {
        Self {
            product_repo,
            kit_repo,
        }
    }

    /// 查询单个商品
    pub fn get_product(&self, product_id: &str) -> ApiResult<Product> {
        self.product_repo
            .find_by_id(product_id)?
            .ok_or_else(|| ApiError::NotFound(format!("商品(id={})不存在", product_id)))
    }

    /// 查询在售商品列表
    pub fn list_products(&self) -> ApiResult<Vec<Product>> {
        Ok(self.product_repo.list_in_stock()?)
    }

    /// 查询上架礼包列表
    pub fn list_kits(&self) -> ApiResult<Vec<Kit>> {
        Ok(self.kit_repo.list_active()?)
    }

    /// 查询礼包详情及让利口径
    ///
    /// # 说明
    /// - 原价缺省回落到现价; 原总价为 0 时让利比例为 0
    pub fn get_kit_with_totals(&self, kit_id: &str) -> ApiResult<(KitWithItems, KitTotals)> {
        let kit = self
            .kit_repo
            .find_with_items(kit_id)?
            .ok_or_else(|| ApiError::NotFound(format!("礼包(id={})不存在", kit_id)))?;

        let priced: Vec<(Product, i64)> = kit
            .items
            .iter()
            .map(|(item, product)| (product.clone(), item.quantity))
            .collect();
        let totals = pricing::kit_totals(&priced);

        Ok((kit, totals))
    }
}
