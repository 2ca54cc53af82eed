// ==========================================
// 社区生鲜速达 - 应用层
// ==========================================

pub mod state;

pub use state::AppState;
