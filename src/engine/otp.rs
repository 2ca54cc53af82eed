// ==========================================
// 社区生鲜速达 - 取件码生成
// ==========================================
// 职责: 订单创建时生成 4 位送达确认码 (OTP)
// 说明:
// - 使用操作系统密码学安全随机源 (OsRng), 在 1000..=9999 上均匀取值
// - 9000 种取值的暴力猜测面是已接受的显式风险;
//   单次有效由订单进入终态保证, 未做猜测限流
// ==========================================

use rand::rngs::OsRng;
use rand::Rng;

/// 取件码下界（含）
pub const OTP_MIN: u32 = 1_000;

/// 取件码上界（含）
pub const OTP_MAX: u32 = 9_999;

/// 生成 4 位取件码
pub fn generate_otp() -> String {
    let code = OsRng.gen_range(OTP_MIN..=OTP_MAX);
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_shape() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 4);
            let value: u32 = otp.parse().unwrap();
            assert!((OTP_MIN..=OTP_MAX).contains(&value));
        }
    }

    #[test]
    fn test_otp_varies() {
        // 200 次抽样全部相同的概率可忽略
        let first = generate_otp();
        let all_same = (0..200).all(|_| generate_otp() == first);
        assert!(!all_same);
    }
}
