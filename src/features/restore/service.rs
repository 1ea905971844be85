use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RestoreError;

/// 远端预测入口
pub const PREDICT_API_NAME: &str = "/predict";

/// 是否随机化种子
pub const RANDOMIZE_SEED: bool = true;
/// 输入是否已对齐人脸
pub const ALIGNED: bool = false;
/// 放大倍数
pub const SCALE: u32 = 1;
/// 流步数
pub const NUM_FLOW_STEPS: u32 = 25;
/// 随机种子
pub const SEED: u32 = 42;

/// 一次预测调用的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictParams {
    pub randomize_seed: bool,
    pub aligned: bool,
    pub scale: u32,
    pub num_flow_steps: u32,
    pub seed: u32,
}

impl PredictParams {
    /// 中继固定使用的参数组合，调用方无法修改
    pub const FIXED: PredictParams = PredictParams {
        randomize_seed: RANDOMIZE_SEED,
        aligned: ALIGNED,
        scale: SCALE,
        num_flow_steps: NUM_FLOW_STEPS,
        seed: SEED,
    };
}

/// 预测结果：修复后图片的本地路径与一个未使用的附加值
#[derive(Debug, Clone)]
pub struct Prediction {
    /// 修复图片在本地的路径（远端未给出时为 None）
    pub result_path: Option<PathBuf>,
    /// 远端返回的第二个输出（当前为实际使用的种子）
    pub secondary: Value,
}

/// 远端修复服务
///
/// 实现方负责把结果图片落到本地文件；该文件的删除由调用方负责。
#[async_trait]
pub trait RestorationService: Send + Sync {
    async fn predict(&self, input: &Path, params: &PredictParams)
    -> Result<Prediction, RestoreError>;
}

#[cfg(test)]
mod tests {
    use super::PredictParams;

    #[test]
    fn fixed_params_match_relay_contract() {
        let p = PredictParams::FIXED;
        assert!(p.randomize_seed);
        assert!(!p.aligned);
        assert_eq!(p.scale, 1);
        assert_eq!(p.num_flow_steps, 25);
        assert_eq!(p.seed, 42);
    }
}
