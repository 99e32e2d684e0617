//! 跟踪器配置 - 通过JSON文件调整参数

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// 跟踪器参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // === 跟踪参数 ===
    pub persistence: u64,      // 最大连续丢失帧数
    pub maximum_distance: f32, // 匹配距离阈值(像素)
    pub smoothing_rate: f32,   // 平滑系数 [0,1]

    // === 流水线参数 ===
    pub input_capacity: usize,  // 输入队列容量
    pub output_capacity: usize, // 输出队列容量

    // === 检测参数 ===
    pub min_confidence: f32, // 检测置信度过滤 (0 = 不过滤)
    pub blob_threshold: u8,  // 亮斑亮度阈值
    pub blob_min_area: u32,  // 亮斑最小像素数
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            persistence: 15,
            maximum_distance: 64.0,
            smoothing_rate: 0.5,

            input_capacity: 2,
            output_capacity: 4,

            min_confidence: 0.0,
            blob_threshold: 128,
            blob_min_area: 16,
        }
    }
}

impl TrackerConfig {
    /// 从JSON文件加载配置, 失败时使用默认值 (文件不存在则写入默认配置)
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("📝 配置文件不存在,创建默认配置...");
            let config = Self::default();
            if let Err(e) = config.save(path) {
                warn!("❌ 保存配置失败: {}", e);
            }
            return config;
        }

        match Self::from_file(path) {
            Ok(config) => {
                info!("✅ 配置已从 {} 加载", path.display());
                config
            }
            Err(e) => {
                warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                Self::default()
            }
        }
    }

    /// 从JSON文件读取并校验
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_capacity == 0 || self.output_capacity == 0 {
            return Err(Error::InvalidConfig(format!(
                "队列容量必须大于0 (input={}, output={})",
                self.input_capacity, self.output_capacity
            )));
        }
        if !(self.maximum_distance >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "maximum_distance 不能为负: {}",
                self.maximum_distance
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_rate) {
            return Err(Error::InvalidConfig(format!(
                "smoothing_rate 必须在 [0,1]: {}",
                self.smoothing_rate
            )));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️  当前跟踪器配置:");
        info!("  最大丢失帧: {}", self.persistence);
        info!("  匹配距离: {:.1}", self.maximum_distance);
        info!("  平滑系数: {:.2}", self.smoothing_rate);
        info!(
            "  队列容量: 输入{} / 输出{}",
            self.input_capacity, self.output_capacity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("detection_tracker_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("save");
        let config = TrackerConfig {
            persistence: 7,
            maximum_distance: 12.5,
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(TrackerConfig::from_file(&path).unwrap(), config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrackerConfig = serde_json::from_str(r#"{"persistence": 3}"#).unwrap();
        assert_eq!(config.persistence, 3);
        assert_eq!(config.output_capacity, TrackerConfig::default().output_capacity);
    }

    #[test]
    fn test_default_keeps_all_confidences() {
        assert_eq!(TrackerConfig::default().min_confidence, 0.0);
    }

    #[test]
    fn test_load_missing_file_writes_defaults() {
        let path = temp_path("missing");
        let _ = fs::remove_file(&path);
        assert_eq!(TrackerConfig::load(&path), TrackerConfig::default());
        assert!(path.exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_validate() {
        assert!(TrackerConfig::default().validate().is_ok());

        let zero_capacity = TrackerConfig {
            input_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(zero_capacity.validate(), Err(Error::InvalidConfig(_))));

        let bad_rate = TrackerConfig {
            smoothing_rate: 1.5,
            ..Default::default()
        };
        assert!(bad_rate.validate().is_err());

        let bad_distance = TrackerConfig {
            maximum_distance: -1.0,
            ..Default::default()
        };
        assert!(bad_distance.validate().is_err());
    }
}
