/// 帧输入 (Frame Input)
///
/// - SyntheticScene: 可复现的合成场景 (演示与测试用)
pub mod synthetic;

pub use synthetic::SyntheticScene;
