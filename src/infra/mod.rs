// Infrastructure layer - 基础设施层
// 负责对接宿主的在线状态查询以及指标记录

pub mod metrics;
pub mod presence;

pub use presence::{AvailabilityOracle, MemoryPresenceDirectory, PresenceDirectory, UserAccount};
