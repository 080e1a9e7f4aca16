//! 资源生命周期管理

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 资源生命周期状态
///
/// 单向状态机：`Uninitialized -> Initialized -> Destroyed`。
/// 没有初始化方法的资源可以从 `Uninitialized` 直接进入 `Destroyed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// 未初始化
    #[default]
    Uninitialized,
    /// 已执行初始化方法
    Initialized,
    /// 已执行销毁方法
    Destroyed,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Initialized,
            2 => Self::Destroyed,
            _ => Self::Uninitialized,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Initialized => 1,
            Self::Destroyed => 2,
        }
    }
}

/// 可跨线程观察的生命周期状态
///
/// 写入使用 Release，读取使用 Acquire。
#[derive(Debug, Default)]
pub struct AtomicLifecycleState(AtomicU8);

impl AtomicLifecycleState {
    /// 创建未初始化状态
    pub fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Uninitialized.as_u8()))
    }

    /// 读取当前状态
    pub fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// 推进到目标状态，状态只能前进
    ///
    /// 返回是否发生了状态变化。
    pub fn advance(&self, target: LifecycleState) -> bool {
        let target = target.as_u8();
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < target).then_some(target)
            })
            .is_ok()
    }
}

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// 初始化阶段
    PostConstruct,
    /// 销毁阶段
    PreDestroy,
}

impl Phase {
    /// 阶段成功后资源进入的状态
    pub fn completed_state(self) -> LifecycleState {
        match self {
            Self::PostConstruct => LifecycleState::Initialized,
            Self::PreDestroy => LifecycleState::Destroyed,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostConstruct => f.write_str("post-construct"),
            Self::PreDestroy => f.write_str("pre-destroy"),
        }
    }
}
