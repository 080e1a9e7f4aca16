//! 注入应用错误类型

use crate::app::InjectedResource;
use infrastructure_common::{format_chain, BoxError, ConfigError, DependencyError, Phase, TypeKey};
use thiserror::Error;

/// 注入应用错误
#[derive(Error, Debug)]
pub enum InjectError {
    /// 构建失败，不会返回部分构建的应用
    #[error("应用构建失败: {0}")]
    Build(#[from] DependencyError),

    /// 注入选项无效
    #[error("注入配置无效: {0}")]
    Config(#[from] ConfigError),

    /// 生命周期方法参数存在循环依赖
    #[error("检测到循环{phase}依赖: {}", format_chain(.chain))]
    CircularLifecycleDependency { phase: Phase, chain: Vec<TypeKey> },

    /// 生命周期阶段执行失败
    #[error(transparent)]
    PhaseExecution(#[from] PhaseExecutionError),
}

impl InjectError {
    /// 阶段执行失败的详细信息
    pub fn as_phase_error(&self) -> Option<&PhaseExecutionError> {
        match self {
            Self::PhaseExecution(error) => Some(error),
            _ => None,
        }
    }
}

/// 生命周期阶段执行失败
///
/// `completed` 为失败前已经执行完成的资源，`remaining` 为尚未执行完成的资源，
/// 包含失败的资源本身。调用方可以据此决定补偿动作。
#[derive(Error, Debug)]
#[error("{phase} 阶段执行失败: {failed}, 原因: {source}")]
pub struct PhaseExecutionError {
    /// 失败的阶段
    pub phase: Phase,
    /// 失败的资源
    pub failed: InjectedResource,
    /// 失败原因
    pub source: BoxError,
    /// 已执行完成的资源
    pub completed: Vec<InjectedResource>,
    /// 尚未执行完成的资源
    pub remaining: Vec<InjectedResource>,
}

/// 结果类型别名
pub type InjectResult<T> = Result<T, InjectError>;
