//! 错误类型定义

use thiserror::Error;

/// 协作者与生命周期钩子返回的通用错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 依赖注入错误类型
///
/// 构建期的任何失败都会中止整个构建，不会返回部分构建的应用。
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("组件未注册: {type_name}")]
    ComponentNotRegistered { type_name: String },

    #[error("依赖解析失败: {type_name}, 原因: {source}")]
    DependencyResolutionFailed {
        type_name: String,
        source: BoxError,
    },

    #[error("组件创建失败: {type_name}, 原因: {source}")]
    ComponentCreationFailed {
        type_name: String,
        source: BoxError,
    },

    #[error("字段注入失败: {owner}.{field}, 原因: {source}")]
    FieldInjectionFailed {
        owner: String,
        field: String,
        source: BoxError,
    },

    #[error("切面实例创建失败: {type_name}, 原因: {source}")]
    AspectCreationFailed {
        type_name: String,
        source: BoxError,
    },

    #[error("类型转换失败: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("依赖尚未注入: {type_name}")]
    NotInjected { type_name: String },
}

impl DependencyError {
    /// 创建组件未注册错误
    pub fn not_registered(type_name: impl Into<String>) -> Self {
        Self::ComponentNotRegistered {
            type_name: type_name.into(),
        }
    }

    /// 创建类型转换错误
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
