//! 字段写入器

use crate::descriptor::DependencyField;
use crate::instance::Instance;
use infrastructure_common::BoxError;

/// 字段写入器
///
/// 负责把依赖实例写入资源的字段。
pub trait FieldSetter: Send + Sync {
    /// 写入字段
    fn set(&self, field: &DependencyField, owner: &Instance, value: &Instance)
        -> Result<(), BoxError>;
}

/// 通过字段声明的访问器直接写入
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectFieldSetter;

impl FieldSetter for DirectFieldSetter {
    fn set(
        &self,
        field: &DependencyField,
        owner: &Instance,
        value: &Instance,
    ) -> Result<(), BoxError> {
        field.write(owner, value)
    }
}
