//! 描述符解析器抽象接口

use crate::descriptor::Descriptor;
use infrastructure_common::{BoxError, InjectionOptions, TypeKey};

/// 描述符解析器
///
/// 根据注入选项中的标记，为资源类型给出描述符。
/// 只有标记匹配的字段与方法才会出现在返回的描述符中。
pub trait Resolver: Send + Sync {
    /// 解析指定类型
    fn resolve(&self, key: &TypeKey, options: &InjectionOptions) -> Result<Descriptor, BoxError>;
}

impl<R: Resolver + ?Sized> Resolver for std::sync::Arc<R> {
    fn resolve(&self, key: &TypeKey, options: &InjectionOptions) -> Result<Descriptor, BoxError> {
        (**self).resolve(key, options)
    }
}
