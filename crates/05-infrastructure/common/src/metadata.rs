//! 元数据定义
//!
//! 提供资源类型的标识信息

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 资源类型标识
///
/// 相等性与哈希只取决于 `TypeId`；类型名称仅用于诊断输出。
/// `Generic<String>` 与 `Generic<u32>` 是两个不同的标识，
/// 接口类型使用 trait object 表示，例如 `TypeKey::of::<dyn Service>()`。
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 从类型获取类型标识
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// 类型ID
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名称（包含模块路径）
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        let start = base.rfind("::").map_or(0, |idx| idx + 2);
        &self.name[start..]
    }

    /// 是否为 trait object
    pub fn is_trait_object(&self) -> bool {
        self.name.starts_with("dyn ")
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 将类型链格式化为 `A -> B -> C`
pub fn format_chain(chain: &[TypeKey]) -> String {
    chain
        .iter()
        .map(TypeKey::name)
        .collect::<Vec<_>>()
        .join(" -> ")
}
