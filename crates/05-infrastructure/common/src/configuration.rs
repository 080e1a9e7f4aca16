//! 注入配置

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 默认资源字段标记
pub const DEFAULT_RESOURCE_MARKER: &str = "resource";
/// 默认初始化方法标记
pub const DEFAULT_POST_CONSTRUCT_MARKER: &str = "post_construct";
/// 默认销毁方法标记
pub const DEFAULT_PRE_DESTROY_MARKER: &str = "pre_destroy";

/// 注入选项
///
/// 三组标记决定解析器把哪些声明视为依赖字段、初始化方法和销毁方法。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionOptions {
    /// 依赖字段标记
    pub resource_markers: BTreeSet<String>,
    /// 初始化方法标记
    pub post_construct_markers: BTreeSet<String>,
    /// 销毁方法标记
    pub pre_destroy_markers: BTreeSet<String>,
}

impl Default for InjectionOptions {
    fn default() -> Self {
        Self {
            resource_markers: BTreeSet::from([DEFAULT_RESOURCE_MARKER.to_string()]),
            post_construct_markers: BTreeSet::from([DEFAULT_POST_CONSTRUCT_MARKER.to_string()]),
            pre_destroy_markers: BTreeSet::from([DEFAULT_PRE_DESTROY_MARKER.to_string()]),
        }
    }
}

impl InjectionOptions {
    /// 从 JSON 值绑定配置
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_value(value).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;
        options.validate()?;
        Ok(options)
    }

    /// 从 TOML 文本绑定配置
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(text).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;
        options.validate()?;
        Ok(options)
    }

    /// 校验配置，三组标记都不能为空
    pub fn validate(&self) -> Result<(), ConfigError> {
        let groups = [
            ("resource_markers", &self.resource_markers),
            ("post_construct_markers", &self.post_construct_markers),
            ("pre_destroy_markers", &self.pre_destroy_markers),
        ];
        for (name, markers) in groups {
            if markers.is_empty() {
                return Err(ConfigError::ValidationError {
                    message: format!("{name} 不能为空"),
                });
            }
        }
        Ok(())
    }

    /// 是否为依赖字段标记
    pub fn is_resource_marker(&self, marker: &str) -> bool {
        self.resource_markers.contains(marker)
    }

    /// 是否为初始化方法标记
    pub fn is_post_construct_marker(&self, marker: &str) -> bool {
        self.post_construct_markers.contains(marker)
    }

    /// 是否为销毁方法标记
    pub fn is_pre_destroy_marker(&self, marker: &str) -> bool {
        self.pre_destroy_markers.contains(marker)
    }
}
