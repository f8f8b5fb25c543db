//! 网络元素公共部分
//!
//! 永久 id、稠密 index 与字符串属性表。

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ElementMeta {
    pub(crate) id: u64,
    pub(crate) index: usize,
    pub(crate) attributes: BTreeMap<String, String>,
}

impl ElementMeta {
    pub(crate) fn new(id: u64, index: usize, attributes: BTreeMap<String, String>) -> Self {
        Self {
            id,
            index,
            attributes,
        }
    }

    /// 永久 id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 在所属集合中的位置（删除前面的兄弟元素后会前移）
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// 所有元素都暴露的公共元信息
pub trait NetworkElement {
    fn meta(&self) -> &ElementMeta;

    fn id(&self) -> u64 {
        self.meta().id
    }

    fn index(&self) -> usize {
        self.meta().index
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.meta().attribute(key)
    }

    fn attributes(&self) -> &BTreeMap<String, String> {
        self.meta().attributes()
    }
}

macro_rules! impl_network_element {
    ($($ty:ty),* $(,)?) => {
        $(
            impl NetworkElement for $ty {
                fn meta(&self) -> &ElementMeta {
                    &self.meta
                }
            }
        )*
    };
}

impl_network_element!(
    super::node::Node,
    super::link::Link,
    super::demand::Demand,
    super::route::Route,
    super::segment::ProtectionSegment,
    super::layer::Layer,
    super::srg::SharedRiskGroup,
    super::resource::Resource,
);
