use std::collections::BTreeMap;

use super::{ImageRef, Roi};

/// ROI 登记处. 宿主程序通过它持久化各模块绘制出的 ROI (例如用于显示).
///
/// 同一 `(模块, 图像, 名字)` 的 ROI 只保留最后一次登记的版本.
pub trait RoiRegistry {
    /// 登记一个 ROI, 覆盖同键的旧 ROI.
    fn register(&mut self, module: &str, roi: Roi);

    /// 查找已登记的 ROI.
    fn lookup(&self, module: &str, image: ImageRef, name: &str) -> Option<&Roi>;

    /// 已登记的 ROI 个数.
    fn count(&self) -> usize;
}

type Key = (String, ImageRef, String);

/// 基于内存有序表的 [`RoiRegistry`] 实现.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    rois: BTreeMap<Key, Roi>,
}

impl MemoryRegistry {
    /// 空登记处.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 某个模块登记的全部 ROI, 按图像与名字排序.
    pub fn rois_of<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a Roi> + 'a {
        self.rois
            .iter()
            .filter(move |((m, _, _), _)| m == module)
            .map(|(_, roi)| roi)
    }

    /// 清空登记处.
    pub fn clear(&mut self) {
        self.rois.clear();
    }
}

impl RoiRegistry for MemoryRegistry {
    fn register(&mut self, module: &str, roi: Roi) {
        let key = (module.to_owned(), roi.image, roi.name.clone());
        if self.rois.insert(key, roi).is_some() {
            log::debug!("{module}: 替换了已登记的 ROI");
        }
    }

    fn lookup(&self, module: &str, image: ImageRef, name: &str) -> Option<&Roi> {
        self.rois
            .get(&(module.to_owned(), image, name.to_owned()))
    }

    fn count(&self) -> usize {
        self.rois.len()
    }
}
