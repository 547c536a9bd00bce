//! 前向/后向两项参考窗口 (VC-1, MPEG-2).
//!
//! I/P 图像解码后进入窗口, 挤出最老的前向参考; B 图像不改变窗口.

use crate::surface::{SurfaceIndex, ref_index};

/// 两项参考窗口
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefWindow {
    forward: Option<SurfaceIndex>,
    backward: Option<SurfaceIndex>,
}

impl RefWindow {
    /// 较早的参考
    pub fn forward(&self) -> Option<SurfaceIndex> {
        self.forward
    }

    /// 最近的参考
    pub fn backward(&self) -> Option<SurfaceIndex> {
        self.backward
    }

    /// 当前图像在参数块中的 (前向, 后向) 参考索引.
    ///
    /// 同一帧的第二场解码时窗口已包含本帧, 前向参考取上一项.
    pub fn ref_indices(&self, intra: bool, bidirectional: bool, second_field: bool) -> (u16, u16) {
        if intra {
            return (ref_index(None), ref_index(None));
        }
        if bidirectional {
            return (ref_index(self.forward), ref_index(self.backward));
        }
        let forward = if second_field {
            self.forward
        } else {
            self.backward
        };
        (ref_index(forward), ref_index(None))
    }

    /// 新参考图像进入窗口, 返回被挤出的表面
    pub fn advance(&mut self, surface: SurfaceIndex) -> Option<SurfaceIndex> {
        let evicted = self.forward.take();
        self.forward = self.backward.replace(surface);
        evicted.filter(|&s| Some(s) != self.forward && Some(s) != self.backward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::NO_REF_FRAME;

    #[test]
    fn test_窗口滑动挤出最老参考() {
        let mut w = RefWindow::default();
        assert_eq!(w.advance(SurfaceIndex::new(0)), None);
        assert_eq!(w.advance(SurfaceIndex::new(1)), None);
        assert_eq!(w.advance(SurfaceIndex::new(2)), Some(SurfaceIndex::new(0)));
        assert_eq!(w.forward(), Some(SurfaceIndex::new(1)));
        assert_eq!(w.backward(), Some(SurfaceIndex::new(2)));
    }

    #[test]
    fn test_参考索引() {
        let mut w = RefWindow::default();
        w.advance(SurfaceIndex::new(4));
        w.advance(SurfaceIndex::new(7));
        assert_eq!(w.ref_indices(true, false, false), (NO_REF_FRAME, NO_REF_FRAME));
        assert_eq!(w.ref_indices(false, true, false), (4, 7));
        assert_eq!(w.ref_indices(false, false, false), (7, NO_REF_FRAME));
        assert_eq!(w.ref_indices(false, false, true), (4, NO_REF_FRAME));
    }
}
