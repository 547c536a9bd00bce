//! H.264 参考帧表 (16 项).
//!
//! 表项持有存储区表面的参考状态. 被移出表的表面由调用方交还存储区
//! (`remove_ref_frame`), 已显示的表面随即释放.

use log::{debug, warn};

use super::picture::{H264Picture, MmcoOp, RefMarking, RefPicEntry};
use crate::sample::FieldType;
use crate::surface::SurfaceIndex;

/// 参考帧表容量
pub const MAX_REF_FRAMES: usize = 16;

/// 参考帧表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefFrame {
    /// 解码表面
    pub surface: SurfaceIndex,
    /// frame_num
    pub frame_num: u16,
    /// 是否为长期参考
    pub long_term: bool,
    /// LongTermFrameIdx
    pub long_term_frame_idx: u32,
    /// 顶场 POC
    pub top_poc: i32,
    /// 底场 POC
    pub bottom_poc: i32,
    /// 顶场用作参考
    pub top_ref: bool,
    /// 底场用作参考
    pub bottom_ref: bool,
}

impl RefFrame {
    fn from_picture(pic: &H264Picture, surface: SurfaceIndex) -> Self {
        let (top_ref, bottom_ref) = match pic.field_type {
            FieldType::Frame => (true, true),
            FieldType::TopField => (true, false),
            FieldType::BottomField => (false, true),
        };
        Self {
            surface,
            frame_num: pic.frame_num,
            long_term: false,
            long_term_frame_idx: 0,
            top_poc: pic.top_poc,
            bottom_poc: pic.bottom_poc,
            top_ref,
            bottom_ref,
        }
    }
}

/// 参考帧表
#[derive(Debug, Clone, Default)]
pub struct RefTable {
    entries: [Option<RefFrame>; MAX_REF_FRAMES],
}

impl RefTable {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 表项 (按位置)
    pub fn entries(&self) -> &[Option<RefFrame>; MAX_REF_FRAMES] {
        &self.entries
    }

    /// 有效表项数量
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// 表是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清空并返回被移出的表面
    pub fn clear(&mut self) -> Vec<SurfaceIndex> {
        self.entries
            .iter_mut()
            .filter_map(Option::take)
            .map(|r| r.surface)
            .collect()
    }

    /// 在表中查找条带参考列表项, 返回表位置
    pub fn position_of(&self, entry: &RefPicEntry) -> Option<usize> {
        self.entries.iter().position(|slot| {
            slot.is_some_and(|r| {
                r.long_term == entry.long_term
                    && if entry.long_term {
                        r.long_term_frame_idx == entry.num
                    } else {
                        u32::from(r.frame_num) == entry.num
                    }
            })
        })
    }

    /// 表面是否在表中
    pub fn contains(&self, surface: SurfaceIndex) -> bool {
        self.entries
            .iter()
            .flatten()
            .any(|r| r.surface == surface)
    }

    /// 对已解码的参考图像执行参考帧标记, 返回被移出表的表面.
    ///
    /// 同一表面上的第二场只更新场参考标志.
    pub fn mark_decoded(&mut self, pic: &H264Picture, surface: SurfaceIndex) -> Vec<SurfaceIndex> {
        if let Some(existing) = self.entries.iter_mut().flatten().find(|r| r.surface == surface) {
            match pic.field_type {
                FieldType::TopField => {
                    existing.top_ref = true;
                    existing.top_poc = pic.top_poc;
                }
                FieldType::BottomField => {
                    existing.bottom_ref = true;
                    existing.bottom_poc = pic.bottom_poc;
                }
                FieldType::Frame => {
                    existing.top_ref = true;
                    existing.bottom_ref = true;
                }
            }
            return Vec::new();
        }

        let mut evicted = Vec::new();
        let mut current = RefFrame::from_picture(pic, surface);

        if pic.is_idr {
            evicted.extend(self.clear());
            if pic.long_term_reference {
                current.long_term = true;
            }
        } else {
            match &pic.marking {
                RefMarking::SlidingWindow => {
                    let limit = usize::from(pic.params.num_ref_frames).clamp(1, MAX_REF_FRAMES);
                    while self.len() >= limit {
                        match self.remove_oldest_short(pic) {
                            Some(surface) => evicted.push(surface),
                            None => break,
                        }
                    }
                }
                RefMarking::Adaptive(ops) => {
                    for op in ops {
                        evicted.extend(self.apply_mmco(pic, *op, &mut current));
                    }
                }
            }
        }

        let slot = match self.entries.iter().position(Option::is_none) {
            Some(pos) => pos,
            None => {
                warn!("H264: 参考帧表已满, 移出最早的短期参考");
                match self.remove_oldest_short(pic) {
                    Some(surface) => evicted.push(surface),
                    None => evicted.extend(self.clear()),
                }
                self.entries.iter().position(Option::is_none).unwrap_or(0)
            }
        };
        self.entries[slot] = Some(current);
        if !evicted.is_empty() {
            debug!(
                "H264: 参考帧标记, frame_num={}, 移出 {} 个表面",
                pic.frame_num,
                evicted.len()
            );
        }
        evicted
    }

    fn frame_num_wrap(pic: &H264Picture, frame_num: u16) -> i64 {
        let max = i64::from(pic.params.max_frame_num());
        let value = i64::from(frame_num);
        if frame_num > pic.frame_num {
            value - max
        } else {
            value
        }
    }

    fn remove_oldest_short(&mut self, pic: &H264Picture) -> Option<SurfaceIndex> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.filter(|r| !r.long_term).map(|r| (i, r)))
            .min_by_key(|(_, r)| Self::frame_num_wrap(pic, r.frame_num))
            .map(|(i, _)| i)?;
        self.entries[pos].take().map(|r| r.surface)
    }

    /// picNumX 对应的短期参考位置
    fn short_by_pic_num(&self, pic: &H264Picture, difference_minus1: u32) -> Option<usize> {
        let field = pic.field_type.is_field();
        let curr_pic_num = if field {
            2 * i64::from(pic.frame_num) + 1
        } else {
            i64::from(pic.frame_num)
        };
        let pic_num_x = curr_pic_num - (i64::from(difference_minus1) + 1);
        let wrap_x = if field { pic_num_x >> 1 } else { pic_num_x };
        self.entries.iter().position(|slot| {
            slot.is_some_and(|r| !r.long_term && Self::frame_num_wrap(pic, r.frame_num) == wrap_x)
        })
    }

    fn long_by_idx(&self, idx: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|slot| slot.is_some_and(|r| r.long_term && r.long_term_frame_idx == idx))
    }

    fn take_at(&mut self, pos: Option<usize>) -> Option<SurfaceIndex> {
        pos.and_then(|p| self.entries[p].take()).map(|r| r.surface)
    }

    fn apply_mmco(
        &mut self,
        pic: &H264Picture,
        op: MmcoOp,
        current: &mut RefFrame,
    ) -> Vec<SurfaceIndex> {
        let mut evicted = Vec::new();
        match op {
            MmcoOp::ForgetShort {
                difference_of_pic_nums_minus1,
            } => {
                let pos = self.short_by_pic_num(pic, difference_of_pic_nums_minus1);
                evicted.extend(self.take_at(pos));
            }
            MmcoOp::ForgetLong { long_term_pic_num } => {
                let idx = if pic.field_type.is_field() {
                    long_term_pic_num >> 1
                } else {
                    long_term_pic_num
                };
                let pos = self.long_by_idx(idx);
                evicted.extend(self.take_at(pos));
            }
            MmcoOp::ConvertShortToLong {
                difference_of_pic_nums_minus1,
                long_term_frame_idx,
            } => {
                let target = self.short_by_pic_num(pic, difference_of_pic_nums_minus1);
                let clash = self.long_by_idx(long_term_frame_idx);
                if clash.is_some() && clash != target {
                    evicted.extend(self.take_at(clash));
                }
                if let Some(r) = target.and_then(|p| self.entries[p].as_mut()) {
                    r.long_term = true;
                    r.long_term_frame_idx = long_term_frame_idx;
                }
            }
            MmcoOp::TrimLong {
                max_long_term_frame_idx_plus1,
            } => {
                for slot in &mut self.entries {
                    let trim = slot.is_some_and(|r| {
                        r.long_term && r.long_term_frame_idx >= max_long_term_frame_idx_plus1
                    });
                    if trim {
                        evicted.extend(slot.take().map(|r| r.surface));
                    }
                }
            }
            MmcoOp::ClearAll => {
                evicted.extend(self.clear());
            }
            MmcoOp::MarkCurrentLong {
                long_term_frame_idx,
            } => {
                let pos = self.long_by_idx(long_term_frame_idx);
                evicted.extend(self.take_at(pos));
                current.long_term = true;
                current.long_term_frame_idx = long_term_frame_idx;
            }
        }
        evicted
    }
}
