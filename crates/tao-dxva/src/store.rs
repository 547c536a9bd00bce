//! 图像存储区 (解码表面槽位池).
//!
//! 槽位数组在解码器实例创建时按协商的表面数量分配一次, 生命周期与解码器相同.
//! 槽位状态迁移:
//!
//! ```text
//! 空闲 ──add_to_store──▶ 使用中 ──┬── remove_ref_frame ──▶ (已显示则) 空闲
//!                                  └── mark_displayed ───▶ (非参考则) 空闲
//! ```
//!
//! `waiting` 统计已就绪 (场对已完整) 但尚未显示的图像数量.
//! 场图像的第一场只挂起, 直到同一表面上的第二场到达才计入.

use log::{debug, warn};
use tao_core::{TaoError, TaoResult};

use crate::sample::{FieldType, OutputSample, PictureType};
use crate::surface::SurfaceIndex;

/// 单个表面槽位
#[derive(Debug, Clone, Default)]
pub struct PictureSlot {
    /// 是否被解码图像占用
    pub in_use: bool,
    /// 是否已显示
    pub displayed: bool,
    /// 是否仍被用作参考帧
    pub is_reference: bool,
    /// 是否已计入等待显示的数量 (场对完整)
    pub ready: bool,
    /// 绑定的输出样本 (仅新式引擎持有)
    pub sample: Option<OutputSample>,
    /// 显示开始时间 (100ns)
    pub start: Option<i64>,
    /// 显示结束时间 (100ns)
    pub stop: Option<i64>,
    /// 编解码器自定义标签 (H.264 为 POC, MPEG-2 为编码序号)
    pub codec_tag: i32,
    /// 场结构
    pub field_type: FieldType,
    /// 图片类型
    pub picture_type: PictureType,
    /// 释放代数, 越小表示越早被释放
    pub freed_generation: u64,
}

impl PictureSlot {
    /// 已就绪且尚未显示
    pub fn is_pending_display(&self) -> bool {
        self.in_use && self.ready && !self.displayed
    }

    fn reset(&mut self, freed_generation: u64) {
        *self = Self {
            freed_generation,
            ..Self::default()
        };
    }
}

/// 存入存储区的一幅解码图像
#[derive(Debug, Clone)]
pub struct PictureEntry {
    /// 目标表面
    pub surface: SurfaceIndex,
    /// 绑定的输出样本
    pub sample: Option<OutputSample>,
    /// 是否为参考帧
    pub is_reference: bool,
    /// 显示开始时间
    pub start: Option<i64>,
    /// 显示结束时间
    pub stop: Option<i64>,
    /// 场结构
    pub field_type: FieldType,
    /// 图片类型
    pub picture_type: PictureType,
    /// 编解码器自定义标签
    pub codec_tag: i32,
}

impl PictureEntry {
    /// 创建逐行帧条目, 其余字段使用默认值
    pub fn frame(surface: SurfaceIndex, picture_type: PictureType) -> Self {
        Self {
            surface,
            sample: None,
            is_reference: false,
            start: None,
            stop: None,
            field_type: FieldType::Frame,
            picture_type,
            codec_tag: 0,
        }
    }
}

/// 图像存储区
#[derive(Debug)]
pub struct PictureStore {
    slots: Vec<PictureSlot>,
    waiting: usize,
    pending_field: Option<SurfaceIndex>,
    next_generation: u64,
}

impl PictureStore {
    /// 创建指定槽位数量的存储区
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![PictureSlot::default(); count],
            waiting: 0,
            pending_field: None,
            next_generation: 1,
        }
    }

    /// 槽位数量
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 存储区是否为空
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 已就绪但尚未显示的图像数量
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// 等待第二场的表面
    pub fn pending_field(&self) -> Option<SurfaceIndex> {
        self.pending_field
    }

    /// 读取槽位
    pub fn slot(&self, surface: SurfaceIndex) -> Option<&PictureSlot> {
        self.slots.get(surface.get())
    }

    /// 遍历全部槽位
    pub fn iter(&self) -> impl Iterator<Item = (SurfaceIndex, &PictureSlot)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (SurfaceIndex::new(i as u16), slot))
    }

    /// 遍历已就绪且尚未显示的槽位
    pub fn pending_display(&self) -> impl Iterator<Item = (SurfaceIndex, &PictureSlot)> {
        self.iter().filter(|(_, slot)| slot.is_pending_display())
    }

    fn slot_mut(&mut self, surface: SurfaceIndex) -> TaoResult<&mut PictureSlot> {
        let count = self.slots.len();
        self.slots.get_mut(surface.get()).ok_or_else(|| {
            TaoError::InvalidArgument(format!(
                "DXVA: 表面索引越界, surface={}, count={}",
                surface, count
            ))
        })
    }

    /// 存入一幅解码图像, 返回是否已形成完整的可显示单元.
    ///
    /// 场图像的第一场挂起且不计入等待数量; 同一表面上的第二场到达后才计入.
    /// 若挂起的第一场等到的是另一表面上的图像, 挂起槽位被视为孤场: 不再显示,
    /// 仍是参考帧时保留到解除参考为止.
    pub fn add_to_store(&mut self, entry: PictureEntry) -> TaoResult<bool> {
        let surface = entry.surface;
        self.slot_mut(surface)?;

        if let Some(pending) = self.pending_field {
            if pending == surface {
                let slot = self.slot_mut(surface)?;
                slot.is_reference |= entry.is_reference;
                if slot.start.is_none() {
                    slot.start = entry.start;
                }
                slot.stop = entry.stop.or(slot.stop);
                slot.ready = true;
                self.pending_field = None;
                self.waiting += 1;
                debug!("DXVA: 场对完整, surface={}", surface);
                return Ok(true);
            }
            warn!(
                "DXVA: 丢弃孤立的第一场, surface={}, 新图像 surface={}",
                pending, surface
            );
            self.pending_field = None;
            self.mark_displayed(pending)?;
        }

        let slot = self.slot_mut(surface)?;
        if slot.in_use {
            return Err(TaoError::InvalidArgument(format!(
                "DXVA: 表面仍被占用, surface={}",
                surface
            )));
        }

        let is_field = entry.field_type.is_field();
        slot.in_use = true;
        slot.displayed = false;
        slot.is_reference = entry.is_reference;
        slot.sample = entry.sample;
        slot.start = entry.start;
        slot.stop = entry.stop;
        slot.codec_tag = entry.codec_tag;
        slot.field_type = entry.field_type;
        slot.picture_type = entry.picture_type;
        slot.ready = !is_field;

        if is_field {
            self.pending_field = Some(surface);
            return Ok(false);
        }
        self.waiting += 1;
        Ok(true)
    }

    /// 修正已存入且尚未显示的图像的时间戳, 返回是否生效
    pub fn update_store(
        &mut self,
        surface: SurfaceIndex,
        start: Option<i64>,
        stop: Option<i64>,
    ) -> TaoResult<bool> {
        let slot = self.slot_mut(surface)?;
        if !slot.in_use || slot.displayed {
            return Ok(false);
        }
        slot.start = start;
        slot.stop = stop;
        Ok(true)
    }

    /// 解除参考状态; 已显示的槽位立即释放, 否则等显示后释放
    pub fn remove_ref_frame(&mut self, surface: SurfaceIndex) -> TaoResult<()> {
        let slot = self.slot_mut(surface)?;
        if !slot.in_use {
            return Ok(());
        }
        slot.is_reference = false;
        if slot.displayed {
            self.free_picture_slot(surface)?;
        }
        Ok(())
    }

    /// 释放槽位并打上新的释放代数
    pub fn free_picture_slot(&mut self, surface: SurfaceIndex) -> TaoResult<()> {
        let generation = self.next_generation;
        let slot = self.slot_mut(surface)?;
        let counted = slot.ready && !slot.displayed;
        slot.reset(generation);
        self.next_generation += 1;
        if counted {
            self.waiting = self.waiting.saturating_sub(1);
        }
        if self.pending_field == Some(surface) {
            self.pending_field = None;
        }
        Ok(())
    }

    /// 标记已显示; 非参考帧随即释放. 返回槽位是否被释放
    pub fn mark_displayed(&mut self, surface: SurfaceIndex) -> TaoResult<bool> {
        let slot = self.slot_mut(surface)?;
        if !slot.in_use || slot.displayed {
            return Ok(false);
        }
        slot.displayed = true;
        let counted = slot.ready;
        let keep = slot.is_reference;
        if counted {
            self.waiting = self.waiting.saturating_sub(1);
        }
        if keep {
            return Ok(false);
        }
        self.free_picture_slot(surface)?;
        Ok(true)
    }

    /// 选择下一个可用表面: 优先返回等待第二场的表面, 否则返回最早释放的空闲槽位
    pub fn free_surface_index(&self) -> Option<SurfaceIndex> {
        if let Some(pending) = self.pending_field {
            return Some(pending);
        }
        self.iter()
            .filter(|(_, slot)| !slot.in_use)
            .min_by_key(|(_, slot)| slot.freed_generation)
            .map(|(surface, _)| surface)
    }

    /// 已就绪未显示的图像中开始时间最早的一个
    pub fn oldest_by_start_time(&self) -> Option<SurfaceIndex> {
        self.pending_display()
            .min_by_key(|(_, slot)| slot.start.unwrap_or(i64::MIN))
            .map(|(surface, _)| surface)
    }

    /// 已就绪未显示且标签匹配的槽位
    pub fn find_by_tag(&self, codec_tag: i32) -> Option<SurfaceIndex> {
        self.pending_display()
            .find(|(_, slot)| slot.codec_tag == codec_tag)
            .map(|(surface, _)| surface)
    }

    /// 取走槽位持有的样本
    pub fn take_sample(&mut self, surface: SurfaceIndex) -> Option<OutputSample> {
        self.slots.get_mut(surface.get())?.sample.take()
    }

    /// 重置全部槽位
    pub fn flush(&mut self) {
        for slot in &mut self.slots {
            slot.reset(0);
        }
        self.waiting = 0;
        self.pending_field = None;
        self.next_generation = 1;
    }
}
