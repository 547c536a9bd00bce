//! 下游样本交付接口.
//!
//! 下游分配器提供与硬件表面一一绑定的输出样本, 解码器在显示时把样本交还下游.
//! 交付即转移所有权: 交付后样本的持有者变为下游管线.

use std::collections::VecDeque;

use log::trace;
use tao_core::{TaoError, TaoResult};

use crate::sample::OutputSample;
use crate::surface::SurfaceIndex;

/// 下游样本接收者
pub trait DownstreamSink: Send {
    /// 获取一个输出样本.
    ///
    /// 流正在停止时返回 `TaoError::NotCommitted`.
    fn get_delivery_buffer(&mut self, width: u32, height: u32) -> TaoResult<OutputSample>;

    /// 交付一个已填充的样本
    fn deliver(&mut self, sample: OutputSample) -> TaoResult<()>;
}

/// 按表面轮转分配样本并收集交付结果的简单接收者
#[derive(Debug, Default)]
pub struct QueueSink {
    surface_count: u16,
    next_surface: u16,
    outstanding: Vec<OutputSample>,
    delivered: VecDeque<OutputSample>,
    committed: bool,
}

impl QueueSink {
    /// 创建管理 `surface_count` 个表面的接收者
    pub fn new(surface_count: u16) -> Self {
        Self {
            surface_count,
            next_surface: 0,
            outstanding: Vec::new(),
            delivered: VecDeque::new(),
            committed: true,
        }
    }

    /// 设置提交状态, 未提交时分配请求返回 `NotCommitted`
    pub fn set_committed(&mut self, committed: bool) {
        self.committed = committed;
    }

    /// 取出最早交付的样本
    pub fn pop(&mut self) -> Option<OutputSample> {
        self.delivered.pop_front()
    }

    /// 取出全部已交付样本
    pub fn drain_delivered(&mut self) -> Vec<OutputSample> {
        self.delivered.drain(..).collect()
    }

    /// 已交付样本数量
    pub fn delivered_len(&self) -> usize {
        self.delivered.len()
    }

    /// 表面当前是否空闲 (只剩接收者自身的引用)
    fn is_surface_free(&self, surface: SurfaceIndex) -> bool {
        let held = |s: &OutputSample| s.surface() == Some(surface) && s.holders() > 1;
        !self.outstanding.iter().any(held)
    }
}

impl DownstreamSink for QueueSink {
    fn get_delivery_buffer(&mut self, width: u32, height: u32) -> TaoResult<OutputSample> {
        if !self.committed {
            return Err(TaoError::NotCommitted);
        }
        if self.surface_count == 0 {
            return Ok(OutputSample::unbound(width, height));
        }
        // 下游已释放的样本不再占用表面
        self.outstanding.retain(|s| s.holders() > 1);
        for _ in 0..self.surface_count {
            let surface = SurfaceIndex::new(self.next_surface);
            self.next_surface = (self.next_surface + 1) % self.surface_count;
            if self.is_surface_free(surface) {
                let sample = OutputSample::for_surface(surface, width, height);
                self.outstanding.push(sample.clone());
                trace!("DXVA: 分配样本, surface={}", surface);
                return Ok(sample);
            }
        }
        Err(TaoError::NoFreeSurface)
    }

    fn deliver(&mut self, sample: OutputSample) -> TaoResult<()> {
        self.delivered.push_back(sample);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_轮转分配表面() {
        let mut sink = QueueSink::new(2);
        let a = sink.get_delivery_buffer(16, 16).unwrap();
        let b = sink.get_delivery_buffer(16, 16).unwrap();
        assert_eq!(a.surface(), Some(SurfaceIndex::new(0)));
        assert_eq!(b.surface(), Some(SurfaceIndex::new(1)));
        assert!(matches!(
            sink.get_delivery_buffer(16, 16),
            Err(TaoError::NoFreeSurface)
        ));
        drop(a);
        let c = sink.get_delivery_buffer(16, 16).unwrap();
        assert_eq!(c.surface(), Some(SurfaceIndex::new(0)));
    }

    #[test]
    fn test_未提交时拒绝分配() {
        let mut sink = QueueSink::new(2);
        sink.set_committed(false);
        assert!(matches!(
            sink.get_delivery_buffer(16, 16),
            Err(TaoError::NotCommitted)
        ));
    }

    #[test]
    fn test_交付顺序保持() {
        let mut sink = QueueSink::new(0);
        let mut first = sink.get_delivery_buffer(8, 8).unwrap();
        first.start = Some(1);
        let mut second = sink.get_delivery_buffer(8, 8).unwrap();
        second.start = Some(2);
        sink.deliver(first).unwrap();
        sink.deliver(second).unwrap();
        assert_eq!(sink.delivered_len(), 2);
        assert_eq!(sink.pop().unwrap().start, Some(1));
        assert_eq!(sink.drain_delivered().len(), 1);
    }
}
