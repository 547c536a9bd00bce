//! 图像存储区与显示调度性能基准测试.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tao_hwaccel::dxva::{PictureEntry, PictureStore, PictureType, SurfaceIndex};

const SURFACES: usize = 22;

/// 模拟 I P B B 循环: 参考帧保留两个, B 帧显示后立即释放
fn run_gop(store: &mut PictureStore, frames: usize) {
    let mut refs: [Option<SurfaceIndex>; 2] = [None, None];
    for n in 0..frames {
        let picture_type = match n % 4 {
            0 => PictureType::I,
            1 => PictureType::P,
            _ => PictureType::B,
        };
        let is_reference = picture_type != PictureType::B;
        let Some(surface) = store.free_surface_index() else {
            store.flush();
            continue;
        };
        let entry = PictureEntry {
            is_reference,
            start: Some(n as i64 * 400_000),
            codec_tag: n as i32,
            ..PictureEntry::frame(surface, picture_type)
        };
        if store.add_to_store(entry).is_err() {
            continue;
        }
        if is_reference {
            if let Some(old) = refs[0].take() {
                let _ = store.remove_ref_frame(old);
            }
            refs = [refs[1], Some(surface)];
        }
        if store.waiting() > 5 {
            if let Some(oldest) = store.oldest_by_start_time() {
                let _ = store.mark_displayed(oldest);
            }
        }
    }
}

fn bench_store_gop(c: &mut Criterion) {
    c.bench_function("store_ipbb_1000_frames", |b| {
        b.iter(|| {
            let mut store = PictureStore::new(SURFACES);
            run_gop(&mut store, black_box(1000));
            black_box(store.waiting());
        });
    });
}

fn bench_oldest_by_start(c: &mut Criterion) {
    let mut store = PictureStore::new(SURFACES);
    for i in 0..SURFACES {
        let entry = PictureEntry {
            start: Some(((i * 7919) % SURFACES) as i64),
            ..PictureEntry::frame(SurfaceIndex::new(i as u16), PictureType::P)
        };
        let _ = store.add_to_store(entry);
    }
    c.bench_function("store_oldest_by_start_22", |b| {
        b.iter(|| black_box(store.oldest_by_start_time()));
    });
}

criterion_group!(benches, bench_store_gop, bench_oldest_by_start);
criterion_main!(benches);
