//! H.264 旧式引擎解码流程测试.

mod common;

use common::{ScriptedLegacy, ScriptedParser, SharedSink, h264_access_unit, test_config};
use tao_core::{Rational, TaoError};
use tao_dxva::codecs::h264::picture::H264Picture;
use tao_dxva::{CompressedBufferType, DecodeStatus, EngineKind, H264Protocol, PictureType};
use tao_hwaccel::legacy_decoder;

fn idr(poc: i32) -> H264Picture {
    let mut pic = H264Picture::new(PictureType::I, 0, poc);
    pic.is_idr = true;
    pic
}

#[test]
fn test_按_poc_顺序显示() {
    let mut first = idr(0);
    first.sample_aspect = Some(Rational::new(16, 11));
    let pictures = vec![
        first,
        H264Picture::new(PictureType::P, 1, 4),
        H264Picture::new(PictureType::B, 2, 2),
    ];
    let (accel, log) = ScriptedLegacy::new();
    let sink = SharedSink::new(0);
    let mut decoder = legacy_decoder(
        Box::new(accel),
        Box::new(sink.clone()),
        test_config(720, 576, 8),
        Box::new(H264Protocol::new(Box::new(ScriptedParser::new(pictures)))),
        None,
    )
    .unwrap();
    assert_eq!(decoder.engine_kind(), EngineKind::Legacy);

    let inputs = [(true, 0), (false, 800_000), (false, 400_000)];
    for (is_idr, start) in inputs {
        let status = decoder
            .decode_frame(&h264_access_unit(is_idr), Some(start), Some(start + 400_000))
            .unwrap();
        assert_eq!(status, DecodeStatus::Decoded);
    }
    // 积压未超过上限, 尚未显示
    assert!(sink.delivered().is_empty());
    assert_eq!(decoder.context().store().waiting(), 3);

    assert_eq!(decoder.drain().unwrap(), 3);
    let delivered = sink.delivered();
    let types: Vec<_> = delivered.iter().map(|s| s.picture_type).collect();
    assert_eq!(types, vec![PictureType::I, PictureType::B, PictureType::P]);
    let starts: Vec<_> = delivered.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![Some(0), Some(400_000), Some(800_000)]);
    assert_eq!(delivered[0].display_aspect, Some(Rational::new(20, 11)));
    assert_eq!(delivered[1].display_aspect, None);
    assert_eq!(decoder.context().store().waiting(), 0);

    let log = log.lock().unwrap();
    // 每帧两次 Execute: 图像参数一次, 码流/条带/量化矩阵一次
    assert_eq!(log.executes.len(), 6);
    let second: Vec<_> = log.executes[1].iter().map(|d| d.buffer_type).collect();
    assert_eq!(
        second,
        vec![
            CompressedBufferType::Bitstream,
            CompressedBufferType::SliceControl,
            CompressedBufferType::InverseQuantizationMatrix,
        ]
    );
    assert_eq!(log.executes[1][0].data_size, 128);
    assert_eq!(log.displayed.len(), 3);
    assert_eq!(log.begun.len(), 3);
    assert_eq!(log.ended.len(), 3);
}

#[test]
fn test_刷新后丢弃非关键帧() {
    let pictures = vec![
        idr(0),
        H264Picture::new(PictureType::P, 1, 2),
        H264Picture::new(PictureType::P, 2, 4),
        idr(0),
    ];
    let parser = ScriptedParser::new(pictures);
    let resets = parser.resets();
    let (accel, log) = ScriptedLegacy::new();
    let mut decoder = legacy_decoder(
        Box::new(accel),
        Box::new(SharedSink::new(0)),
        test_config(1920, 1080, 8),
        Box::new(H264Protocol::new(Box::new(parser))),
        None,
    )
    .unwrap();

    decoder.decode_frame(&h264_access_unit(true), Some(0), None).unwrap();
    decoder.decode_frame(&h264_access_unit(false), Some(1), None).unwrap();
    decoder.flush();
    assert_eq!(*resets.lock().unwrap(), 1);
    assert!(decoder.context().is_flushed());
    assert!(decoder.context().store().iter().all(|(_, slot)| !slot.in_use));

    let executes_before = log.lock().unwrap().executes.len();
    let status = decoder.decode_frame(&h264_access_unit(false), Some(2), None).unwrap();
    assert_eq!(status, DecodeStatus::NoOutput);
    assert_eq!(log.lock().unwrap().executes.len(), executes_before);
    assert_eq!(decoder.context().store().waiting(), 0);

    let status = decoder.decode_frame(&h264_access_unit(true), Some(3), None).unwrap();
    assert_eq!(status, DecodeStatus::Decoded);
    assert!(!decoder.context().is_flushed());
    assert_eq!(decoder.context().store().waiting(), 1);
}

#[test]
fn test_表面耗尽后整体刷新() {
    let pictures = vec![
        idr(0),
        H264Picture::new(PictureType::P, 1, 2),
        H264Picture::new(PictureType::P, 2, 4),
        H264Picture::new(PictureType::P, 3, 6),
        H264Picture::new(PictureType::P, 4, 8),
        H264Picture::new(PictureType::P, 5, 10),
        idr(0),
    ];
    let parser = ScriptedParser::new(pictures);
    let resets = parser.resets();
    let (accel, log) = ScriptedLegacy::new();
    let mut decoder = legacy_decoder(
        Box::new(accel),
        Box::new(SharedSink::new(0)),
        test_config(720, 576, 4),
        Box::new(H264Protocol::new(Box::new(parser))),
        None,
    )
    .unwrap();

    for i in 0..4 {
        let status = decoder
            .decode_frame(&h264_access_unit(i == 0), Some(i), None)
            .unwrap();
        assert_eq!(status, DecodeStatus::Decoded);
    }
    let err = decoder
        .decode_frame(&h264_access_unit(false), Some(4), None)
        .unwrap_err();
    assert!(matches!(err, TaoError::NoFreeSurface));
    assert_eq!(*resets.lock().unwrap(), 1);
    assert!(decoder.context().is_flushed());
    assert_eq!(decoder.context().store().pending_field(), None);
    assert!(decoder.context().store().iter().all(|(_, slot)| !slot.in_use));

    // 参考表已清空, 非关键帧不再提交硬件
    let executes_before = log.lock().unwrap().executes.len();
    let status = decoder.decode_frame(&h264_access_unit(false), Some(5), None).unwrap();
    assert_eq!(status, DecodeStatus::NoOutput);
    assert_eq!(log.lock().unwrap().executes.len(), executes_before);

    let status = decoder.decode_frame(&h264_access_unit(true), Some(6), None).unwrap();
    assert_eq!(status, DecodeStatus::Decoded);
    assert!(!decoder.context().is_flushed());
    assert_eq!(decoder.context().store().waiting(), 1);
}

#[test]
fn test_execute_失败仍释放缓冲区() {
    let (accel, log) = ScriptedLegacy::new();
    log.lock().unwrap().execute_error = Some(-5);
    let mut decoder = legacy_decoder(
        Box::new(accel),
        Box::new(SharedSink::new(0)),
        test_config(1920, 1080, 8),
        Box::new(H264Protocol::new(Box::new(ScriptedParser::new(vec![idr(0)])))),
        None,
    )
    .unwrap();

    let err = decoder
        .decode_frame(&h264_access_unit(true), Some(0), None)
        .unwrap_err();
    assert!(matches!(err, TaoError::Hardware(_)));

    let log = log.lock().unwrap();
    let pic_params = CompressedBufferType::PictureParameters.legacy_type_index();
    assert_eq!(log.executes.len(), 1);
    assert_eq!(log.released, vec![(pic_params, 0)]);
    // 出错后仍结束本帧
    assert_eq!(log.ended.len(), 1);
    drop(log);
    assert_eq!(decoder.context().store().waiting(), 0);
    assert!(decoder.context().store().iter().all(|(_, slot)| !slot.in_use));
}

#[test]
fn test_参数集未就绪时无输出() {
    let (accel, log) = ScriptedLegacy::new();
    let mut decoder = legacy_decoder(
        Box::new(accel),
        Box::new(SharedSink::new(0)),
        test_config(1920, 1080, 4),
        Box::new(H264Protocol::new(Box::new(ScriptedParser::<H264Picture>::new(
            Vec::new(),
        )))),
        None,
    )
    .unwrap();
    let status = decoder.decode_frame(&h264_access_unit(true), None, None).unwrap();
    assert_eq!(status, DecodeStatus::NoOutput);
    assert!(log.lock().unwrap().begun.is_empty());
}
