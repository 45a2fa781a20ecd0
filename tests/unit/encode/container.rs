use std::{io::Cursor, time::Duration};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use super::*;

fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn solid_sources(n: usize, width: u32, height: u32) -> Vec<FrameSource> {
    (0..n)
        .map(|i| {
            let c = (i * 80) as u8;
            FrameSource::from_bytes(png_bytes(width, height, [c, 255 - c, 64, 255])).unwrap()
        })
        .collect()
}

fn opts_in(dir: &Path, timing: TimingSpec) -> AssembleOpts {
    AssembleOpts {
        timing,
        directory: dir.to_path_buf(),
        ..Default::default()
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[test]
fn frames_and_delay_survive_assembly() {
    let dir = tempfile::tempdir().unwrap();
    let container = assemble(
        &solid_sources(3, 64, 64),
        &opts_in(dir.path(), TimingSpec::from_millis(200, 0)),
    )
    .unwrap();

    let source = FrameSource::from_bytes(container.read_bytes().unwrap()).unwrap();
    assert_eq!(source.frame_count(), 3);
    for index in 0..3 {
        assert_eq!(
            source.metadata(index).and_then(|m| m.delay),
            Some(Duration::from_millis(200))
        );
    }
}

#[test]
fn loop_count_is_written_once_for_the_container() {
    let dir = tempfile::tempdir().unwrap();
    let container = assemble(
        &solid_sources(2, 8, 8),
        &opts_in(dir.path(), TimingSpec::from_millis(100, 3)),
    )
    .unwrap();
    let bytes = container.read_bytes().unwrap();
    let ext = b"NETSCAPE2.0\x03\x01\x03\x00";
    assert_eq!(bytes.windows(ext.len()).filter(|w| w == ext).count(), 1);
}

#[test]
fn max_pixel_size_bounds_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let container = assemble(
        &solid_sources(2, 64, 32),
        &AssembleOpts {
            max_pixel_size: Some(16),
            ..opts_in(dir.path(), TimingSpec::default())
        },
    )
    .unwrap();
    let source = FrameSource::from_bytes(container.read_bytes().unwrap()).unwrap();
    let frame = source.decode(1).unwrap();
    assert_eq!((frame.width(), frame.height()), (16, 8));
}

#[test]
fn dropping_the_handle_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let container = assemble(&solid_sources(1, 4, 4), &opts_in(dir.path(), TimingSpec::default()))
        .unwrap();
    let path = container.path().to_path_buf();
    assert!(path.exists());
    drop(container);
    assert!(!path.exists());
}

#[test]
fn persisted_container_stays_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let container = assemble(
        &solid_sources(1, 4, 4),
        &AssembleOpts {
            file_name: Some("kept".to_string()),
            ..opts_in(dir.path(), TimingSpec::default())
        },
    )
    .unwrap();
    let path = container.persist();
    assert_eq!(path, dir.path().join("kept.gif"));
    assert!(path.exists());
}

#[test]
fn empty_frame_list_fails_without_leaving_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = assemble(&[], &opts_in(dir.path(), TimingSpec::default())).unwrap_err();
    assert!(matches!(err, GifGenError::Encode(_)));
    assert!(dir_is_empty(dir.path()));
}

#[test]
fn existing_destination_is_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("taken.gif");
    std::fs::write(&existing, b"original").unwrap();

    let err = assemble(
        &solid_sources(2, 4, 4),
        &AssembleOpts {
            file_name: Some("taken.gif".to_string()),
            ..opts_in(dir.path(), TimingSpec::default())
        },
    )
    .unwrap_err();
    assert!(matches!(err, GifGenError::Conflict(_)));
    assert_eq!(std::fs::read(&existing).unwrap(), b"original");
}

#[test]
fn a_failed_append_fails_the_commit() {
    let dir = tempfile::tempdir().unwrap();
    let mut sources = solid_sources(2, 16, 16);

    // The header still parses, so the source constructs, but the pixel data is cut short.
    let full = png_bytes(16, 16, [1, 2, 3, 255]);
    let truncated = FrameSource::from_bytes(&full[..full.len() - 20]).unwrap();
    sources.insert(1, truncated);

    let err = assemble(&sources, &opts_in(dir.path(), TimingSpec::default())).unwrap_err();
    assert!(matches!(err, GifGenError::Encode(_)));
    assert!(dir_is_empty(dir.path()));
}

#[test]
fn out_of_range_encoder_speed_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = assemble(
        &solid_sources(1, 4, 4),
        &AssembleOpts {
            encoder_speed: 0,
            ..opts_in(dir.path(), TimingSpec::default())
        },
    )
    .unwrap_err();
    assert!(matches!(err, GifGenError::Validation(_)));
    assert!(dir_is_empty(dir.path()));
}

#[test]
fn parallel_resampling_keeps_frame_order() {
    let dir = tempfile::tempdir().unwrap();
    let shades = [0u8, 60, 120, 180, 240];
    let sources: Vec<_> = shades
        .iter()
        .map(|&c| FrameSource::from_bytes(png_bytes(12, 12, [c, c, c, 255])).unwrap())
        .collect();
    let container = assemble(
        &sources,
        &AssembleOpts {
            threading: Threading {
                parallel: true,
                threads: Some(2),
            },
            ..opts_in(dir.path(), TimingSpec::default())
        },
    )
    .unwrap();
    let source = FrameSource::from_bytes(container.read_bytes().unwrap()).unwrap();
    assert_eq!(source.frame_count(), shades.len());

    let reds: Vec<u8> = (0..shades.len())
        .map(|i| source.decode(i).unwrap().to_rgba8().get_pixel(6, 6).0[0])
        .collect();
    assert!(reds.windows(2).all(|w| w[0] < w[1]), "{reds:?}");
}

#[test]
fn frames_of_other_sizes_are_fitted_onto_the_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let sources = vec![
        FrameSource::from_bytes(png_bytes(64, 64, [255, 0, 0, 255])).unwrap(),
        FrameSource::from_bytes(png_bytes(128, 32, [0, 0, 255, 255])).unwrap(),
        FrameSource::from_bytes(png_bytes(16, 16, [0, 255, 0, 255])).unwrap(),
    ];
    let container = assemble(&sources, &opts_in(dir.path(), TimingSpec::default())).unwrap();
    let source = FrameSource::from_bytes(container.read_bytes().unwrap()).unwrap();
    assert_eq!(source.frame_count(), 3);

    let px = |index: usize, x: u32, y: u32| {
        let frame = source.decode(index).unwrap().to_rgba8();
        assert_eq!(frame.dimensions(), (64, 64));
        frame.get_pixel(x, y).0
    };
    // The wide frame keeps its whole width, scaled to a 64x16 band.
    for x in [1, 32, 62] {
        let [r, _, b, a] = px(1, x, 32);
        assert!(b > 200 && r < 50 && a == 255, "frame 1 at x={x}");
    }
    let [r, g, _, a] = px(2, 32, 32);
    assert!(g > 200 && r < 50 && a == 255);
}

#[test]
fn delays_are_rounded_to_whole_centiseconds() {
    let dir = tempfile::tempdir().unwrap();
    for (requested, stored) in [(5, 10), (15, 20), (19, 20), (120, 120)] {
        let container = assemble(
            &solid_sources(3, 4, 4),
            &opts_in(dir.path(), TimingSpec::from_millis(requested, 0)),
        )
        .unwrap();
        let source = FrameSource::from_bytes(container.read_bytes().unwrap()).unwrap();
        for index in 0..3 {
            assert_eq!(
                source.metadata(index).and_then(|m| m.delay),
                Some(Duration::from_millis(stored)),
                "requested {requested} ms"
            );
        }
    }
}

#[test]
fn persist_as_replaces_the_destination() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("final.gif");
    std::fs::write(&dest, b"old").unwrap();

    let container = assemble(&solid_sources(2, 4, 4), &opts_in(dir.path(), TimingSpec::default()))
        .unwrap();
    let scratch = container.path().to_path_buf();
    assert_eq!(container.persist_as(&dest).unwrap(), dest);

    assert!(!scratch.exists());
    assert!(std::fs::read(&dest).unwrap().starts_with(b"GIF89a"));
}

#[test]
fn failed_persist_as_cleans_up_and_leaves_the_destination() {
    let dir = tempfile::tempdir().unwrap();
    let container = assemble(&solid_sources(1, 4, 4), &opts_in(dir.path(), TimingSpec::default()))
        .unwrap();
    let scratch = container.path().to_path_buf();
    let dest = dir.path().join("missing-dir").join("out.gif");

    assert!(container.persist_as(&dest).is_err());
    assert!(!dest.exists());
    assert!(!scratch.exists());
}
