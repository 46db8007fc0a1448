use super::finalize::{
    finalize, resolve_destination, resolve_destination_with_limit, trim_silence, FinalizeOptions,
    DEFAULT_TRIM_THRESHOLD,
};
use super::writer::{SegmentWriter, SEGMENT_BYTE_CAP};
use crate::audio::SampleFormat;
use crate::error::PipelineError;
use crate::metadata::parse_title;
use hound::{WavReader, WavSpec, WavWriter};
use std::fs;
use std::path::{Path, PathBuf};

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tracksplit_segment_{tag}_{}", std::process::id()));
    fs::remove_dir_all(&dir).ok();
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn mono_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_wav(path: &Path, spec: WavSpec, samples: &[i16]) {
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        writer.write_sample(sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

fn read_wav(path: &Path) -> Vec<i16> {
    WavReader::open(path)
        .expect("open wav")
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .expect("read samples")
}

fn frames_i16(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[test]
fn writer_round_trips_int16_frames() {
    let dir = temp_dir("roundtrip");
    let path = dir.join("take.wav");
    let samples = [100i16, -200, 300, -400];

    let mut writer =
        SegmentWriter::open(path.clone(), SampleFormat::Int16, 1, 8_000).expect("open");
    writer.write(&frames_i16(&samples)).expect("write");
    let closed = writer.close().expect("close");

    assert_eq!(closed.bytes_written, 8);
    assert_eq!(closed.channels, 1);
    assert_eq!(closed.sample_rate, 8_000);
    assert_eq!(read_wav(&path), samples);

    let spec = WavReader::open(&path).expect("reopen").spec();
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn writer_round_trips_float_frames() {
    let dir = temp_dir("float");
    let path = dir.join("take.wav");
    let samples = [0.5f32, -0.25, 1.0];
    let mut bytes = Vec::new();
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    let mut writer =
        SegmentWriter::open(path.clone(), SampleFormat::Float32, 1, 48_000).expect("open");
    writer.write(&bytes).expect("write");
    writer.close().expect("close");

    let read: Vec<f32> = WavReader::open(&path)
        .expect("open wav")
        .samples::<f32>()
        .collect::<Result<_, _>>()
        .expect("read samples");
    assert_eq!(read, samples);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn writer_rejects_misaligned_frames() {
    let dir = temp_dir("misaligned");
    let mut writer = SegmentWriter::open(
        dir.join("take.wav"),
        SampleFormat::Int16,
        2,
        8_000,
    )
    .expect("open");
    let err = writer.write(&[0u8; 6]).expect_err("1.5 frames rejected");
    assert!(matches!(err, PipelineError::Format { .. }));
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn writer_rotates_exactly_at_the_byte_cap() {
    let dir = temp_dir("cap");
    let mut writer = SegmentWriter::open(
        dir.join("first.wav"),
        SampleFormat::Int16,
        1,
        8_000,
    )
    .expect("open");
    writer.set_bytes_written_for_tests(SEGMENT_BYTE_CAP - 10);

    // Filling up to the cap exactly is fine; one byte over is not.
    assert!(!writer.would_overflow(10));
    assert!(writer.would_overflow(12));

    let closed = writer.rotate(dir.join("second.wav")).expect("rotate");
    assert_eq!(closed.bytes_written, SEGMENT_BYTE_CAP - 10);

    // The overflowing chunk lands at the start of the new segment.
    let chunk = frames_i16(&[1, 2, 3, 4, 5, 6]);
    writer.write(&chunk).expect("write to fresh segment");
    assert_eq!(writer.bytes_written(), 12);
    assert!(!writer.would_overflow(12));

    writer.close().expect("close");
    fs::remove_dir_all(&dir).ok();
}

#[test]
fn rotation_assigns_frames_to_the_right_files() {
    let dir = temp_dir("rotate");
    let first_path = dir.join("first.wav");
    let second_path = dir.join("second.wav");
    let before = [10i16, 20, 30];
    let after = [-5i16, -10];

    let mut writer =
        SegmentWriter::open(first_path.clone(), SampleFormat::Int16, 1, 8_000).expect("open");
    writer.write(&frames_i16(&before)).expect("write");
    let closed = writer.rotate(second_path.clone()).expect("rotate");
    writer.write(&frames_i16(&after)).expect("write");
    let last = writer.close().expect("close");

    assert_eq!(closed.path, first_path);
    assert_eq!(closed.bytes_written, 6);
    assert_eq!(last.bytes_written, 4);
    assert_eq!(read_wav(&first_path), before);
    assert_eq!(read_wav(&second_path), after);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn trim_removes_leading_and_trailing_silence() {
    let dir = temp_dir("trim");
    let path = dir.join("take.wav");
    let mut samples = vec![0i16; 100];
    samples.extend(std::iter::repeat(5_000).take(50));
    samples.extend(std::iter::repeat(0).take(100));
    write_wav(&path, mono_spec(), &samples);

    trim_silence(&path, DEFAULT_TRIM_THRESHOLD).expect("trim");

    let kept = read_wav(&path);
    assert_eq!(kept.len(), 50);
    assert!(kept.iter().all(|&s| s == 5_000));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn trim_preserves_an_all_silent_file() {
    let dir = temp_dir("allsilent");
    let path = dir.join("take.wav");
    let samples = vec![0i16; 100];
    write_wav(&path, mono_spec(), &samples);

    trim_silence(&path, DEFAULT_TRIM_THRESHOLD).expect("trim must not fail");

    let kept = read_wav(&path);
    assert_eq!(kept, samples, "silent file must come back unchanged");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn trim_keeps_frames_aligned_for_stereo() {
    let dir = temp_dir("stereo");
    let path = dir.join("take.wav");
    let spec = WavSpec {
        channels: 2,
        ..mono_spec()
    };
    // Loud samples sit mid-frame on both ends; the cut must not split frames.
    let samples = [0i16, 0, 0, 600, 700, 0, 0, 0];
    write_wav(&path, spec, &samples);

    trim_silence(&path, DEFAULT_TRIM_THRESHOLD).expect("trim");

    assert_eq!(read_wav(&path), vec![0, 600, 700, 0]);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn trim_leaves_a_fully_loud_file_alone() {
    let dir = temp_dir("loud");
    let path = dir.join("take.wav");
    let samples = vec![4_000i16; 40];
    write_wav(&path, mono_spec(), &samples);

    trim_silence(&path, DEFAULT_TRIM_THRESHOLD).expect("trim");
    assert_eq!(read_wav(&path), samples);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn destination_names_append_smallest_free_suffix() {
    let dir = temp_dir("naming");
    assert_eq!(
        resolve_destination(&dir, "song", "flac").expect("fresh name"),
        dir.join("song.flac")
    );

    fs::write(dir.join("song.flac"), b"x").expect("seed");
    assert_eq!(
        resolve_destination(&dir, "song", "flac").expect("first suffix"),
        dir.join("song(1).flac")
    );

    fs::write(dir.join("song(1).flac"), b"x").expect("seed");
    assert_eq!(
        resolve_destination(&dir, "song", "flac").expect("second suffix"),
        dir.join("song(2).flac")
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn destination_search_is_bounded() {
    let dir = temp_dir("exhausted");
    fs::write(dir.join("song.wav"), b"x").expect("seed");
    fs::write(dir.join("song(1).wav"), b"x").expect("seed");
    fs::write(dir.join("song(2).wav"), b"x").expect("seed");

    let err = resolve_destination_with_limit(&dir, "song", "wav", 2)
        .expect_err("bounded search must give up");
    assert!(matches!(
        err,
        PipelineError::CollisionExhausted { attempts: 2, .. }
    ));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn finalize_trims_and_renames_without_transcode() {
    let dir = temp_dir("finalize");
    let path = dir.join("20240101120000.wav");
    let mut samples = vec![0i16; 20];
    samples.extend(std::iter::repeat(3_000).take(30));
    samples.extend(std::iter::repeat(0).take(20));
    write_wav(&path, mono_spec(), &samples);

    let metadata = parse_title("Song - A / B");
    let opts = FinalizeOptions {
        songs_dir: dir.join("songs"),
        convert_to_flac: false,
        ffmpeg_cmd: "ffmpeg".to_string(),
        trim_threshold: DEFAULT_TRIM_THRESHOLD,
    };
    let dest = finalize(&path, &metadata.file_stem(), &metadata, &opts).expect("finalize");

    assert_eq!(dest, dir.join("songs").join("A,B-Song.wav"));
    assert!(!path.exists(), "source is renamed away");
    assert_eq!(read_wav(&dest).len(), 30, "destination holds trimmed audio");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn transcode_failure_keeps_the_trimmed_file() {
    let dir = temp_dir("transcode");
    let path = dir.join("take.wav");
    let mut samples = vec![0i16; 20];
    samples.extend(std::iter::repeat(3_000).take(30));
    write_wav(&path, mono_spec(), &samples);

    let metadata = parse_title("Song - A");
    let opts = FinalizeOptions {
        songs_dir: dir.join("songs"),
        convert_to_flac: true,
        ffmpeg_cmd: "tracksplit-test-missing-encoder".to_string(),
        trim_threshold: DEFAULT_TRIM_THRESHOLD,
    };
    let err = finalize(&path, "Song", &metadata, &opts).expect_err("encoder is missing");
    assert!(matches!(err, PipelineError::Transcode { .. }));

    // The trim already happened and survives the failed transcode.
    assert!(path.exists());
    assert_eq!(read_wav(&path).len(), 30);

    fs::remove_dir_all(&dir).ok();
}
