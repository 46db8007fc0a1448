//! Post-capture processing for closed segments: silence trimming,
//! collision-avoided naming, and the external FLAC transcode.
//!
//! Everything here operates on already-closed files handed off by the
//! pipeline; the live segment is never touched. Failures are scoped to the
//! one segment being finalized.

use crate::error::{PipelineError, MAX_NAME_ATTEMPTS};
use crate::metadata::SongMetadata;
use hound::{WavReader, WavSpec, WavWriter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default trim threshold: the original cut at magnitude 500 on the int16
/// scale; expressed here on the normalized [0,1] scale.
pub const DEFAULT_TRIM_THRESHOLD: f32 = 500.0 / 32_768.0;

#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    pub songs_dir: PathBuf,
    pub convert_to_flac: bool,
    pub ffmpeg_cmd: String,
    pub trim_threshold: f32,
}

/// Rewrite `path` keeping only the span between the first and last sample
/// whose magnitude exceeds `threshold` (normalized scale).
///
/// The span is widened to frame boundaries so multi-channel audio is never
/// cut mid-frame. A file that never crosses the threshold is left untouched:
/// both boundaries default to the full extent, which is the whole file.
pub fn trim_silence(path: &Path, threshold: f32) -> Result<(), PipelineError> {
    let io_err = |source: hound::Error| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = WavReader::open(path).map_err(io_err)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples: Vec<f32> = reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(io_err)?;
            drop(reader);
            let Some((start, end)) =
                loud_range(samples.len(), channels, |i| samples[i].abs() > threshold)
            else {
                return Ok(());
            };
            if (start, end) == (0, samples.len()) {
                return Ok(());
            }
            rewrite(path, spec, &samples[start..end])
        }
        hound::SampleFormat::Int => {
            let raw_threshold = threshold * int_full_scale(spec.bits_per_sample);
            let samples: Vec<i32> = reader
                .samples::<i32>()
                .collect::<Result<_, _>>()
                .map_err(io_err)?;
            drop(reader);
            let Some((start, end)) = loud_range(samples.len(), channels, |i| {
                (samples[i].unsigned_abs() as f32) > raw_threshold
            }) else {
                return Ok(());
            };
            if (start, end) == (0, samples.len()) {
                return Ok(());
            }
            rewrite(path, spec, &samples[start..end])
        }
    }
}

/// Trim the segment, pick a free destination name, then rename or transcode.
///
/// A transcode failure is reported without rolling back the trim; the
/// trimmed WAV stays in place as the encoder input.
pub fn finalize(
    path: &Path,
    song_name: &str,
    metadata: &SongMetadata,
    opts: &FinalizeOptions,
) -> Result<PathBuf, PipelineError> {
    trim_silence(path, opts.trim_threshold)?;

    fs::create_dir_all(&opts.songs_dir).map_err(|e| PipelineError::Io {
        path: opts.songs_dir.clone(),
        source: e.into(),
    })?;

    let ext = if opts.convert_to_flac { "flac" } else { "wav" };
    let dest = resolve_destination(&opts.songs_dir, song_name, ext)?;

    if opts.convert_to_flac {
        transcode_to_flac(path, &dest, metadata, &opts.ffmpeg_cmd)?;
    } else {
        fs::rename(path, &dest).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
    }
    Ok(dest)
}

/// First free path among `stem.ext`, `stem(1).ext`, `stem(2).ext`, ...
pub fn resolve_destination(dir: &Path, stem: &str, ext: &str) -> Result<PathBuf, PipelineError> {
    resolve_destination_bounded(dir, stem, ext, MAX_NAME_ATTEMPTS)
}

pub(crate) fn resolve_destination_bounded(
    dir: &Path,
    stem: &str,
    ext: &str,
    attempts: u32,
) -> Result<PathBuf, PipelineError> {
    let first = dir.join(format!("{stem}.{ext}"));
    if !first.exists() {
        return Ok(first);
    }
    for n in 1..=attempts {
        let candidate = dir.join(format!("{stem}({n}).{ext}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(PipelineError::CollisionExhausted {
        stem: stem.to_string(),
        attempts,
    })
}

fn transcode_to_flac(
    input: &Path,
    dest: &Path,
    metadata: &SongMetadata,
    ffmpeg_cmd: &str,
) -> Result<(), PipelineError> {
    let status = Command::new(ffmpeg_cmd)
        .arg("-loglevel")
        .arg("warning")
        .arg("-i")
        .arg(input)
        .arg("-metadata")
        .arg(format!("title={}", metadata.title))
        .arg("-metadata")
        .arg(format!("artist={}", metadata.artists.join("; ")))
        .arg("-y")
        .arg(dest)
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(PipelineError::Transcode {
            path: input.to_path_buf(),
            reason: format!("{ffmpeg_cmd} exited with {status}"),
        }),
        Err(err) => Err(PipelineError::Transcode {
            path: input.to_path_buf(),
            reason: format!("failed to run {ffmpeg_cmd}: {err}"),
        }),
    }
}

/// Indices of the loud span, widened outward to frame boundaries.
/// None when no sample is loud (the caller leaves the file as-is).
fn loud_range(
    len: usize,
    channels: usize,
    is_loud: impl Fn(usize) -> bool,
) -> Option<(usize, usize)> {
    let first = (0..len).find(|&i| is_loud(i))?;
    let last = (0..len).rev().find(|&i| is_loud(i))?;
    let start = first - first % channels;
    let end = ((last / channels + 1) * channels).min(len);
    Some((start, end))
}

fn int_full_scale(bits: u16) -> f32 {
    match bits {
        8 => i8::MAX as f32,
        16 => i16::MAX as f32,
        24 => 8_388_607.0,
        _ => i32::MAX as f32,
    }
}

/// Write the kept span to a sibling temp file, then swap it into place.
fn rewrite<S>(path: &Path, spec: WavSpec, samples: &[S]) -> Result<(), PipelineError>
where
    S: hound::Sample + Copy,
{
    let io_err = |source: hound::Error, at: &Path| PipelineError::Io {
        path: at.to_path_buf(),
        source,
    };
    let tmp = path.with_extension("trim.tmp");
    let mut writer = WavWriter::create(&tmp, spec).map_err(|e| io_err(e, &tmp))?;
    for &sample in samples {
        writer.write_sample(sample).map_err(|e| io_err(e, &tmp))?;
    }
    writer.finalize().map_err(|e| io_err(e, &tmp))?;

    fs::rename(&tmp, path).map_err(|e| PipelineError::Io {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

#[cfg(test)]
pub(crate) use resolve_destination_bounded as resolve_destination_with_limit;
