//! Media file probing via ffprobe, and the file-backed [`SourceAsset`].

use crate::asset::{SourceAsset, TrackInfo, TrackKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use trimkit_core::{FrameRate, Orientation, RationalTime, Result, TimeRange, TrimError};
use uuid::Uuid;

/// Information about a media file.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    /// File path
    pub path: PathBuf,
    /// Duration (end of the longest track)
    pub duration: RationalTime,
    /// All tracks, in container order
    pub tracks: Vec<TrackInfo>,
    /// Video stream details
    pub video_streams: Vec<VideoStreamInfo>,
    /// Container format
    pub format: String,
}

/// Information about a video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamInfo {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<FrameRate>,
}

// ── ffprobe JSON ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    time_base: Option<String>,
    start_pts: Option<i64>,
    duration_ts: Option<i64>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

/// Parse an ffprobe ratio such as `1/15360` or `30000/1001`.
fn parse_ratio(text: &str) -> Option<(i64, i64)> {
    let (num, den) = text.split_once('/')?;
    let num = num.trim().parse().ok()?;
    let den: i64 = den.trim().parse().ok()?;
    (den != 0).then_some((num, den))
}

impl ProbeStream {
    fn kind(&self) -> TrackKind {
        match self.codec_type.as_deref() {
            Some("video") => TrackKind::Video,
            Some("audio") => TrackKind::Audio,
            _ => TrackKind::Other,
        }
    }

    /// Exact track span from timestamps and time base, falling back to the
    /// float duration string.
    fn time_range(&self) -> Option<TimeRange> {
        if let (Some((tb_num, tb_den)), Some(duration_ts)) =
            (self.time_base.as_deref().and_then(parse_ratio), self.duration_ts)
        {
            let tick = RationalTime::new(tb_num, tb_den);
            let start = tick * self.start_pts.unwrap_or(0).max(0);
            return Some(TimeRange::new(start, tick * duration_ts));
        }
        let seconds: f64 = self.duration.as_deref()?.parse().ok()?;
        Some(TimeRange::full(RationalTime::from_seconds_f64(seconds)))
    }

    /// Clockwise display rotation. The display matrix reports
    /// counter-clockwise degrees; the legacy `rotate` tag is clockwise.
    fn orientation(&self) -> Orientation {
        if let Some(rotation) = self.side_data_list.iter().find_map(|s| s.rotation) {
            return Orientation::from_rotation_degrees(-rotation);
        }
        self.tags
            .get("rotate")
            .and_then(|r| r.parse::<f64>().ok())
            .map(Orientation::from_rotation_degrees)
            .unwrap_or_default()
    }
}

impl MediaProbe {
    /// Probe a media file with ffprobe.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TrimError::AssetLoadFailed(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let ffprobe = ffmpeg_sidecar::ffprobe::ffprobe_path();
        debug!(ffprobe = %ffprobe.display(), path = %path.display(), "Running ffprobe");

        let output = Command::new(&ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| TrimError::AssetLoadFailed(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(TrimError::AssetLoadFailed(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Self::from_ffprobe_json(path, &output.stdout)
    }

    /// Build probe results from ffprobe's JSON output.
    pub fn from_ffprobe_json(path: &Path, json: &[u8]) -> Result<Self> {
        let raw: ProbeOutput = serde_json::from_slice(json)
            .map_err(|e| TrimError::AssetLoadFailed(format!("Invalid ffprobe output: {e}")))?;

        let format = raw
            .format
            .as_ref()
            .and_then(|f| f.format_name.clone())
            .unwrap_or_default();

        let mut tracks = Vec::new();
        let mut video_streams = Vec::new();
        for stream in &raw.streams {
            let Some(time_range) = stream.time_range() else {
                continue;
            };
            let kind = stream.kind();
            tracks.push(TrackInfo {
                index: stream.index,
                kind,
                codec: stream.codec_name.clone().unwrap_or_default(),
                time_range,
                orientation: stream.orientation(),
            });
            if kind == TrackKind::Video {
                video_streams.push(VideoStreamInfo {
                    index: stream.index,
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    frame_rate: stream
                        .r_frame_rate
                        .as_deref()
                        .and_then(parse_ratio)
                        .filter(|(n, d)| *n > 0 && *d > 0)
                        .map(|(n, d)| FrameRate::new(n as u32, d as u32)),
                });
            }
        }

        let track_end = tracks.iter().map(|t| t.time_range.end()).max();
        let format_duration = raw
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
            .map(RationalTime::from_seconds_f64);

        let duration = track_end.or(format_duration).ok_or_else(|| {
            TrimError::AssetLoadFailed(format!(
                "Could not determine duration of {}",
                path.display()
            ))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            duration,
            tracks,
            video_streams,
            format,
        })
    }

    /// Check if the file has video.
    pub fn has_video(&self) -> bool {
        !self.video_streams.is_empty()
    }

    /// Get the primary video stream info.
    pub fn primary_video(&self) -> Option<&VideoStreamInfo> {
        self.video_streams.first()
    }
}

/// A media file on disk. Metadata is probed lazily, once.
#[derive(Debug)]
pub struct FileAsset {
    id: Uuid,
    path: PathBuf,
    probe: OnceCell<MediaProbe>,
}

impl FileAsset {
    /// Open a media file; nothing is read until metadata is requested.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            probe: OnceCell::new(),
        }
    }

    /// Probe results, running ffprobe on first use.
    pub async fn probe(&self) -> Result<&MediaProbe> {
        self.probe
            .get_or_try_init(|| async {
                let path = self.path.clone();
                let probe = tokio::task::spawn_blocking(move || MediaProbe::probe(path))
                    .await
                    .map_err(|e| TrimError::AssetLoadFailed(format!("Probe task failed: {e}")))??;
                info!(
                    path = %probe.path.display(),
                    duration = %probe.duration,
                    tracks = probe.tracks.len(),
                    "Asset loaded"
                );
                Ok(probe)
            })
            .await
    }
}

#[async_trait]
impl SourceAsset for FileAsset {
    fn id(&self) -> Uuid {
        self.id
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn full_duration(&self) -> Result<RationalTime> {
        Ok(self.probe().await?.duration)
    }

    async fn tracks(&self) -> Result<Vec<TrackInfo>> {
        Ok(self.probe().await?.tracks.clone())
    }
}
