//! Order DTO
//!
//! An order is what API clients submit. It is validated and mapped into a
//! waiting [`Job`]. Media probing is not performed here, so the source
//! format and duration are supplied by the caller.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AspectRatio, Attachment, AttachmentKind, Essence, EssenceFile, EssenceFlags, Job, MediaFormat,
    Priority, Resolution,
};
use crate::error::{Error, Result};
use crate::urn;

const LOGO_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const AUDIO_EXTENSIONS: [&str; 1] = ["wav"];
const SUBTITLE_EXTENSIONS: [&str; 1] = ["vtt"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    /// Full path of the file to transcode
    pub file_path: String,
    pub source_format: MediaFormat,
    #[serde(default)]
    pub custom_format: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub source_urn: Option<String>,
    /// Defaults to the file name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub burn_in_logo: bool,
    #[serde(default)]
    pub logo_path: Option<String>,
    #[serde(default)]
    pub alternate_audio_path: Option<String>,
    #[serde(default)]
    pub burn_in_subtitles: bool,
    #[serde(default)]
    pub subtitles_path: Option<String>,
    #[serde(default)]
    pub intro_file_path: Option<String>,
    #[serde(default)]
    pub intro_duration_ms: Option<u64>,
    #[serde(default)]
    pub outro_file_path: Option<String>,
    #[serde(default)]
    pub outro_duration_ms: Option<u64>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub resolution: Resolution,
    pub destination_format: MediaFormat,
    pub destination_path: String,
    /// Name template for the output files.
    ///
    /// Supports `%index%` (1-based) and `%ext%`. A plain name becomes
    /// `<name>_%index%.%ext%`.
    #[serde(default)]
    pub destination_filename: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// Called once the job is done or failed
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl Order {
    /// Validate the fields that can be checked without probing the media
    pub fn validate(&self) -> Result<()> {
        if self.file_path.trim().is_empty() {
            return Err(Error::validation("file_path is required"));
        }
        if Path::new(&self.file_path).file_name().is_none() {
            return Err(Error::validation("file_path must name a file"));
        }
        if self.destination_path.trim().is_empty() {
            return Err(Error::validation("destination_path is required"));
        }
        if self.destination_format == MediaFormat::Unknown {
            return Err(Error::validation("destination_format is invalid"));
        }
        if self.burn_in_logo {
            if let Some(logo) = non_empty(&self.logo_path) {
                check_extension("logo_path", logo, &LOGO_EXTENSIONS)?;
            }
        }
        if let Some(audio) = non_empty(&self.alternate_audio_path) {
            check_extension("alternate_audio_path", audio, &AUDIO_EXTENSIONS)?;
        }
        if self.burn_in_subtitles {
            let subtitles = non_empty(&self.subtitles_path)
                .ok_or_else(|| Error::validation("subtitles_path is required to burn in subtitles"))?;
            check_extension("subtitles_path", subtitles, &SUBTITLE_EXTENSIONS)?;
        }
        if let Some(source_urn) = non_empty(&self.source_urn) {
            if !urn::is_valid(source_urn) {
                return Err(Error::invalid_urn(source_urn));
            }
        }
        if let Some(callback) = non_empty(&self.callback_url) {
            if !callback.starts_with("http://") && !callback.starts_with("https://") {
                return Err(Error::validation("callback_url must start with http:// or https://"));
            }
        }
        Ok(())
    }

    /// Validate and map the order into a waiting job
    pub fn into_job(self, now: DateTime<Utc>) -> Result<Job> {
        self.validate()?;

        let source = self.source_essence();
        let destination = self.destination_essence();
        let name = non_empty(&self.name)
            .map(str::to_string)
            .or_else(|| source.files.first().map(|f| f.value.clone()))
            .unwrap_or_default();

        let mut job = Job::new(name, source, destination, now);
        job.source_urn = non_empty(&self.source_urn).map(str::to_string);
        job.priority = self.priority.unwrap_or_default();
        job.due_date = self.due_date.unwrap_or(now);
        job.callback_url = non_empty(&self.callback_url).map(str::to_string);
        Ok(job)
    }

    fn source_essence(&self) -> Essence {
        let path = Path::new(&self.file_path);
        let mut attachments = Vec::new();

        if self.burn_in_logo {
            if let Some(logo) = non_empty(&self.logo_path) {
                attachments.push(Attachment::new(AttachmentKind::Logo, logo));
            }
        }
        if self.burn_in_subtitles {
            if let Some(subtitles) = non_empty(&self.subtitles_path) {
                attachments.push(Attachment::new(AttachmentKind::Subtitle, subtitles));
            }
        }
        if let Some(audio) = non_empty(&self.alternate_audio_path) {
            attachments.push(Attachment::new(AttachmentKind::Audio, audio));
        }
        for (kind, file, duration) in [
            (AttachmentKind::Intro, &self.intro_file_path, self.intro_duration_ms),
            (AttachmentKind::Outro, &self.outro_file_path, self.outro_duration_ms),
        ] {
            if let Some(file) = non_empty(file) {
                let mut attachment = Attachment::new(kind, file);
                attachment
                    .arguments
                    .insert("duration".to_string(), duration.unwrap_or(0).to_string());
                attachments.push(attachment);
            }
        }

        Essence {
            path: path
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            files: path
                .file_name()
                .map(|f| vec![EssenceFile::filename(f.to_string_lossy())])
                .unwrap_or_default(),
            format: self.source_format,
            custom_format: non_empty(&self.custom_format).map(str::to_string),
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            duration_ms: self.duration_ms,
            attachments,
            ..Default::default()
        }
    }

    fn destination_essence(&self) -> Essence {
        let mut flags = EssenceFlags::empty();
        flags.set(EssenceFlags::LOGO, self.burn_in_logo);
        flags.set(EssenceFlags::HARD_SUBTITLES, self.burn_in_subtitles);
        flags.set(
            EssenceFlags::ALTERNATE_AUDIO,
            non_empty(&self.alternate_audio_path).is_some(),
        );
        flags.set(EssenceFlags::INTRO, non_empty(&self.intro_file_path).is_some());
        flags.set(EssenceFlags::OUTRO, non_empty(&self.outro_file_path).is_some());

        let files = non_empty(&self.destination_filename)
            .map(|name| {
                if name.contains('%') {
                    EssenceFile::template(name)
                } else {
                    EssenceFile::template(format!("{}_%index%.%ext%", name))
                }
            })
            .into_iter()
            .collect();

        Essence {
            path: self.destination_path.clone(),
            files,
            format: self.destination_format,
            flags,
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            duration_ms: self.intro_duration_ms.unwrap_or(0)
                + self.duration_ms
                + self.outro_duration_ms.unwrap_or(0),
            ..Default::default()
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn check_extension(field: &str, path: &str, allowed: &[&str]) -> Result<()> {
    let extension = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match extension {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(Error::validation(format!(
            "{} is not a supported file type. Must be one of {}",
            field,
            allowed.join("/")
        ))),
    }
}
