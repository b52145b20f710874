//! Essence domain types
//!
//! An essence describes a media state: where the files live, what format
//! they are in and which transformations (logo, subtitles, ...) have been
//! applied. Tasks transform one essence into another.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Concrete or desired media state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Essence {
    pub path: String,
    #[serde(default)]
    pub files: Vec<EssenceFile>,
    #[serde(default)]
    pub format: MediaFormat,
    #[serde(default)]
    pub custom_format: Option<String>,
    #[serde(default)]
    pub flags: EssenceFlags,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub resolution: Resolution,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Essence {
    /// First attachment of the given kind
    pub fn attachment(&self, kind: AttachmentKind) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.kind == kind)
    }
}

/// A file of an essence, either a literal name or a rename template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EssenceFile {
    pub value: String,
    pub kind: FileKind,
}

impl EssenceFile {
    pub fn filename(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: FileKind::Filename,
        }
    }

    pub fn template(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: FileKind::Template,
        }
    }

    pub fn is_template(&self) -> bool {
        self.kind == FileKind::Template
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Filename,
    Template,
}

bitflags! {
    /// Optional transformations applied to an essence
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EssenceFlags: u32 {
        const LOGO = 1;
        const HARD_SUBTITLES = 2;
        const ALTERNATE_AUDIO = 4;
        const INTRO = 8;
        const OUTRO = 16;
    }
}

impl Default for EssenceFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Sidecar file attached to an essence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: String,
    pub kind: AttachmentKind,
    #[serde(default)]
    pub arguments: HashMap<String, String>,
}

impl Attachment {
    pub fn new(kind: AttachmentKind, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            arguments: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Subtitle,
    Audio,
    Logo,
    Intro,
    Outro,
}

/// Media container/codec format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFormat {
    #[default]
    Unknown,
    Xd5c,
    Dvpp,
    Dv5p,
    Dvh5,
    Dv,
    Dvhq,
    Avc1,
    Wma,
    MpegAudio,
    Pcm,
    Custom,
    H264OdSingle,
    H264OdStandard,
    H264OdDropfolder,
    H264OdPodcast,
    AudioOdStandard,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 17] = [
        MediaFormat::Unknown,
        MediaFormat::Xd5c,
        MediaFormat::Dvpp,
        MediaFormat::Dv5p,
        MediaFormat::Dvh5,
        MediaFormat::Dv,
        MediaFormat::Dvhq,
        MediaFormat::Avc1,
        MediaFormat::Wma,
        MediaFormat::MpegAudio,
        MediaFormat::Pcm,
        MediaFormat::Custom,
        MediaFormat::H264OdSingle,
        MediaFormat::H264OdStandard,
        MediaFormat::H264OdDropfolder,
        MediaFormat::H264OdPodcast,
        MediaFormat::AudioOdStandard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Unknown => "unknown",
            MediaFormat::Xd5c => "xd5c",
            MediaFormat::Dvpp => "dvpp",
            MediaFormat::Dv5p => "dv5p",
            MediaFormat::Dvh5 => "dvh5",
            MediaFormat::Dv => "dv",
            MediaFormat::Dvhq => "dvhq",
            MediaFormat::Avc1 => "avc1",
            MediaFormat::Wma => "wma",
            MediaFormat::MpegAudio => "mpeg_audio",
            MediaFormat::Pcm => "pcm",
            MediaFormat::Custom => "custom",
            MediaFormat::H264OdSingle => "h264_od_single",
            MediaFormat::H264OdStandard => "h264_od_standard",
            MediaFormat::H264OdDropfolder => "h264_od_dropfolder",
            MediaFormat::H264OdPodcast => "h264_od_podcast",
            MediaFormat::AudioOdStandard => "audio_od_standard",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaFormat::ALL
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::validation(format!("Unknown media format '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "16x9")]
    Widescreen,
    #[serde(rename = "4x3")]
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[default]
    Unknown,
    Sd,
    Hd,
    FullHd,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_format_names() {
        for format in MediaFormat::ALL {
            let json = serde_json::to_string(&format).unwrap();
            assert_eq!(json, format!("\"{}\"", format.as_str()));
            assert_eq!(format.as_str().parse::<MediaFormat>().unwrap(), format);
        }
        assert!("h265".parse::<MediaFormat>().is_err());
    }

    #[test]
    fn test_flags_combine() {
        let mut flags = EssenceFlags::LOGO;
        flags |= EssenceFlags::HARD_SUBTITLES;
        assert!(flags.contains(EssenceFlags::LOGO | EssenceFlags::HARD_SUBTITLES));
        assert!(!flags.contains(EssenceFlags::ALTERNATE_AUDIO));
        assert_eq!(flags.bits(), 3);
    }

    #[test]
    fn test_essence_copies_are_independent() {
        let original = Essence {
            path: "/media/in".to_string(),
            files: vec![EssenceFile::filename("clip.mxf")],
            ..Default::default()
        };
        let mut copy = original.clone();
        copy.files.push(EssenceFile::filename("other.mxf"));
        assert_eq!(original.files.len(), 1);
    }
}
