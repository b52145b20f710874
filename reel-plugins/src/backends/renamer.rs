//! File renamer backend
//!
//! Renames the files produced by a transcode step according to a template
//! such as `show_%index%.%ext%`. Runs synchronously within a single pulse.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use reel_core::domain::{EssenceFile, ExecutionState, ExecutionTask};

use crate::backend::Backend;

const SUPPORTED_TOKENS: [&str; 2] = ["index", "ext"];

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(\w+)%").unwrap());
static EXTENSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.(\w+)$").unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct FileRenamer;

impl FileRenamer {
    pub const PLUGIN_TYPE: &'static str = "filerenamer";

    /// Template of the destination, if it is a single supported template
    fn template(task: &ExecutionTask) -> Option<&str> {
        let [file] = task.to.files.as_slice() else {
            return None;
        };
        if !file.is_template() {
            return None;
        }
        let mut tokens = TOKEN.captures_iter(&file.value).peekable();
        tokens.peek()?;
        tokens
            .all(|caps| SUPPORTED_TOKENS.contains(&&caps[1]))
            .then_some(file.value.as_str())
    }
}

/// Expand `%index%` and `%ext%` for one source file
fn render(template: &str, index: usize, source: &str) -> String {
    let extension = EXTENSION
        .captures(source)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default();
    template
        .replace("%index%", &index.to_string())
        .replace("%ext%", &extension)
}

#[async_trait]
impl Backend for FileRenamer {
    fn plugin_type(&self) -> &str {
        Self::PLUGIN_TYPE
    }

    fn estimate(&self, task: &ExecutionTask) -> Option<TimeDelta> {
        Self::template(task).map(|_| TimeDelta::seconds(5))
    }

    async fn work(&self, task: &mut ExecutionTask, _now: DateTime<Utc>) -> anyhow::Result<()> {
        let template = Self::template(task)
            .context("Destination is not a supported filename template")?
            .to_string();
        let source_dir = Path::new(&task.from.path).to_path_buf();
        let target_dir = Path::new(&task.to.path).to_path_buf();

        let mut renamed = Vec::with_capacity(task.from.files.len());
        for (i, file) in task.from.files.iter().enumerate() {
            let source = source_dir.join(&file.value);
            let name = render(&template, i + 1, &file.value);
            let target = target_dir.join(&name);

            if !tokio::fs::try_exists(&source).await.unwrap_or(false) {
                bail!("Source file {} does not exist", source.display());
            }
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                bail!("Destination file {} already exists", target.display());
            }
            tokio::fs::rename(&source, &target)
                .await
                .with_context(|| format!("Failed to rename {} to {}", source.display(), target.display()))?;
            renamed.push(EssenceFile::filename(name));
        }

        task.to.files = renamed;
        task.state = ExecutionState::Done;
        Ok(())
    }

    fn async_operation(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::domain::Essence;
    use rstest::rstest;

    fn task(from_dir: &str, files: &[&str], template: EssenceFile, to_dir: &str) -> ExecutionTask {
        let from = Essence {
            path: from_dir.to_string(),
            files: files.iter().map(|f| EssenceFile::filename(*f)).collect(),
            ..Default::default()
        };
        let to = Essence {
            path: to_dir.to_string(),
            files: vec![template],
            ..Default::default()
        };
        ExecutionTask::new("urn:reel:plugin:filerenamer:1", from, to)
    }

    #[rstest]
    #[case(EssenceFile::template("show_%index%.%ext%"), true)]
    #[case(EssenceFile::template("%index%"), true)]
    #[case(EssenceFile::template("show.mp4"), false)]
    #[case(EssenceFile::template("show_%date%.%ext%"), false)]
    #[case(EssenceFile::filename("show_%index%.%ext%"), false)]
    fn test_estimate_checks_template(#[case] template: EssenceFile, #[case] accepted: bool) {
        let task = task("/out", &["a.mp4"], template, "/out");
        let estimate = FileRenamer.estimate(&task);
        assert_eq!(estimate.is_some(), accepted);
        if accepted {
            assert_eq!(estimate, Some(TimeDelta::seconds(5)));
        }
    }

    #[test]
    fn test_estimate_requires_single_destination_file() {
        let mut task = task("/out", &["a.mp4"], EssenceFile::template("%index%"), "/out");
        task.to.files.push(EssenceFile::template("%index%.%ext%"));
        assert!(FileRenamer.estimate(&task).is_none());
        task.to.files.clear();
        assert!(FileRenamer.estimate(&task).is_none());
    }

    #[test]
    fn test_render() {
        assert_eq!(render("show_%index%.%ext%", 2, "clip_1.mp4"), "show_2.mp4");
        assert_eq!(render("show_%index%", 1, "noext"), "show_1");
    }

    #[tokio::test]
    async fn test_work_renames_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["clip_1.mp4", "clip_2.mp4"] {
            std::fs::write(dir.path().join(name), b"media").unwrap();
        }
        let path = dir.path().to_string_lossy().into_owned();
        let mut task = task(
            &path,
            &["clip_1.mp4", "clip_2.mp4"],
            EssenceFile::template("show_%index%.%ext%"),
            &path,
        );

        FileRenamer.work(&mut task, Utc::now()).await.unwrap();

        assert_eq!(task.state, ExecutionState::Done);
        assert_eq!(
            task.to.files,
            vec![EssenceFile::filename("show_1.mp4"), EssenceFile::filename("show_2.mp4")]
        );
        assert!(dir.path().join("show_1.mp4").exists());
        assert!(dir.path().join("show_2.mp4").exists());
        assert!(!dir.path().join("clip_1.mp4").exists());
    }

    #[tokio::test]
    async fn test_work_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"media").unwrap();
        std::fs::write(dir.path().join("show_1.mp4"), b"existing").unwrap();
        let path = dir.path().to_string_lossy().into_owned();
        let mut task = task(&path, &["clip.mp4"], EssenceFile::template("show_%index%.%ext%"), &path);

        assert!(FileRenamer.work(&mut task, Utc::now()).await.is_err());
        assert!(dir.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_work_fails_on_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().into_owned();
        let mut task = task(&path, &["missing.mp4"], EssenceFile::template("%index%.%ext%"), &path);
        assert!(FileRenamer.work(&mut task, Utc::now()).await.is_err());
    }
}
