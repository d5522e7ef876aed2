//! File-based video and slider registries
//!
//! Both registries are plain text files with one entry per line. Every change
//! rewrites the whole file through a `<file>.tmp` sibling that is renamed over
//! the original, so a concurrent reader sees either the old or the new list.
//! A missing file is an empty registry.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One registered video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub id: String,
    pub name: String,
}

/// Videos offered to participants, stored as `id:name` lines
#[derive(Debug, Clone)]
pub struct VideoRegistry {
    path: PathBuf,
    entries: Vec<VideoEntry>,
}

impl VideoRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let mut entries = Vec::new();
        for (line_no, line) in read_lines(path)?.iter().enumerate() {
            match line.split_once(':') {
                Some((id, name)) if !id.trim().is_empty() => entries.push(VideoEntry {
                    id: id.trim().to_string(),
                    name: name.trim().to_string(),
                }),
                _ => warn!(
                    "Skipping malformed video entry on line {} of {}",
                    line_no + 1,
                    path.display()
                ),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[VideoEntry] {
        &self.entries
    }

    /// Video shown when a participant has not picked one
    pub fn first(&self) -> Option<&VideoEntry> {
        self.entries.first()
    }

    pub fn get(&self, id: &str) -> Option<&VideoEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Register a video by numeric id or by a URL ending in one
    pub fn add(&mut self, id_or_url: &str, name: &str) -> Result<VideoEntry> {
        let id = parse_video_id(id_or_url)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("video name is required".to_string()));
        }
        if name.contains('\n') {
            return Err(Error::InvalidInput(
                "video name must be a single line".to_string(),
            ));
        }
        if self.get(&id).is_some() {
            return Err(Error::InvalidInput(format!(
                "video {} is already registered",
                id
            )));
        }

        let entry = VideoEntry {
            id,
            name: name.to_string(),
        };
        let mut entries = self.entries.clone();
        entries.push(entry.clone());
        self.persist(entries)?;
        info!("Registered video {} ({})", entry.id, entry.name);
        Ok(entry)
    }

    /// Remove a video; returns whether anything was removed
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let entries: Vec<VideoEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        if entries.len() == self.entries.len() {
            return Ok(false);
        }
        self.persist(entries)?;
        info!("Removed video {}", id);
        Ok(true)
    }

    fn persist(&mut self, entries: Vec<VideoEntry>) -> Result<()> {
        let lines: Vec<String> = entries
            .iter()
            .map(|entry| format!("{}:{}", entry.id, entry.name))
            .collect();
        write_lines_atomic(&self.path, &lines)?;
        self.entries = entries;
        Ok(())
    }
}

/// Extract the numeric video id from a bare id or a video URL
pub fn parse_video_id(id_or_url: &str) -> Result<String> {
    let trimmed = id_or_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("video id is required".to_string()));
    }

    let candidate = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let candidate = candidate.split(['?', '#']).next().unwrap_or(candidate);
    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
        Ok(candidate.to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "'{}' is neither a video id nor a video URL",
            id_or_url.trim()
        )))
    }
}

/// Shape of a rating control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SliderKind {
    OneDimensional {
        min: f64,
        max: f64,
        default: f64,
        name: String,
    },
    TwoDimensional {
        min: f64,
        min2: f64,
        max: f64,
        max2: f64,
        default: f64,
        default2: f64,
        name: String,
        name2: String,
    },
}

/// One slider shown on the participant page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderDefinition {
    #[serde(flatten)]
    pub kind: SliderKind,
}

impl SliderDefinition {
    pub fn one_dimensional(min: f64, max: f64, default: f64, name: &str) -> Result<Self> {
        let slider = Self {
            kind: SliderKind::OneDimensional {
                min,
                max,
                default,
                name: name.trim().to_string(),
            },
        };
        slider.validate()?;
        Ok(slider)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn two_dimensional(
        min: f64,
        min2: f64,
        max: f64,
        max2: f64,
        default: f64,
        default2: f64,
        name: &str,
        name2: &str,
    ) -> Result<Self> {
        let slider = Self {
            kind: SliderKind::TwoDimensional {
                min,
                min2,
                max,
                max2,
                default,
                default2,
                name: name.trim().to_string(),
                name2: name2.trim().to_string(),
            },
        };
        slider.validate()?;
        Ok(slider)
    }

    /// Measured variables this slider produces
    pub fn variable_names(&self) -> Vec<&str> {
        match &self.kind {
            SliderKind::OneDimensional { name, .. } => vec![name.as_str()],
            SliderKind::TwoDimensional { name, name2, .. } => vec![name.as_str(), name2.as_str()],
        }
    }

    /// Name used to address the slider in the registry
    pub fn name(&self) -> &str {
        match &self.kind {
            SliderKind::OneDimensional { name, .. } => name,
            SliderKind::TwoDimensional { name, .. } => name,
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.kind {
            SliderKind::OneDimensional {
                min,
                max,
                default,
                name,
            } => {
                check_name(name)?;
                check_range(name, *min, *max, *default)
            }
            SliderKind::TwoDimensional {
                min,
                min2,
                max,
                max2,
                default,
                default2,
                name,
                name2,
            } => {
                check_name(name)?;
                check_name(name2)?;
                if name == name2 {
                    return Err(Error::InvalidInput(format!(
                        "both axes of 2D slider are named '{}'",
                        name
                    )));
                }
                check_range(name, *min, *max, *default)?;
                check_range(name2, *min2, *max2, *default2)
            }
        }
    }

    /// Parse one registry line
    pub fn parse_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(':').map(str::trim).collect();
        match fields.first().copied() {
            Some("slider") if fields.len() == 5 => Self::one_dimensional(
                parse_number(fields[1])?,
                parse_number(fields[2])?,
                parse_number(fields[3])?,
                fields[4],
            ),
            Some("2dslider") if fields.len() == 9 => Self::two_dimensional(
                parse_number(fields[1])?,
                parse_number(fields[2])?,
                parse_number(fields[3])?,
                parse_number(fields[4])?,
                parse_number(fields[5])?,
                parse_number(fields[6])?,
                fields[7],
                fields[8],
            ),
            _ => Err(Error::InvalidInput(format!(
                "unrecognized slider line '{}'",
                line.trim()
            ))),
        }
    }

    /// Registry line for this slider
    pub fn to_line(&self) -> String {
        match &self.kind {
            SliderKind::OneDimensional {
                min,
                max,
                default,
                name,
            } => format!("slider:{}:{}:{}:{}", min, max, default, name),
            SliderKind::TwoDimensional {
                min,
                min2,
                max,
                max2,
                default,
                default2,
                name,
                name2,
            } => format!(
                "2dslider:{}:{}:{}:{}:{}:{}:{}:{}",
                min, min2, max, max2, default, default2, name, name2
            ),
        }
    }
}

fn parse_number(field: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::InvalidInput(format!("'{}' is not a number", field)))
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("slider name is required".to_string()));
    }
    if name.contains(':') || name.contains('\n') {
        return Err(Error::InvalidInput(format!(
            "slider name '{}' may not contain ':' or line breaks",
            name
        )));
    }
    if crate::events::is_identifier_key(name) {
        return Err(Error::InvalidInput(format!(
            "'{}' is reserved and cannot name a slider",
            name
        )));
    }
    Ok(())
}

fn check_range(name: &str, min: f64, max: f64, default: f64) -> Result<()> {
    if min >= max {
        return Err(Error::InvalidInput(format!(
            "slider '{}': min {} must be below max {}",
            name, min, max
        )));
    }
    if default < min || default > max {
        return Err(Error::InvalidInput(format!(
            "slider '{}': default {} outside [{}, {}]",
            name, default, min, max
        )));
    }
    Ok(())
}

/// Sliders shown on the participant page
#[derive(Debug, Clone)]
pub struct SliderRegistry {
    path: PathBuf,
    sliders: Vec<SliderDefinition>,
}

impl SliderRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let mut sliders = Vec::new();
        for (line_no, line) in read_lines(path)?.iter().enumerate() {
            match SliderDefinition::parse_line(line) {
                Ok(slider) => sliders.push(slider),
                Err(e) => warn!(
                    "Skipping slider on line {} of {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                ),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            sliders,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[SliderDefinition] {
        &self.sliders
    }

    /// Every variable name across all sliders, in slider order
    pub fn variable_names(&self) -> Vec<&str> {
        self.sliders
            .iter()
            .flat_map(|slider| slider.variable_names())
            .collect()
    }

    pub fn add(&mut self, slider: SliderDefinition) -> Result<()> {
        slider.validate()?;
        let existing = self.variable_names();
        if let Some(clash) = slider
            .variable_names()
            .into_iter()
            .find(|name| existing.contains(name))
        {
            return Err(Error::InvalidInput(format!(
                "a slider named '{}' already exists",
                clash
            )));
        }

        let mut sliders = self.sliders.clone();
        sliders.push(slider);
        self.persist(sliders)?;
        info!("Added slider; {} configured", self.sliders.len());
        Ok(())
    }

    /// Remove the slider with the given name; returns whether anything was removed
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let sliders: Vec<SliderDefinition> = self
            .sliders
            .iter()
            .filter(|slider| slider.name() != name)
            .cloned()
            .collect();
        if sliders.len() == self.sliders.len() {
            return Ok(false);
        }
        self.persist(sliders)?;
        info!("Removed slider {}", name);
        Ok(true)
    }

    fn persist(&mut self, sliders: Vec<SliderDefinition>) -> Result<()> {
        let lines: Vec<String> = sliders.iter().map(SliderDefinition::to_line).collect();
        write_lines_atomic(&self.path, &lines)?;
        self.sliders = sliders;
        Ok(())
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_lines_atomic(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
