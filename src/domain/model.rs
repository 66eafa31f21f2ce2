use crate::utils::error::{Result, SumoError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_DURATION_SECS: u32 = 1800;
pub const DEFAULT_PERIOD_SECS: f64 = 1.0;

/// 使用者輸入的地名，以及由它推導出的檔名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceName {
    raw: String,
    slug: String,
}

impl PlaceName {
    pub fn new(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SumoError::InvalidArguments {
                tool: "download_osm_map".to_string(),
                message: "place name cannot be empty".to_string(),
            });
        }

        let slug = normalize(raw);
        if slug.is_empty() {
            return Err(SumoError::InvalidArguments {
                tool: "download_osm_map".to_string(),
                message: format!("'{}' does not yield a usable file name", raw),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            slug,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for PlaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Lowercase, ASCII-fold, spaces to `_`, and drop anything outside `[a-z0-9_.]`.
pub fn normalize(text: &str) -> String {
    deunicode::deunicode(text)
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            'a'..='z' | '0'..='9' | '_' | '.' => Some(c),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Extract,
    Network,
    Trips,
    Routes,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Extract => ".osm",
            Self::Network => ".net.xml",
            Self::Trips => ".trips.xml",
            Self::Routes => ".rou.xml",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Extract => "OSM extract (.osm)",
            Self::Network => "SUMO network (.net.xml)",
            Self::Trips => "SUMO trips (.trips.xml)",
            Self::Routes => "SUMO routes (.rou.xml)",
        }
    }

    /// Recognizes a kind from the file name. Compound suffixes win over `.xml`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        [Self::Network, Self::Trips, Self::Routes, Self::Extract]
            .into_iter()
            .find(|kind| name.ends_with(kind.extension()))
            .or_else(|| name.ends_with(".osm.xml").then_some(Self::Extract))
    }
}

/// 流程中某個階段產出的檔案
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Builds an artifact from a bare path, requiring the file name to match `expected`.
    pub fn expecting(expected: ArtifactKind, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        match ArtifactKind::from_path(&path) {
            Some(kind) if kind == expected => Ok(Self::new(kind, path)),
            _ => Err(SumoError::WrongArtifact {
                expected: expected.describe().to_string(),
                path,
            }),
        }
    }

    pub fn ensure_kind(&self, expected: ArtifactKind) -> Result<()> {
        if self.kind != expected {
            return Err(SumoError::WrongArtifact {
                expected: expected.describe().to_string(),
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// File name without this artifact's extension, in the same directory.
    pub fn base_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self.kind.extension();
        let split = name.len().saturating_sub(ext.len());
        let stem = if name.len() > ext.len()
            && name.is_char_boundary(split)
            && name[split..].eq_ignore_ascii_case(ext)
        {
            name[..split].to_string()
        } else {
            Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(name)
        };
        self.path.with_file_name(stem)
    }

    /// Substitutes this artifact's extension with the one of `kind`.
    pub fn derive(&self, kind: ArtifactKind) -> Artifact {
        let mut path = self.base_path().into_os_string();
        path.push(kind.extension());
        Artifact::new(kind, path)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// randomTrips.py 的參數
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandParams {
    pub duration_secs: u32,
    pub period_secs: f64,
}

impl Default for DemandParams {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            period_secs: DEFAULT_PERIOD_SECS,
        }
    }
}

impl DemandParams {
    pub fn new(duration_secs: Option<u32>, period_secs: Option<f64>) -> Self {
        let defaults = Self::default();
        Self {
            duration_secs: duration_secs.unwrap_or(defaults.duration_secs),
            period_secs: period_secs.unwrap_or(defaults.period_secs),
        }
    }

    pub fn validate(&self) -> Result<()> {
        crate::utils::validation::validate_positive_number(
            "duration",
            u64::from(self.duration_secs),
            1,
        )?;
        crate::utils::validation::validate_positive_real("period", self.period_secs)
    }

    pub fn duration_arg(&self) -> String {
        self.duration_secs.to_string()
    }

    /// Whole periods keep one decimal (`1.0`), matching how randomTrips echoes them.
    pub fn period_arg(&self) -> String {
        if self.period_secs.fract() == 0.0 {
            format!("{:.1}", self.period_secs)
        } else {
            self.period_secs.to_string()
        }
    }
}

/// 需求生成的結果摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSummary {
    pub network: Artifact,
    pub routes: Artifact,
    pub trips: Artifact,
    pub params: DemandParams,
}

impl fmt::Display for DemandSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SUMO demand generated:")?;
        writeln!(f, "- Network: {}", self.network)?;
        writeln!(f, "- Routes: {}", self.routes)?;
        writeln!(f, "- Duration: {}s", self.params.duration_arg())?;
        write!(f, "- Period: {}s", self.params.period_arg())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Convert,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Convert => "convert",
            Self::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// 單次流程的狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Start,
    Fetched,
    Converted,
    DemandGenerated,
    Failed { at: Stage },
}

impl RunState {
    /// The stage that runs next from this state, if any.
    pub fn next_stage(self) -> Option<Stage> {
        match self {
            Self::Start => Some(Stage::Fetch),
            Self::Fetched => Some(Stage::Convert),
            Self::Converted => Some(Stage::Generate),
            Self::DemandGenerated | Self::Failed { .. } => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next_stage().is_none()
    }
}
