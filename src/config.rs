use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::decode::{PageBreakPolicy, StrategyKind};
use crate::error::ImportError;
use crate::resource::{classify_mime, MimeClass};

pub const CONFIG_FILENAME: &str = "word-import.toml";
pub const CONFIG_ENV: &str = "WORD_IMPORT_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub decode: DecodeSection,
    #[serde(default)]
    pub sanitize: SanitizeSection,
    #[serde(default)]
    pub commit: CommitSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DecodeSection {
    /// "structural" or "rendered".
    #[serde(default)]
    pub strategy: Option<String>,

    /// "horizontal_rule", "marker" or "ignore".
    #[serde(default)]
    pub page_breaks: Option<String>,

    #[serde(default)]
    pub include_default_style_map: Option<bool>,

    /// Extra `selector => target` rules, consulted before the defaults.
    #[serde(default)]
    pub style_map: Vec<String>,

    #[serde(default)]
    pub inline_run_styles: Option<bool>,
    #[serde(default)]
    pub page_geometry: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct SanitizeSection {
    #[serde(default)]
    pub fallback_alt: Option<String>,
    #[serde(default)]
    pub unknown_image_mime: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CommitSection {
    #[serde(default)]
    pub settle_delay_ms: Option<u64>,
    #[serde(default)]
    pub recovery_threshold: Option<f64>,
}

impl DecodeSection {
    pub fn strategy_kind(&self) -> Result<Option<StrategyKind>, ImportError> {
        let Some(s) = self.strategy.as_deref() else {
            return Ok(None);
        };
        match s.trim().to_ascii_lowercase().as_str() {
            "structural" => Ok(Some(StrategyKind::Structural)),
            "rendered" => Ok(Some(StrategyKind::Rendered)),
            other => Err(ImportError::Config(format!(
                "decode.strategy: unknown strategy `{other}` (expected structural or rendered)"
            ))),
        }
    }

    pub fn page_break_policy(&self) -> Result<Option<PageBreakPolicy>, ImportError> {
        let Some(s) = self.page_breaks.as_deref() else {
            return Ok(None);
        };
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "horizontal_rule" | "hr" => Ok(Some(PageBreakPolicy::HorizontalRule)),
            "marker" => Ok(Some(PageBreakPolicy::Marker)),
            "ignore" => Ok(Some(PageBreakPolicy::Ignore)),
            other => Err(ImportError::Config(format!(
                "decode.page_breaks: unknown policy `{other}`"
            ))),
        }
    }
}

impl AppConfig {
    /// Checks the values serde cannot. Style rules are checked when the
    /// style map is built.
    pub fn validate(&self) -> Result<(), ImportError> {
        self.decode.strategy_kind()?;
        self.decode.page_break_policy()?;
        if let Some(t) = self.commit.recovery_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(ImportError::Config(format!(
                    "commit.recovery_threshold must be within 0..=1, got {t}"
                )));
            }
        }
        if let Some(mime) = self.sanitize.unknown_image_mime.as_deref() {
            if classify_mime(mime) == MimeClass::Unclassified {
                return Err(ImportError::Config(format!(
                    "sanitize.unknown_image_mime `{mime}` is not a renderable image type"
                )));
            }
        }
        if let Some(alt) = self.sanitize.fallback_alt.as_deref() {
            if alt.trim().is_empty() {
                return Err(ImportError::Config(
                    "sanitize.fallback_alt must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> AppConfig {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse("");
        cfg.validate().unwrap();
        assert!(cfg.decode.strategy.is_none());
        assert!(cfg.decode.style_map.is_empty());
        assert!(cfg.commit.recovery_threshold.is_none());
    }

    #[test]
    fn full_file_parses() {
        let cfg = parse(
            r#"
[decode]
strategy = "Rendered"
page_breaks = "marker"
include_default_style_map = false
style_map = ["p[style-name='Quote'] => blockquote"]
inline_run_styles = false

[sanitize]
fallback_alt = "Picture"
unknown_image_mime = "image/png"

[commit]
settle_delay_ms = 100
recovery_threshold = 0.5
"#,
        );
        cfg.validate().unwrap();
        assert_eq!(cfg.decode.strategy_kind().unwrap(), Some(StrategyKind::Rendered));
        assert_eq!(
            cfg.decode.page_break_policy().unwrap(),
            Some(PageBreakPolicy::Marker)
        );
        assert_eq!(cfg.decode.style_map.len(), 1);
        assert_eq!(cfg.commit.settle_delay_ms, Some(100));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for text in [
            "[decode]\nstrategy = \"ocr\"",
            "[decode]\npage_breaks = \"sometimes\"",
            "[commit]\nrecovery_threshold = 1.5",
            "[sanitize]\nunknown_image_mime = \"application/octet-stream\"",
            "[sanitize]\nfallback_alt = \"  \"",
        ] {
            let err = parse(text).validate().unwrap_err();
            assert!(matches!(err, ImportError::Config(_)), "{text}");
        }
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(toml::from_str::<AppConfig>("[models]\nx = 1").is_err());
    }

    #[test]
    fn finds_config_in_parent_directories() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        let cfg_path = root.path().join(CONFIG_FILENAME);
        std::fs::write(&cfg_path, "[commit]\nsettle_delay_ms = 0\n").unwrap();

        assert_eq!(find_file_upwards(&nested, CONFIG_FILENAME, 4), Some(cfg_path.clone()));
        assert_eq!(find_file_upwards(&nested, CONFIG_FILENAME, 1), None);

        let cfg = load_config(&cfg_path).unwrap();
        assert_eq!(cfg.commit.settle_delay_ms, Some(0));
    }

    #[test]
    fn load_reports_the_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
