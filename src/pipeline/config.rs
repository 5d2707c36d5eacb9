use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use crate::commit::CommitOptions;
use crate::config::{find_default_config, load_config, AppConfig, CONFIG_ENV, CONFIG_FILENAME};
use crate::decode::{DataUriImageHandler, DecodeOptions, StrategyKind, StyleMap};
use crate::error::{ImportError, Result};
use crate::resource::{classify_mime, MimeClass};
use crate::sanitize::SanitizeOptions;

/// Everything one import needs, resolved from the file and the flags.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,
    pub strategy: StrategyKind,
    pub decode: DecodeOptions,
    pub sanitize: SanitizeOptions,
    pub commit: CommitOptions,
}

impl PipelineConfig {
    /// Config file lookup: explicit path, then `WORD_IMPORT_CONFIG`, then an
    /// upward search from the working directory, the input's directory and
    /// the executable's directory. A missing explicit file is an error, a
    /// missing discovered one is not.
    pub fn resolve(
        input: Option<&Path>,
        config_path: Option<PathBuf>,
        strategy: Option<StrategyKind>,
    ) -> Result<Self> {
        let explicit = config_path
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
        let cfg_file = match explicit {
            Some(p) => {
                if !p.exists() {
                    return Err(ImportError::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                Some(p)
            }
            None => {
                let workdir = input
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                find_default_config(&workdir, CONFIG_FILENAME)
            }
        };

        let file_cfg = match cfg_file.as_ref() {
            Some(p) => load_config(p).map_err(|e| ImportError::Config(format!("{e:#}")))?,
            None => AppConfig::default(),
        };
        debug!(config = ?cfg_file, "resolved configuration file");

        let mut resolved = Self::from_app_config(&file_cfg)?;
        resolved.config_path = cfg_file;
        if let Some(s) = strategy {
            resolved.strategy = s;
        }
        Ok(resolved)
    }

    pub fn from_app_config(cfg: &AppConfig) -> Result<Self> {
        cfg.validate()?;
        let defaults_decode = DecodeOptions::default();
        let defaults_sanitize = SanitizeOptions::default();
        let defaults_commit = CommitOptions::default();

        let style_map = StyleMap::with_defaults(
            &cfg.decode.style_map,
            cfg.decode.include_default_style_map.unwrap_or(true),
        )
        .map_err(|e| ImportError::Config(format!("decode.style_map: {e}")))?;

        // Aliases such as image/jpg are stored canonically, otherwise a second
        // normalize pass would rewrite them.
        let unknown_image_mime = match cfg.sanitize.unknown_image_mime.as_deref() {
            Some(mime) => match classify_mime(mime) {
                MimeClass::Concrete(canonical) => canonical.to_string(),
                MimeClass::Unclassified => {
                    return Err(ImportError::Config(format!(
                        "sanitize.unknown_image_mime `{mime}` is not a renderable image type"
                    )))
                }
            },
            None => defaults_sanitize.unknown_image_mime,
        };
        let sanitize = SanitizeOptions {
            fallback_alt: cfg
                .sanitize
                .fallback_alt
                .as_deref()
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults_sanitize.fallback_alt),
            unknown_image_mime,
        };

        let decode = DecodeOptions {
            image_handler: Arc::new(DataUriImageHandler {
                fallback_alt: sanitize.fallback_alt.clone(),
            }),
            style_map,
            page_breaks: cfg
                .decode
                .page_break_policy()?
                .unwrap_or(defaults_decode.page_breaks),
            inline_run_styles: cfg
                .decode
                .inline_run_styles
                .unwrap_or(defaults_decode.inline_run_styles),
            page_geometry: cfg
                .decode
                .page_geometry
                .unwrap_or(defaults_decode.page_geometry),
        };

        let commit = CommitOptions {
            settle_delay: cfg
                .commit
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults_commit.settle_delay),
            recovery_threshold: cfg
                .commit
                .recovery_threshold
                .unwrap_or(defaults_commit.recovery_threshold),
            ..defaults_commit
        };

        Ok(Self {
            config_path: None,
            strategy: cfg.decode.strategy_kind()?.unwrap_or_default(),
            decode,
            sanitize,
            commit,
        })
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[decode]
# "structural" keeps document semantics (headings, lists, tables).
# "rendered" keeps visual layout (page size, fonts, colours).
strategy = "structural"

# What a hard page break becomes: "horizontal_rule", "marker" or "ignore".
page_breaks = "horizontal_rule"

# Extra rules are consulted before the built-in map.
# Grammar: selector => target
#   selector: p | r | table, optionally [style-name='Name']
#   target:   tag(.class)*  (":fresh" accepted), or "!" to drop the content
include_default_style_map = true
style_map = [
  # "p[style-name='Quote'] => blockquote",
  # "r[style-name='Code'] => code",
]

# Rendered strategy only.
inline_run_styles = true
page_geometry = true

[sanitize]
fallback_alt = "Imported image from Word document"
# Assigned to images whose bytes match no known signature.
unknown_image_mime = "image/jpeg"

[commit]
settle_delay_ms = 500
# Images are re-inserted one by one when fewer than this share arrived.
recovery_threshold = 0.3
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::PageBreakPolicy;

    #[test]
    fn default_file_round_trips_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_default_config(dir.path(), false).unwrap();
        let resolved = PipelineConfig::resolve(None, Some(path.clone()), None).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(resolved.config_path, Some(path));
        assert_eq!(resolved.strategy, defaults.strategy);
        assert_eq!(resolved.commit, defaults.commit);
        assert_eq!(resolved.sanitize, defaults.sanitize);
        assert_eq!(resolved.decode.page_breaks, PageBreakPolicy::HorizontalRule);
        assert_eq!(
            resolved.decode.style_map.rules().len(),
            StyleMap::defaults().rules().len()
        );
    }

    #[test]
    fn init_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[commit]\nsettle_delay_ms = 7\n").unwrap();

        init_default_config(dir.path(), false).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("= 7"));
        init_default_config(dir.path(), true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("= 500"));
    }

    #[test]
    fn flag_overrides_file_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[decode]\nstrategy = \"rendered\"\nstyle_map = [\"p[style-name='Quote'] => blockquote\"]\n\n[commit]\nrecovery_threshold = 0.5\nsettle_delay_ms = 10\n",
        )
        .unwrap();

        let from_file = PipelineConfig::resolve(None, Some(path.clone()), None).unwrap();
        assert_eq!(from_file.strategy, StrategyKind::Rendered);
        assert_eq!(from_file.commit.recovery_threshold, 0.5);
        assert_eq!(from_file.commit.settle_delay, Duration::from_millis(10));
        assert_eq!(
            from_file.decode.style_map.rules().len(),
            StyleMap::defaults().rules().len() + 1
        );

        let overridden =
            PipelineConfig::resolve(None, Some(path), Some(StrategyKind::Structural)).unwrap();
        assert_eq!(overridden.strategy, StrategyKind::Structural);
    }

    #[test]
    fn sanitize_section_reaches_decoder_and_normalizer() {
        let app: AppConfig = toml::from_str(
            "[sanitize]\nfallback_alt = \" Figure \"\nunknown_image_mime = \"Image/JPG\"\n",
        )
        .unwrap();
        let resolved = PipelineConfig::from_app_config(&app).unwrap();
        assert_eq!(resolved.sanitize.fallback_alt, "Figure");
        assert_eq!(resolved.sanitize.unknown_image_mime, "image/jpeg");
    }

    #[test]
    fn bad_files_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            PipelineConfig::resolve(None, Some(missing), None),
            Err(ImportError::Config(_))
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[decode]\nstyle_map = [\"p => \"]\n").unwrap();
        assert!(matches!(
            PipelineConfig::resolve(None, Some(broken), None),
            Err(ImportError::Config(_))
        ));

        let not_toml = dir.path().join("not.toml");
        std::fs::write(&not_toml, "[decode\n").unwrap();
        assert!(matches!(
            PipelineConfig::resolve(None, Some(not_toml), None),
            Err(ImportError::Config(_))
        ));
    }
}
