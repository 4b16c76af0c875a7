use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::category::Categories;

const RC_ENV_VAR: &str = "TASKFLOWRC";
const RC_FILE_NAME: &str = ".taskflowrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      "default.category".to_string(),
      "1".to_string()
    );
    map.insert(
      "sample.tasks".to_string(),
      "on".to_string()
    );
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading taskflowrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no taskflowrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Whether rendering and notifications use ANSI colors.
  pub fn color(
    &self
  ) -> anyhow::Result<bool> {
    let raw = self
      .get("color")
      .unwrap_or_else(|| {
        "on".to_string()
      });
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => {
        Ok(true)
      }
      | "off" | "no" | "false" | "0" => {
        Ok(false)
      }
      | other => Err(anyhow!(
        "invalid color setting: \
         {other}"
      ))
    }
  }

  pub fn default_category(
    &self
  ) -> Option<String> {
    self
      .get("default.category")
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
  }

  pub fn sample_tasks(&self) -> bool {
    self
      .get_bool("sample.tasks")
      .unwrap_or(true)
  }

  /// Category list named by `categories.file`, or the built-in one.
  #[tracing::instrument(skip(self))]
  pub fn load_categories(
    &self
  ) -> anyhow::Result<Categories> {
    match self.get("categories.file") {
      | Some(raw)
        if !raw.trim().is_empty() =>
      {
        let path =
          expand_tilde(Path::new(
            raw.trim()
          ));
        Categories::load(&path)
      }
      | _ => Ok(Categories::default())
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      return Err(anyhow!(
        "include cycle through {}",
        path.display()
      ));
    }
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       taskflowrc lookup"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::Config;

  #[test]
  fn defaults_without_rc_file() {
    let cfg = Config::default();
    assert!(cfg.color().expect("color"));
    assert_eq!(
      cfg.default_category().as_deref(),
      Some("1")
    );
    assert!(cfg.sample_tasks());
  }

  #[test]
  fn loads_rc_with_comments_and_includes()
  {
    let dir = tempdir().expect("tempdir");
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "default.category = 3\n"
    )
    .expect("write include");

    let rc = dir.path().join("main.rc");
    fs::write(
      &rc,
      "# taskflow settings\ncolor = \
       off  # no ansi\ninclude \
       extra.rc\nsample.tasks=no\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load rc");
    assert!(!cfg.color().expect("color"));
    assert_eq!(
      cfg.default_category().as_deref(),
      Some("3")
    );
    assert!(!cfg.sample_tasks());
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn rejects_lines_without_equals() {
    let dir = tempdir().expect("tempdir");
    let rc = dir.path().join("bad.rc");
    fs::write(&rc, "color on\n")
      .expect("write rc");
    assert!(
      Config::load(Some(&rc)).is_err()
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "rc.color".to_string(),
      "bogus".to_string()
    )]);
    assert!(cfg.color().is_err());
  }

  #[test]
  fn categories_file_is_loaded() {
    let dir = tempdir().expect("tempdir");
    let path =
      dir.path().join("categories.toml");
    fs::write(
      &path,
      "[[category]]\nid = \"x\"\nname = \
       \"Errands\"\ncolor = \"#000000\"\n"
    )
    .expect("write categories");

    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "categories.file".to_string(),
      path.display().to_string()
    )]);
    let cats = cfg
      .load_categories()
      .expect("load categories");
    assert_eq!(
      cats.name_for("x"),
      "Errands"
    );
  }
}
