// src/loader.rs
//
// Result discovery and rollout loading.
//
// Expected structure:
//   <base_dir>/<experiment_dir>/<result file>
//
// Only immediate subdirectories of each base directory are scanned; plain
// files at the base level are skipped. Result files must end with the
// configured suffix and must not contain the exclude marker.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::aggregate::AggregationKey;
use crate::classify::RolloutRecord;
use crate::config::EvalConfig;
use crate::container::{ResultContainer, ResultFormat};
use crate::error::{SleeperError, SleeperResult};
use crate::filename::ResultFileName;

/// A rollout read from disk, with its origin for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRollout {
    pub key: AggregationKey,
    pub record: RolloutRecord,
    pub path: PathBuf,
    pub index: usize,
}

impl LoadedRollout {
    pub fn into_parts(self) -> (AggregationKey, RolloutRecord) {
        (self.key, self.record)
    }

    /// "<path>#rollouts/<i> [<key>]"
    pub fn location(&self) -> String {
        format!("{}#rollouts/{} [{}]", self.path.display(), self.index, self.key)
    }
}

pub struct ResultLoader<'a> {
    cfg: &'a EvalConfig,
    format: &'a dyn ResultFormat,
}

impl<'a> ResultLoader<'a> {
    pub fn new(cfg: &'a EvalConfig, format: &'a dyn ResultFormat) -> Self {
        Self { cfg, format }
    }

    /// Whether a file name passes the suffix and exclude-marker filters.
    pub fn is_result_file(&self, name: &str) -> bool {
        name.ends_with(&self.cfg.result_suffix) && !name.contains(&self.cfg.exclude_marker)
    }

    /// List result files under every base directory, sorted per directory.
    pub fn discover<P: AsRef<Path>>(&self, base_dirs: &[P]) -> SleeperResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for base in base_dirs {
            let base = base.as_ref();
            for sub in sorted_entries(base)? {
                if !sub.is_dir() {
                    trace!(path = %sub.display(), "skipping non-directory entry");
                    continue;
                }
                for path in sorted_entries(&sub)? {
                    let accepted = path.is_file()
                        && path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .map(|n| self.is_result_file(n))
                            .unwrap_or(false);
                    if accepted {
                        files.push(path);
                    }
                }
            }
        }
        debug!(count = files.len(), "discovered result files");
        Ok(files)
    }

    /// Open one result file and prepare to stream its rollouts.
    pub fn open_file(&self, path: &Path) -> SleeperResult<FileRollouts> {
        let name = ResultFileName::parse(path, self.cfg)?;
        let container = self.format.open(path)?;
        let norm = container.norm()?;
        let count = container.rollout_count()?;
        debug!(
            path = %path.display(),
            format = self.format.name(),
            game = %name.game,
            norm = %norm,
            experiment = %name.experiment,
            epsilon = %name.epsilon,
            rollouts = count,
            "opened result file"
        );
        Ok(FileRollouts {
            container,
            name,
            norm,
            next: 0,
            count,
        })
    }

    /// Read every rollout of one file.
    pub fn load_file(&self, path: &Path) -> SleeperResult<Vec<LoadedRollout>> {
        self.open_file(path)?.collect()
    }

    /// Lazily stream rollouts from every result file under `base_dirs`.
    ///
    /// Discovery happens up front; files are opened one at a time.
    pub fn rollouts<P: AsRef<Path>>(&self, base_dirs: &[P]) -> SleeperResult<RolloutIter<'_, 'a>> {
        let files = self.discover(base_dirs)?;
        Ok(RolloutIter {
            loader: self,
            files: files.into_iter(),
            current: None,
            failed: false,
        })
    }
}

/// Stream of rollouts within one opened file.
pub struct FileRollouts {
    container: Box<dyn ResultContainer>,
    name: ResultFileName,
    norm: String,
    next: usize,
    count: usize,
}

impl FileRollouts {
    fn read(&self, index: usize) -> SleeperResult<LoadedRollout> {
        let path = self.container.path();
        let raw = self.container.rollout(index)?;
        let key = AggregationKey::new(
            self.name.game.clone(),
            self.norm.clone(),
            self.name.experiment.clone(),
            raw.head_count,
            self.name.epsilon.clone(),
        );
        let record = RolloutRecord::from_raw(&raw).map_err(|e| {
            e.with_path(path)
                .with_context(format!("rollouts/{} [{}]", index, key))
        })?;
        Ok(LoadedRollout {
            key,
            record,
            path: path.to_path_buf(),
            index,
        })
    }
}

impl Iterator for FileRollouts {
    type Item = SleeperResult<LoadedRollout>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.read(index))
    }
}

/// Lazy stream over all discovered files. Stops after the first error.
pub struct RolloutIter<'l, 'a> {
    loader: &'l ResultLoader<'a>,
    files: std::vec::IntoIter<PathBuf>,
    current: Option<FileRollouts>,
    failed: bool,
}

impl Iterator for RolloutIter<'_, '_> {
    type Item = SleeperResult<LoadedRollout>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(Ok(rollout)) => return Some(Ok(rollout)),
                    Some(Err(e)) => {
                        self.failed = true;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }

            let path = self.files.next()?;
            match self.loader.open_file(&path) {
                Ok(file) => self.current = Some(file),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn sorted_entries(dir: &Path) -> SleeperResult<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| SleeperError::io(dir, e))? {
        let entry = entry.map_err(|e| SleeperError::io(dir, e))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{JsonResultFormat, RawRollout};
    use crate::error::ErrorKind;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_result(dir: &Path, name: &str, value: serde_json::Value) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", serde_json::to_string_pretty(&value).unwrap()).unwrap();
        path
    }

    fn one_rollout(norm: &str, k: u32) -> serde_json::Value {
        serde_json::json!({
            "adv_params": { "norm": norm },
            "rollouts": {
                "0": {
                    "k": k,
                    "action_prob_orig": [[0.9, 0.1], [0.1, 0.9]],
                    "action_prob_adv": [[0.9, 0.1], [0.9, 0.1]]
                }
            }
        })
    }

    #[test]
    fn test_result_file_filter() {
        let cfg = EvalConfig::default();
        let loader = ResultLoader::new(&cfg, &JsonResultFormat);
        assert!(loader.is_result_file("a_b_0-1_exp1_pong.json"));
        assert!(!loader.is_result_file("a_b_0-1_exp1_pong_allvariants.json"));
        assert!(!loader.is_result_file("a_b_0-1_exp1_pong.txt"));
    }

    #[test]
    fn test_discover_skips_base_files_and_filters_names() {
        let temp = tempdir().unwrap();
        let base = temp.path();

        fs::write(base.join("stray_a_0-1_exp1_pong.json"), "{}").unwrap();
        let exp = base.join("run1");
        write_result(&exp, "s_f_0-1_exp1_pong.json", one_rollout("l2", 1));
        write_result(&exp, "s_f_0-1_exp1_allvariants_pong.json", one_rollout("l2", 1));
        fs::write(exp.join("notes.txt"), "hello").unwrap();

        let cfg = EvalConfig::default();
        let loader = ResultLoader::new(&cfg, &JsonResultFormat);
        let files = loader.discover(&[base]).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("run1/s_f_0-1_exp1_pong.json"));
    }

    #[test]
    fn test_discover_missing_base_is_io_error() {
        let temp = tempdir().unwrap();
        let cfg = EvalConfig::default();
        let loader = ResultLoader::new(&cfg, &JsonResultFormat);
        let err = loader.discover(&[temp.path().join("nope")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_load_file_builds_keys() {
        let temp = tempdir().unwrap();
        let path = write_result(
            temp.path(),
            "sleeper_fgsm_0-004_exp037_invaders.json",
            one_rollout("l-inf", 3),
        );

        let cfg = EvalConfig::default();
        let loader = ResultLoader::new(&cfg, &JsonResultFormat);
        let rollouts = loader.load_file(&path).unwrap();

        assert_eq!(rollouts.len(), 1);
        let r = &rollouts[0];
        assert_eq!(r.key.game, "space-invaders");
        assert_eq!(r.key.norm, "l-inf");
        assert_eq!(r.key.experiment, "exp037");
        assert_eq!(r.key.head_count, 3);
        assert_eq!(r.key.epsilon.as_str(), "0.004");
        assert_eq!(r.record.original, vec![0, 1]);
        assert_eq!(r.record.adversarial, vec![0, 0]);
        assert!(r.location().contains("#rollouts/0"));

        let (key, record) = rollouts[0].clone().into_parts();
        assert_eq!(key, r.key);
        assert_eq!(record.classify().unwrap(), crate::classify::Outcome::Success);
    }

    /// Container whose second adversarial row is empty.
    struct EmptyRowContainer {
        path: PathBuf,
    }

    impl ResultContainer for EmptyRowContainer {
        fn path(&self) -> &Path {
            &self.path
        }

        fn norm(&self) -> SleeperResult<String> {
            Ok("l2".to_string())
        }

        fn rollout_count(&self) -> SleeperResult<usize> {
            Ok(1)
        }

        fn rollout(&self, _index: usize) -> SleeperResult<RawRollout> {
            Ok(RawRollout {
                head_count: 2,
                action_prob_orig: vec![vec![0.5, 0.5], vec![0.2, 0.8]],
                action_prob_adv: vec![vec![0.5, 0.5], vec![]],
            })
        }
    }

    struct EmptyRowFormat;

    impl ResultFormat for EmptyRowFormat {
        fn name(&self) -> &'static str {
            "empty-row"
        }

        fn open(&self, path: &Path) -> SleeperResult<Box<dyn ResultContainer>> {
            Ok(Box::new(EmptyRowContainer {
                path: path.to_path_buf(),
            }))
        }
    }

    #[test]
    fn test_empty_probability_row_is_malformed_with_path() {
        let cfg = EvalConfig::default();
        let loader = ResultLoader::new(&cfg, &EmptyRowFormat);
        let path = Path::new("runs/exp/s_f_0-1_exp1_pong.json");

        let err = loader.load_file(path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        let msg = err.to_string();
        assert!(msg.contains("runs/exp/s_f_0-1_exp1_pong.json"));
        assert!(msg.contains("rollouts/0"));
        assert!(msg.contains("action_prob_adv: timestep 1"));
    }

    #[test]
    fn test_bad_filename_is_malformed() {
        let temp = tempdir().unwrap();
        let path = write_result(temp.path(), "short_pong.json", one_rollout("l2", 1));

        let cfg = EvalConfig::default();
        let loader = ResultLoader::new(&cfg, &JsonResultFormat);
        let err = loader.load_file(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_iterator_is_lazy_and_stops_on_error() {
        let temp = tempdir().unwrap();
        let base = temp.path();
        write_result(&base.join("a"), "s_f_0-1_exp1_pong.json", one_rollout("l2", 1));
        write_result(
            &base.join("b"),
            "s_f_0-1_exp1_pong.json",
            serde_json::json!({ "rollouts": {} }),
        );
        write_result(&base.join("c"), "s_f_0-1_exp1_pong.json", one_rollout("l2", 1));

        let cfg = EvalConfig::default();
        let loader = ResultLoader::new(&cfg, &JsonResultFormat);
        let items: Vec<_> = loader.rollouts(&[base]).unwrap().collect();

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(
            items[1].as_ref().unwrap_err().kind(),
            ErrorKind::MalformedInput
        );
    }
}
