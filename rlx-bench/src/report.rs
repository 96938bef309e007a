use anyhow::{Context, Result};
use rlx_api::utils::evaluator::EvalStats;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only result log: one `mean\tstd\tduration` line per finished
/// experiment. The file is truncated once when the bench starts, so a
/// partial sweep keeps the lines of the runs that completed.
pub struct EvalLog {
    path: PathBuf,
}

impl EvalLog {
    pub fn create<P: AsRef<Path>>(out_prefix: P) -> Result<Self> {
        let out_prefix = out_prefix.as_ref();
        let mut file_name = out_prefix
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push("_eval.txt");
        let path = out_prefix.with_file_name(file_name);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        File::create(&path).with_context(|| format!("truncating {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, stats: &EvalStats, duration_secs: f64) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(
            file,
            "{}\t{}\t{}",
            stats.mean_reward, stats.std_reward, duration_secs
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::EvalLog;
    use rlx_api::utils::evaluator::EvalStats;

    #[test]
    fn log_lines_are_tab_separated_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("nested/run/rlx");
        let log = EvalLog::create(&prefix).unwrap();
        assert!(log.path().ends_with("nested/run/rlx_eval.txt"));
        log.append(
            &EvalStats {
                mean_reward: 100.5,
                std_reward: 12.25,
            },
            3.5,
        )
        .unwrap();
        log.append(
            &EvalStats {
                mean_reward: -20.,
                std_reward: 0.,
            },
            1.,
        )
        .unwrap();
        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].parse::<f32>().unwrap(), 100.5);
        assert_eq!(fields[1].parse::<f32>().unwrap(), 12.25);
        assert_eq!(fields[2].parse::<f64>().unwrap(), 3.5);
        assert!(lines[1].starts_with("-20"));
    }

    #[test]
    fn create_truncates_a_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("rlx");
        let log = EvalLog::create(&prefix).unwrap();
        log.append(
            &EvalStats {
                mean_reward: 1.,
                std_reward: 0.,
            },
            1.,
        )
        .unwrap();
        let log = EvalLog::create(&prefix).unwrap();
        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.is_empty());
    }
}
