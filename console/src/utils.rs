use std::path::PathBuf;

use clap::{
    ArgAction,
    Args,
};
use glob::glob;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use log::LevelFilter;

#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        long,
        default_value_t = false,
        help_heading = "UTILS",
        help = "Display a progress bar."
    )]
    pub progress: bool,
    #[arg(
        short = 'T',
        long,
        default_value_t = 0,
        help_heading = "UTILS",
        help = "Number of threads to use. 0 uses all available cores."
    )]
    pub threads:  usize,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help_heading = "UTILS",
        help = "Increase logging verbosity (-v info, -vv debug, -vvv trace)."
    )]
    pub verbose:  u8,
}

impl UtilsArgs {
    pub fn setup(&self) -> anyhow::Result<()> {
        if self.threads > 0 {
            std::env::set_var("PEAS_NUM_THREADS", self.threads.to_string());
        }
        let level = match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        pretty_env_logger::formatted_builder()
            .filter_level(level)
            .parse_default_env()
            .try_init()?;
        Ok(())
    }

    pub fn progress_bar(
        &self,
        total: usize,
    ) -> anyhow::Result<ProgressBar> {
        if self.progress {
            init_pbar(total)
        }
        else {
            Ok(ProgressBar::hidden())
        }
    }
}

pub fn init_pbar(total: usize) -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(total as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}, ETA: {eta}] [{bar:40.cyan/blue}] {pos:>5.green}/{len:5} {msg}")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message("Processing...");
    Ok(progress_bar)
}

pub(crate) fn expand_wildcards(paths: Vec<String>) -> Vec<PathBuf> {
    let mut expanded_paths = Vec::new();

    for path in paths {
        if path.contains('*') || path.contains('?') {
            match glob(&path) {
                Ok(matches) => {
                    for entry in matches.filter_map(Result::ok) {
                        expanded_paths.push(entry);
                    }
                },
                Err(e) => eprintln!("Error processing wildcard '{}': {}", path, e),
            }
        }
        else {
            expanded_paths.push(PathBuf::from(path));
        }
    }

    expanded_paths
}

/// Parses a TSV cell, treating empty cells and `NA`/`NaN` as missing.
pub(crate) fn parse_value(cell: &str) -> anyhow::Result<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return Ok(f64::NAN);
    }
    trimmed
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("Could not parse '{}' as a number: {}", trimmed, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cells_parse_as_nan() {
        for cell in ["", " ", "NA", "nan", "NaN"] {
            assert!(parse_value(cell).unwrap().is_nan(), "{:?}", cell);
        }
        assert_eq!(parse_value(" -1.5e2 ").unwrap(), -150.0);
        assert!(parse_value("x").is_err());
    }

    #[test]
    fn wildcards_expand_to_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.tsv", "b.tsv", "c.txt"] {
            std::fs::write(dir.path().join(name), "1\n").unwrap();
        }
        let pattern = dir.path().join("*.tsv").to_string_lossy().to_string();
        let plain = dir.path().join("c.txt").to_string_lossy().to_string();

        let mut paths = expand_wildcards(vec![pattern, plain]);
        paths.sort();
        let names = paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a.tsv", "b.tsv", "c.txt"]);
    }
}
