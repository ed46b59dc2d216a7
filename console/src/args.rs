use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use peas::data_structs::{
    AggregateKind,
    Bins,
    DistributionKind,
    ObjectiveKind,
    ShuffleCount,
    Tail,
};
use peas::PeasConfig;

/// Search parameters shared by every subcommand.
///
/// Options left out keep the value of the `--config` file, or the library
/// default without one.
#[derive(Args, Debug, Clone)]
pub(crate) struct PeasArgs {
    #[arg(
        long,
        help = "JSON file with search parameters. Options given on the command line \
                take precedence."
    )]
    config: Option<PathBuf>,

    #[arg(long, help_heading = "REGION ARGS", help = "Minimum region size.")]
    min_size: Option<usize>,
    #[arg(
        long,
        help_heading = "REGION ARGS",
        help = "Maximum region size. Defaults to a quarter of the input, and is never \
                larger than half of it."
    )]
    max_size: Option<usize>,
    #[arg(
        long,
        help_heading = "REGION ARGS",
        help = "Minimum absolute aggregate of a region."
    )]
    min_score: Option<f64>,
    #[arg(
        short = 'p',
        long,
        help_heading = "REGION ARGS",
        help = "Maximum p-value of a region."
    )]
    max_pvalue: Option<f64>,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "REGION ARGS",
        help = "Do not filter regions by p-value."
    )]
    no_pvalue_filter: bool,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "REGION ARGS",
        help = "Resolve ties towards the smaller region."
    )]
    prefer_smaller: bool,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "REGION ARGS",
        help = "Do not merge touching regions of the same sign."
    )]
    no_stitch: bool,

    #[arg(
        short = 'a',
        long,
        value_enum,
        help_heading = "SCORING ARGS",
        help = "Aggregate statistic of a region."
    )]
    aggregate: Option<AggregateKind>,
    #[arg(
        short = 't',
        long,
        value_enum,
        help_heading = "SCORING ARGS",
        help = "Tail of the null distribution that counts as significant."
    )]
    tail: Option<Tail>,
    #[arg(
        long,
        value_enum,
        help_heading = "SCORING ARGS",
        help = "Objective maximized by the region selection."
    )]
    target: Option<ObjectiveKind>,
    #[arg(
        long,
        help_heading = "SCORING ARGS",
        help = "Power the edge weights are raised to, keeping their sign."
    )]
    edge_weight_power: Option<f64>,
    #[arg(
        long,
        help_heading = "SCORING ARGS",
        help = "Number of histogram bins, or 'auto'."
    )]
    bins: Option<Bins>,
    #[arg(
        long,
        help_heading = "SCORING ARGS",
        help = "Smallest reported p-value."
    )]
    min_pvalue: Option<f64>,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "SCORING ARGS",
        help = "Quantile normalize the input to a standard Gaussian."
    )]
    quantile_normalize: bool,

    #[arg(
        short = 'n',
        long,
        help_heading = "MATRIX ARGS",
        help = "Number of matrix permutations, or 'auto'."
    )]
    shuffles: Option<ShuffleCount>,
    #[arg(
        long,
        help_heading = "MATRIX ARGS",
        help = "Smallest p-value the automatic number of permutations should estimate \
                precisely."
    )]
    pvalue_target: Option<f64>,
    #[arg(
        long,
        help_heading = "MATRIX ARGS",
        help = "Largest tolerated coefficient of variation of a permutation p-value."
    )]
    max_pvalue_cv: Option<f64>,
    #[arg(long, help_heading = "MATRIX ARGS", help = "Random seed of the permutations.")]
    seed: Option<u64>,
    #[arg(
        long,
        help_heading = "MATRIX ARGS",
        help = "Window of the tail parameter smoothing across region sizes. 0 disables."
    )]
    smoothing_window: Option<usize>,
    #[arg(
        long,
        help_heading = "MATRIX ARGS",
        help = "First diagonal included in the aggregates."
    )]
    start_diagonal: Option<usize>,
    #[arg(
        long,
        value_enum,
        help_heading = "MATRIX ARGS",
        help = "Null distribution fitted to the permutations."
    )]
    null: Option<DistributionKind>,
    #[arg(
        long,
        default_value_t = false,
        help_heading = "MATRIX ARGS",
        help = "Keep missing matrix cells instead of filling them with their diagonal mean."
    )]
    no_fill: bool,
}

impl PeasArgs {
    pub fn to_config(&self) -> anyhow::Result<PeasConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("Could not open config {}", path.display()))?;
                PeasConfig::from_json_reader(file)?
            },
            None => PeasConfig::default(),
        };

        if let Some(value) = self.min_size {
            config.min_size = value;
        }
        if let Some(value) = self.min_score {
            config.min_score = value;
        }
        if let Some(value) = self.aggregate {
            config.aggregate_function = value;
        }
        if let Some(value) = self.tail {
            config.tail = value;
        }
        if let Some(value) = self.target {
            config.maximization_target = value;
        }
        if let Some(value) = self.edge_weight_power {
            config.edge_weight_power = value;
        }
        if let Some(value) = self.bins {
            config.bins = value;
        }
        if let Some(value) = self.min_pvalue {
            config.min_pvalue = value;
        }
        if let Some(value) = self.shuffles {
            config.num_shuffles = value;
        }
        if let Some(value) = self.pvalue_target {
            config.pvalue_target = value;
        }
        if let Some(value) = self.max_pvalue_cv {
            config.max_pvalue_cv = value;
        }
        if let Some(value) = self.smoothing_window {
            config.parameter_smoothing_window = value;
        }
        if let Some(value) = self.start_diagonal {
            config.start_diagonal = value;
        }
        if let Some(value) = self.null {
            config.null_distribution = value;
        }

        if self.max_size.is_some() {
            config.max_size = self.max_size;
        }
        if self.seed.is_some() {
            config.random_seed = self.seed;
        }
        if self.max_pvalue.is_some() {
            config.max_pvalue = self.max_pvalue;
        }
        if self.no_pvalue_filter {
            config.max_pvalue = None;
        }
        if self.prefer_smaller {
            config.prefer_larger_regions = false;
        }
        if self.no_stitch {
            config.stitch_adjacent = false;
        }
        if self.quantile_normalize {
            config.quantile_normalize = true;
        }
        if self.no_fill {
            config.fill_nan_diagonals = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[clap(flatten)]
        peas: PeasArgs,
    }

    fn parse(args: &[&str]) -> anyhow::Result<PeasConfig> {
        let cli = TestCli::try_parse_from(std::iter::once("peas").chain(args.iter().copied()))?;
        cli.peas.to_config()
    }

    #[test]
    fn no_options_give_defaults() {
        assert_eq!(parse(&[]).unwrap(), PeasConfig::default());
    }

    #[test]
    fn options_override_defaults() {
        let config = parse(&[
            "--min-size", "4", "-t", "right", "-a", "max", "--target", "p_prod",
            "-n", "300", "--bins", "auto", "--no-stitch", "--no-pvalue-filter", "--seed", "9",
        ])
        .unwrap();
        assert_eq!(config.min_size, 4);
        assert_eq!(config.tail, Tail::Right);
        assert_eq!(config.aggregate_function, AggregateKind::Max);
        assert_eq!(config.maximization_target, ObjectiveKind::PProd);
        assert_eq!(config.num_shuffles, ShuffleCount::Fixed(300));
        assert_eq!(config.bins, Bins::Auto);
        assert!(!config.stitch_adjacent);
        assert_eq!(config.max_pvalue, None);
        assert_eq!(config.random_seed, Some(9));
    }

    #[test]
    fn options_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_size": 5, "tail": "left", "random_seed": 3}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = parse(&["--config", &path, "--tail", "both"]).unwrap();
        assert_eq!(config.min_size, 5);
        assert_eq!(config.tail, Tail::Both);
        assert_eq!(config.random_seed, Some(3));
    }

    #[test]
    fn invalid_combinations_are_rejected() {
        assert!(parse(&["--min-size", "3", "--max-size", "2"]).is_err());
        assert!(parse(&["-n", "0"]).is_err());
        assert!(parse(&["--tail", "upper"]).is_err());
    }
}
