use std::path::{
    Path,
    PathBuf,
};

use anyhow::Context;
use clap::Args;
use console::style;
use itertools::Itertools;
use log::info;
use ndarray::Array2;
use peas::data_structs::Signal;
use peas::PeaFinder;

use crate::args::PeasArgs;
use crate::report::{
    write_regions,
    PadjMethod,
};
use crate::utils::{
    expand_wildcards,
    parse_value,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct MatrixArgs {
    #[arg(
        value_parser,
        num_args = 1..,
        required = true,
        help = "Square symmetric TSV matrices. Each file is searched separately and \
                labelled by its file name."
    )]
    input:    Vec<String>,
    #[arg(short = 'o', long, required = true, help = "Output TSV file.")]
    output:   PathBuf,
    #[clap(flatten)]
    peas:     PeasArgs,
    #[clap(
        long = "pmethod",
        value_enum,
        default_value_t = PadjMethod::None,
        help_heading = "FILTER ARGS",
        help = "Multiple testing correction across all reported regions."
    )]
    pmethod:  PadjMethod,
    #[arg(
        long,
        help_heading = "FILTER ARGS",
        help = "Drop regions with an adjusted p-value above this threshold."
    )]
    max_padj: Option<f64>,
}

fn read_matrix(path: &Path) -> anyhow::Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::default()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    let rows = reader
        .records()
        .map(|record| {
            record?
                .iter()
                .map(parse_value)
                .collect::<anyhow::Result<Vec<_>>>()
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let n = rows.len();
    if let Some(row) = rows.iter().find(|row| row.len() != n) {
        anyhow::bail!(
            "{} is not square: {} rows, found a row of {} values",
            path.display(),
            n,
            row.len()
        );
    }
    Ok(Array2::from_shape_vec(
        (n, n),
        rows.into_iter().flatten().collect_vec(),
    )?)
}

impl MatrixArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let config = self.peas.to_config()?;
        let paths = expand_wildcards(self.input.clone());
        if paths.is_empty() {
            anyhow::bail!("No input files found");
        }

        let finder = PeaFinder::new(config)?;
        let progress_bar = utils.progress_bar(paths.len())?;
        let signals = paths
            .iter()
            .map(|path| {
                let label = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                let matrix = read_matrix(path)?;
                info!("Read {}x{} matrix {}", matrix.nrows(), matrix.ncols(), label);
                Ok((label, Signal::from(matrix)))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let signals = signals.into_iter().map(|(label, signal)| {
            progress_bar.set_message(format!("{}", style(&label).blue()));
            progress_bar.inc(1);
            (label, signal)
        });
        let results = finder.find_in_batch(signals)?;
        progress_bar.finish();

        write_regions(&self.output, &results, self.pmethod, self.max_padj)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn square_matrix_with_missing_cells() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\t0.5\tNaN\n0.5\t1\t0.2\nNaN\t0.2\t1").unwrap();
        let matrix = read_matrix(file.path()).unwrap();
        assert_eq!(matrix.dim(), (3, 3));
        assert_eq!(matrix[[0, 1]], 0.5);
        assert_eq!(matrix[[2, 1]], 0.2);
        assert!(matrix[[0, 2]].is_nan());
    }

    #[test]
    fn rectangular_matrix_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\t2\t3\n4\t5\t6").unwrap();
        let err = read_matrix(file.path()).unwrap_err();
        assert!(err.to_string().contains("not square"), "{}", err);
    }
}
