use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use console::style;
use hashbrown::HashMap;
use log::info;
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
pub(crate) struct VectorArgs {
    #[arg(
        value_parser,
        num_args = 1..,
        required = true,
        help = "TSV files of label<TAB>value rows. Every label is searched separately, \
                in order of appearance."
    )]
    input:    Vec<String>,
    #[arg(short = 'o', long, required = true, help = "Output TSV file.")]
    output:   PathBuf,
    #[arg(long, default_value_t = false, help = "Input files have a header row.")]
    header:   bool,
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

/// Reads `label<TAB>value` rows of every file, grouped by label in order of
/// first appearance.
fn read_labelled_values(
    paths: &[PathBuf],
    header: bool,
) -> anyhow::Result<Vec<(String, Vec<f64>)>> {
    let mut labels: Vec<String> = Vec::new();
    let mut values: HashMap<String, Vec<f64>> = HashMap::new();
    for path in paths.iter() {
        let mut reader = csv::ReaderBuilder::default()
            .delimiter(b'\t')
            .has_headers(header)
            .from_path(path)
            .with_context(|| format!("Could not open {}", path.display()))?;
        for record in reader.records() {
            let record = record?;
            let (label, cell) = match (record.get(0), record.get(1)) {
                (Some(label), Some(cell)) => (label, cell),
                _ => {
                    anyhow::bail!(
                        "Expected label<TAB>value rows in {}, got {:?}",
                        path.display(),
                        record
                    )
                },
            };
            let value = parse_value(cell)?;
            match values.get_mut(label) {
                Some(entry) => entry.push(value),
                None => {
                    labels.push(label.to_string());
                    values.insert(label.to_string(), vec![value]);
                },
            }
        }
    }
    Ok(labels
        .into_iter()
        .map(|label| {
            let entry = values.remove(&label).unwrap_or_default();
            (label, entry)
        })
        .collect())
}

impl VectorArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let config = self.peas.to_config()?;
        let paths = expand_wildcards(self.input.clone());
        if paths.is_empty() {
            anyhow::bail!("No input files found");
        }

        let inputs = read_labelled_values(&paths, self.header)?;
        info!("Read {} labelled vectors from {} files", inputs.len(), paths.len());

        let finder = PeaFinder::new(config)?;
        let progress_bar = utils.progress_bar(inputs.len())?;
        let signals = inputs.into_iter().map(|(label, values)| {
            progress_bar.set_message(format!("{}", style(&label).blue()));
            progress_bar.inc(1);
            (label, Signal::from(values))
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
    fn values_are_grouped_by_label() {
        let mut first = tempfile::NamedTempFile::new().unwrap();
        writeln!(first, "label\tvalue\nchr1\t1.5\nchr2\tNA\nchr1\t-2").unwrap();
        let mut second = tempfile::NamedTempFile::new().unwrap();
        writeln!(second, "label\tvalue\nchr2\t3\nchr3\t").unwrap();

        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let inputs = read_labelled_values(&paths, true).unwrap();
        let labels = inputs.iter().map(|(label, _)| label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, ["chr1", "chr2", "chr3"]);
        assert_eq!(inputs[0].1, vec![1.5, -2.0]);
        assert!(inputs[1].1[0].is_nan());
        assert_eq!(inputs[1].1[1], 3.0);
        assert!(inputs[2].1[0].is_nan());
    }

    #[test]
    fn unparsable_values_are_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr1\tone").unwrap();
        assert!(read_labelled_values(&[file.path().to_path_buf()], false).is_err());
    }
}
