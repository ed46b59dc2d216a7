use std::path::Path;

use clap::ValueEnum;
use console::style;
use itertools::Itertools;
use peas::data_structs::PeasResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum PadjMethod {
    Bonf,
    BH,
    BY,
    None,
}

impl PadjMethod {
    /// Adjusts `pvalues` for multiple testing.
    pub fn adjust(
        &self,
        pvalues: &[f64],
    ) -> Vec<f64> {
        let procedure = match self {
            PadjMethod::BH => adjustp::Procedure::BenjaminiHochberg,
            PadjMethod::Bonf => adjustp::Procedure::Bonferroni,
            PadjMethod::BY => adjustp::Procedure::BenjaminiYekutieli,
            PadjMethod::None => return pvalues.to_vec(),
        };
        if pvalues.is_empty() {
            return Vec::new();
        }
        adjustp::adjust(pvalues, procedure)
    }
}

#[derive(Debug, Serialize)]
struct RegionRow<'a> {
    label:  &'a str,
    start:  usize,
    end:    usize,
    size:   usize,
    score:  f64,
    pvalue: f64,
    padj:   f64,
}

/// Writes the regions of every input as TSV, with p-values adjusted across
/// all of them. Returns the number of regions written.
pub(crate) fn write_regions(
    path: &Path,
    results: &[(String, PeasResult)],
    method: PadjMethod,
    max_padj: Option<f64>,
) -> anyhow::Result<usize> {
    let pvalues = results
        .iter()
        .flat_map(|(_, result)| result.regions.iter().map(|r| r.pvalue))
        .collect_vec();
    let padj = method.adjust(&pvalues);

    let mut writer = csv::WriterBuilder::default()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let mut written = 0;
    let rows = results
        .iter()
        .flat_map(|(label, result)| result.regions.iter().map(move |r| (label, r)))
        .zip(padj);
    for ((label, region), padj) in rows {
        if max_padj.is_some_and(|max| padj > max) {
            continue;
        }
        writer.serialize(RegionRow {
            label,
            start: region.start,
            end: region.end,
            size: region.size,
            score: region.score,
            pvalue: region.pvalue,
            padj,
        })?;
        written += 1;
    }
    writer.flush()?;

    println!(
        "{}",
        style(format!(
            "Found {} regions in {} inputs, written to {}",
            written,
            results.len(),
            path.display()
        ))
        .green()
        .bold()
    );
    Ok(written)
}
