//! Writing matched-object tables to FITS and CSV.
//!
//! Both artifacts of a job are staged under temporary names and renamed
//! into place only after both are fully flushed, so a directory watcher
//! never sees a half-written file or a CSV without its FITS twin.
//!
//! File naming: `{SURVEY}_{catalog}_matches.fits` / `.csv` under the
//! writer's output directory. Both files carry the same rows with the
//! canonical columns (`RA`, `Dec`, `catalog`, `object_id`) ahead of the
//! columns preserved from the source catalog.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use serde::Serialize;

use crate::catalogs::{CatalogKey, NormalizedTable};
use crate::fits::{self, Card, TableColumn};
use crate::footprints::SurveyKey;
use crate::skymatch_errors::SkymatchError;

/// Final locations of one job's output pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub fits: Utf8PathBuf,
    pub csv: Utf8PathBuf,
}

/// Writes job results under a fixed output directory.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: Utf8PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> ResultWriter {
        ResultWriter {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Write the FITS and CSV artifacts for one job.
    ///
    /// Arguments
    /// ---------
    /// * `survey`: survey of the job, upper-cased into the file name
    /// * `catalog`: catalog of the job, lower-cased into the file name
    /// * `table`: the matched rows
    ///
    /// Return
    /// ------
    /// * The paths both files were renamed to, or the first error; on
    ///   error nothing remains under the final names.
    pub fn write(
        &self,
        survey: SurveyKey,
        catalog: CatalogKey,
        table: &NormalizedTable,
    ) -> Result<OutputPaths, SkymatchError> {
        fs::create_dir_all(&self.output_dir)?;
        let base = format!("{}_{}_matches", survey.file_tag(), catalog.as_str());
        let fits_path = self.output_dir.join(format!("{base}.fits"));
        let csv_path = self.output_dir.join(format!("{base}.csv"));
        let fits_tmp = self.output_dir.join(format!("{base}.fits.tmp"));
        let csv_tmp = self.output_dir.join(format!("{base}.csv.tmp"));

        if let Err(err) = self.stage(&fits_tmp, &csv_tmp, survey, catalog, table) {
            let _ = fs::remove_file(&fits_tmp);
            let _ = fs::remove_file(&csv_tmp);
            return Err(err);
        }
        if let Err(err) = fs::rename(&fits_tmp, &fits_path) {
            let _ = fs::remove_file(&fits_tmp);
            let _ = fs::remove_file(&csv_tmp);
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&csv_tmp, &csv_path) {
            let _ = fs::remove_file(&fits_path);
            let _ = fs::remove_file(&csv_tmp);
            return Err(err.into());
        }

        info!("saved FITS: {fits_path}");
        info!("saved CSV:  {csv_path}");
        Ok(OutputPaths {
            fits: fits_path,
            csv: csv_path,
        })
    }

    fn stage(
        &self,
        fits_tmp: &Utf8Path,
        csv_tmp: &Utf8Path,
        survey: SurveyKey,
        catalog: CatalogKey,
        table: &NormalizedTable,
    ) -> Result<(), SkymatchError> {
        let columns = table_columns(catalog, table);
        let provenance = [
            Card::string("SURVEY", survey.file_tag()),
            Card::string("CATALOG", catalog.as_str()),
        ];
        fits::write_table_file(fits_tmp, &columns, &provenance)?;
        write_csv(csv_tmp, catalog, table)?;
        Ok(())
    }
}

/// Columnar layout shared by both formats: RA, Dec, catalog, object_id,
/// then the preserved source columns.
fn table_columns(catalog: CatalogKey, table: &NormalizedTable) -> Vec<TableColumn> {
    let n = table.rows.len();
    let mut columns = Vec::with_capacity(4 + table.extra_columns.len());
    columns.push(TableColumn::float(
        "RA",
        table.rows.iter().map(|r| r.pos.ra()).collect(),
    ));
    columns.push(TableColumn::float(
        "Dec",
        table.rows.iter().map(|r| r.pos.dec()).collect(),
    ));
    columns.push(TableColumn::text(
        "catalog",
        vec![catalog.tag().to_string(); n],
    ));
    columns.push(TableColumn::text(
        "object_id",
        table.rows.iter().map(|r| r.object_id.clone()).collect(),
    ));
    for (i, name) in table.extra_columns.iter().enumerate() {
        columns.push(TableColumn::text(
            name,
            table.rows.iter().map(|r| r.extras[i].clone()).collect(),
        ));
    }
    columns
}

fn write_csv(
    path: &Utf8Path,
    catalog: CatalogKey,
    table: &NormalizedTable,
) -> Result<(), SkymatchError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![
        "RA".to_string(),
        "Dec".to_string(),
        "catalog".to_string(),
        "object_id".to_string(),
    ];
    header.extend(table.extra_columns.iter().cloned());
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record = vec![
            row.pos.ra().to_string(),
            row.pos.dec().to_string(),
            catalog.tag().to_string(),
            row.object_id.clone(),
        ];
        record.extend(row.extras.iter().cloned());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
