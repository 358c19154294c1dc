use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::StudentSource;
use crate::error::BatchError;
use crate::models::{BatchOutput, FilteredRecord};
use crate::pipeline::{DetailStage, Pddikti, PipelineObserver};
use crate::rules::{DetailRule, SummaryRule};
use crate::schema;

pub const DEFAULT_QUERIES: [&str; 2] = ["Joko Kehutanan UGM", "Bahlil UI"];

/// Broad enough to cover bachelor, master and doctoral programs.
pub const DEFAULT_DEGREE_LEVELS: [&str; 9] = [
    "S1", "S-1", "Sarjana", "S2", "S-2", "Magister", "S3", "S-3", "Doktor",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub queries: Vec<String>,
    #[serde(default)]
    pub search_filters: Vec<SummaryRule>,
    #[serde(default)]
    pub detail_filters: Vec<DetailRule>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            queries: DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect(),
            search_filters: Vec::new(),
            detail_filters: vec![DetailRule::degree_levels(DEFAULT_DEGREE_LEVELS)],
        }
    }
}

impl BatchConfig {
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let raw = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| BatchError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if config.queries.is_empty() {
            return Err(BatchError::Configuration(format!(
                "{} lists no queries",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Builder chain for one query with this config's rules applied.
    pub fn pipeline(&self, query: &str) -> DetailStage {
        let search = self
            .search_filters
            .iter()
            .cloned()
            .fold(Pddikti::search(query), |stage, rule| {
                stage.filter_with(rule.into_predicate())
            });

        self.detail_filters
            .iter()
            .cloned()
            .fold(search.get_details(), |stage, rule| {
                stage.filter_with(rule.into_predicate())
            })
    }
}

/// Run every query in order, one to completion before the next.
pub async fn scrape<S, O>(config: &BatchConfig, source: &S, observer: &O) -> Vec<FilteredRecord>
where
    S: StudentSource + ?Sized,
    O: PipelineObserver + ?Sized,
{
    info!("starting PDDIKTI scrape over {} queries", config.queries.len());

    let mut all_results = Vec::new();
    for query in &config.queries {
        let results = config.pipeline(query).run_with(source, observer).await;
        all_results.extend(results);
    }

    info!("scraping complete, total matches: {}", all_results.len());
    all_results
}

pub fn save_json(output: &BatchOutput, path: &Path) -> Result<(), BatchError> {
    let body = serde_json::to_string_pretty(output).map_err(|source| BatchError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, body).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_output(path: &Path) -> Result<BatchOutput, BatchError> {
    let raw = std::fs::read_to_string(path).map_err(|source| BatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| BatchError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Serialize)]
struct CsvRow<'a> {
    query: &'a str,
    id: &'a str,
    nama: &'a str,
    nim: &'a str,
    nama_pt: &'a str,
    sinkatan_pt: &'a str,
    nama_prodi: &'a str,
    kode_pt: &'a str,
    kode_prodi: &'a str,
    jenis_daftar: &'a str,
    jenis_kelamin: &'a str,
    jenjang: &'a str,
    status_saat_ini: &'a str,
    tanggal_masuk: String,
}

impl<'a> From<&'a FilteredRecord> for CsvRow<'a> {
    fn from(record: &'a FilteredRecord) -> Self {
        let summary = &record.search_result;
        let detail = &record.detail_result;
        Self {
            query: &record.query,
            id: &summary.id,
            nama: &detail.nama,
            nim: &detail.nim,
            nama_pt: &detail.nama_pt,
            sinkatan_pt: &summary.sinkatan_pt,
            nama_prodi: &summary.nama_prodi,
            kode_pt: &detail.kode_pt,
            kode_prodi: &detail.kode_prodi,
            jenis_daftar: &detail.jenis_daftar,
            jenis_kelamin: detail.jenis_kelamin.code(),
            jenjang: &detail.jenjang,
            status_saat_ini: &detail.status_saat_ini,
            tanggal_masuk: schema::format_date(detail.tanggal_masuk),
        }
    }
}

/// Write one flat row per record. Returns the number of rows written.
pub fn export_csv(results: &[FilteredRecord], path: &Path) -> Result<usize, BatchError> {
    let csv_error = |source: csv::Error| BatchError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for record in results {
        writer.serialize(CsvRow::from(record)).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|source| csv_error(csv::Error::from(source)))?;

    Ok(results.len())
}
