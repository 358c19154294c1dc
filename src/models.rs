use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::date_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub id: String,
    pub nama: String,
    pub nim: String,
    pub nama_pt: String,
    pub sinkatan_pt: String,
    pub nama_prodi: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "L")]
    Male,
    #[serde(rename = "P")]
    Female,
}

impl Gender {
    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "L",
            Gender::Female => "P",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub id: String,
    pub nama_pt: String,
    pub kode_pt: String,
    pub kode_prodi: String,
    pub prodi: String,
    pub nama: String,
    pub nim: String,
    pub jenis_daftar: String,
    pub id_pt: String,
    pub id_sms: String,
    pub jenis_kelamin: Gender,
    /// Degree level as sent upstream ("S1", "Magister", ...). Not a closed set.
    pub jenjang: String,
    pub status_saat_ini: String,
    #[serde(with = "date_text")]
    pub tanggal_masuk: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredRecord {
    pub query: String,
    #[serde(rename = "searchResult")]
    pub search_result: SearchSummary,
    #[serde(rename = "detailResult")]
    pub detail_result: DetailRecord,
}

/// Document written at the end of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub timestamp: String,
    pub total_count: usize,
    pub queries: Vec<String>,
    pub results: Vec<FilteredRecord>,
}

impl BatchOutput {
    pub fn new(results: Vec<FilteredRecord>, queries: &[String]) -> Self {
        Self::at(Utc::now(), results, queries)
    }

    pub fn at(now: DateTime<Utc>, results: Vec<FilteredRecord>, queries: &[String]) -> Self {
        Self {
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            total_count: results.len(),
            queries: queries.to_vec(),
            results,
        }
    }
}
