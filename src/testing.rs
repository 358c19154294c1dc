use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::client::{FetchFailure, Fetched, StudentSource};
use crate::models::{DetailRecord, Gender, SearchSummary};

#[derive(Default)]
pub struct StubSource {
    searches: HashMap<String, Vec<SearchSummary>>,
    details: HashMap<String, DetailRecord>,
    search_log: Mutex<Vec<String>>,
    detail_log: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, results: Vec<SearchSummary>) -> Self {
        self.searches.insert(query.to_string(), results);
        self
    }

    pub fn with_detail(mut self, detail: DetailRecord) -> Self {
        self.details.insert(detail.id.clone(), detail);
        self
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_log.lock().unwrap().clone()
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl StudentSource for StubSource {
    async fn search(&self, query: &str) -> Fetched<Vec<SearchSummary>> {
        self.search_log.lock().unwrap().push(query.to_string());
        match self.searches.get(query) {
            Some(results) => Fetched::Found(results.clone()),
            None => Fetched::Absent(FetchFailure::Status(404)),
        }
    }

    async fn get_detail(&self, id: &str) -> Fetched<DetailRecord> {
        self.detail_log.lock().unwrap().push(id.to_string());
        match self.details.get(id) {
            Some(detail) => Fetched::Found(detail.clone()),
            None => Fetched::Absent(FetchFailure::Status(404)),
        }
    }
}

pub fn summary(id: &str, nama: &str) -> SearchSummary {
    SearchSummary {
        id: id.to_string(),
        nama: nama.to_string(),
        nim: format!("nim-{id}"),
        nama_pt: "Universitas Gadjah Mada".to_string(),
        sinkatan_pt: "UGM".to_string(),
        nama_prodi: "Kehutanan".to_string(),
    }
}

pub fn detail(id: &str, nama: &str, gender: Gender, jenjang: &str) -> DetailRecord {
    DetailRecord {
        id: id.to_string(),
        nama_pt: "Universitas Gadjah Mada".to_string(),
        kode_pt: "001001".to_string(),
        kode_prodi: "54201".to_string(),
        prodi: "Kehutanan".to_string(),
        nama: nama.to_string(),
        nim: format!("nim-{id}"),
        jenis_daftar: "Peserta didik baru".to_string(),
        id_pt: "pt-1".to_string(),
        id_sms: "sms-1".to_string(),
        jenis_kelamin: gender,
        jenjang: jenjang.to_string(),
        status_saat_ini: "Lulus".to_string(),
        tanggal_masuk: NaiveDate::from_ymd_opt(1980, 9, 1).unwrap(),
    }
}
