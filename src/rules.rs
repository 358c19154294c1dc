//! Predicates expressed as data, so batch runs can be configured from JSON.
//!
//! A rule is `{"field": "<wire name>", "op": "<op>", "value": ...}`:
//!
//! ```json
//! {"field": "nama", "op": "contains", "value": "joko"}
//! {"field": "jenjang", "op": "one_of", "value": ["S1", "Sarjana"]}
//! {"field": "tanggal_masuk", "op": "on_or_after", "value": "2015-01-01"}
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{DetailRecord, SearchSummary};
use crate::pipeline::Predicate;
use crate::schema::{self, json_type};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRule {
    field: String,
    op: String,
    value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextCondition {
    Equals(String),
    NotEquals(String),
    /// Case-insensitive substring match.
    Contains(String),
    OneOf(Vec<String>),
}

impl TextCondition {
    fn from_raw(op: &str, value: Value) -> Result<Self, String> {
        match op {
            "equals" => Ok(Self::Equals(expect_text(op, value)?)),
            "not_equals" => Ok(Self::NotEquals(expect_text(op, value)?)),
            "contains" => Ok(Self::Contains(expect_text(op, value)?)),
            "one_of" => match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| expect_text(op, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::OneOf),
                other => Err(format!("`one_of` expects a list, received {}", json_type(&other))),
            },
            "before" | "on_or_after" => Err(format!("`{op}` only applies to tanggal_masuk")),
            other => Err(format!("unknown op `{other}`")),
        }
    }

    fn to_raw(&self) -> (&'static str, Value) {
        match self {
            Self::Equals(value) => ("equals", Value::from(value.as_str())),
            Self::NotEquals(value) => ("not_equals", Value::from(value.as_str())),
            Self::Contains(value) => ("contains", Value::from(value.as_str())),
            Self::OneOf(values) => ("one_of", Value::from(values.clone())),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Equals(value) => text == value,
            Self::NotEquals(value) => text != value,
            Self::Contains(value) => text.to_lowercase().contains(&value.to_lowercase()),
            Self::OneOf(values) => values.iter().any(|value| value == text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCondition {
    Equals(NaiveDate),
    NotEquals(NaiveDate),
    Before(NaiveDate),
    OnOrAfter(NaiveDate),
}

impl DateCondition {
    fn from_raw(op: &str, value: Value) -> Result<Self, String> {
        let build: fn(NaiveDate) -> Self = match op {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "before" => Self::Before,
            "on_or_after" => Self::OnOrAfter,
            "contains" | "one_of" => {
                return Err(format!("`{op}` does not apply to tanggal_masuk"))
            }
            other => return Err(format!("unknown op `{other}`")),
        };
        let text = expect_text(op, value)?;
        schema::parse_date(&text)
            .map(build)
            .ok_or_else(|| format!("invalid date `{text}`"))
    }

    fn to_raw(self) -> (&'static str, Value) {
        let (op, date) = match self {
            Self::Equals(date) => ("equals", date),
            Self::NotEquals(date) => ("not_equals", date),
            Self::Before(date) => ("before", date),
            Self::OnOrAfter(date) => ("on_or_after", date),
        };
        (op, Value::from(date.format("%Y-%m-%d").to_string()))
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            Self::Equals(other) => date == other,
            Self::NotEquals(other) => date != other,
            Self::Before(other) => date < other,
            Self::OnOrAfter(other) => date >= other,
        }
    }
}

fn expect_text(op: &str, value: Value) -> Result<String, String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(format!("`{op}` expects text, received {}", json_type(&other))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Id,
    Nama,
    Nim,
    NamaPt,
    SinkatanPt,
    NamaProdi,
}

impl SummaryField {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "id" => Self::Id,
            "nama" => Self::Nama,
            "nim" => Self::Nim,
            "nama_pt" => Self::NamaPt,
            "sinkatan_pt" => Self::SinkatanPt,
            "nama_prodi" => Self::NamaProdi,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Nama => "nama",
            Self::Nim => "nim",
            Self::NamaPt => "nama_pt",
            Self::SinkatanPt => "sinkatan_pt",
            Self::NamaProdi => "nama_prodi",
        }
    }

    fn value(self, summary: &SearchSummary) -> &str {
        match self {
            Self::Id => &summary.id,
            Self::Nama => &summary.nama,
            Self::Nim => &summary.nim,
            Self::NamaPt => &summary.nama_pt,
            Self::SinkatanPt => &summary.sinkatan_pt,
            Self::NamaProdi => &summary.nama_prodi,
        }
    }
}

/// Text-valued detail fields. `jenis_kelamin` compares by its `L`/`P` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    Id,
    NamaPt,
    KodePt,
    KodeProdi,
    Prodi,
    Nama,
    Nim,
    JenisDaftar,
    IdPt,
    IdSms,
    JenisKelamin,
    Jenjang,
    StatusSaatIni,
}

impl DetailField {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "id" => Self::Id,
            "nama_pt" => Self::NamaPt,
            "kode_pt" => Self::KodePt,
            "kode_prodi" => Self::KodeProdi,
            "prodi" => Self::Prodi,
            "nama" => Self::Nama,
            "nim" => Self::Nim,
            "jenis_daftar" => Self::JenisDaftar,
            "id_pt" => Self::IdPt,
            "id_sms" => Self::IdSms,
            "jenis_kelamin" => Self::JenisKelamin,
            "jenjang" => Self::Jenjang,
            "status_saat_ini" => Self::StatusSaatIni,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::NamaPt => "nama_pt",
            Self::KodePt => "kode_pt",
            Self::KodeProdi => "kode_prodi",
            Self::Prodi => "prodi",
            Self::Nama => "nama",
            Self::Nim => "nim",
            Self::JenisDaftar => "jenis_daftar",
            Self::IdPt => "id_pt",
            Self::IdSms => "id_sms",
            Self::JenisKelamin => "jenis_kelamin",
            Self::Jenjang => "jenjang",
            Self::StatusSaatIni => "status_saat_ini",
        }
    }

    fn value(self, detail: &DetailRecord) -> &str {
        match self {
            Self::Id => &detail.id,
            Self::NamaPt => &detail.nama_pt,
            Self::KodePt => &detail.kode_pt,
            Self::KodeProdi => &detail.kode_prodi,
            Self::Prodi => &detail.prodi,
            Self::Nama => &detail.nama,
            Self::Nim => &detail.nim,
            Self::JenisDaftar => &detail.jenis_daftar,
            Self::IdPt => &detail.id_pt,
            Self::IdSms => &detail.id_sms,
            Self::JenisKelamin => detail.jenis_kelamin.code(),
            Self::Jenjang => &detail.jenjang,
            Self::StatusSaatIni => &detail.status_saat_ini,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub struct SummaryRule {
    pub field: SummaryField,
    pub condition: TextCondition,
}

impl SummaryRule {
    pub fn into_predicate(self) -> Predicate<SearchSummary> {
        Arc::new(move |summary: &SearchSummary| self.condition.matches(self.field.value(summary)))
    }
}

impl TryFrom<RawRule> for SummaryRule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let field = SummaryField::parse(&raw.field)
            .ok_or_else(|| format!("unknown search result field `{}`", raw.field))?;
        let condition = TextCondition::from_raw(&raw.op, raw.value)
            .map_err(|err| format!("{}: {err}", raw.field))?;
        Ok(Self { field, condition })
    }
}

impl From<SummaryRule> for RawRule {
    fn from(rule: SummaryRule) -> Self {
        let (op, value) = rule.condition.to_raw();
        RawRule {
            field: rule.field.name().to_string(),
            op: op.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub enum DetailRule {
    Text {
        field: DetailField,
        condition: TextCondition,
    },
    EnrollmentDate(DateCondition),
}

impl DetailRule {
    /// Accept details whose `jenjang` is one of `levels`.
    pub fn degree_levels<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Text {
            field: DetailField::Jenjang,
            condition: TextCondition::OneOf(levels.into_iter().map(Into::into).collect()),
        }
    }

    pub fn matches(&self, detail: &DetailRecord) -> bool {
        match self {
            Self::Text { field, condition } => condition.matches(field.value(detail)),
            Self::EnrollmentDate(condition) => condition.matches(detail.tanggal_masuk),
        }
    }

    pub fn into_predicate(self) -> Predicate<DetailRecord> {
        Arc::new(move |detail: &DetailRecord| self.matches(detail))
    }
}

impl TryFrom<RawRule> for DetailRule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        if raw.field == "tanggal_masuk" {
            return DateCondition::from_raw(&raw.op, raw.value)
                .map(Self::EnrollmentDate)
                .map_err(|err| format!("tanggal_masuk: {err}"));
        }
        let field = DetailField::parse(&raw.field)
            .ok_or_else(|| format!("unknown detail field `{}`", raw.field))?;
        let condition = TextCondition::from_raw(&raw.op, raw.value)
            .map_err(|err| format!("{}: {err}", raw.field))?;
        Ok(Self::Text { field, condition })
    }
}

impl From<DetailRule> for RawRule {
    fn from(rule: DetailRule) -> Self {
        let (field, (op, value)) = match rule {
            DetailRule::Text { field, condition } => (field.name(), condition.to_raw()),
            DetailRule::EnrollmentDate(condition) => ("tanggal_masuk", condition.to_raw()),
        };
        RawRule {
            field: field.to_string(),
            op: op.to_string(),
            value,
        }
    }
}
