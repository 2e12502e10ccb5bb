use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::columns::*;
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "M" | "m" => Some(Gender::Male),
            "F" | "f" => Some(Gender::Female),
            _ => None,
        }
    }

    /// Label used by the chart legends.
    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Hommes",
            Gender::Female => "Femmes",
        }
    }
}

/// Dates in the register are written `dd/mm/yyyy`.
pub fn parse_register_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

/// One elected official, typed view over a row of the merged table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficialRecord {
    pub territory_code: Option<String>,
    pub department_name: Option<String>,
    pub collectivity_name: Option<String>,
    pub town_code: Option<String>,
    pub town_name: Option<String>,
    pub sector: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    /// Raw `code_sexe`, kept even when it is neither `M` nor `F`.
    pub gender_code: Option<String>,
    pub gender: Option<Gender>,
    pub birthdate: Option<NaiveDate>,
    pub birthplace: Option<String>,
    pub sociopro_code: Option<String>,
    pub sociopro_label: Option<String>,
    pub mandate_start: Option<NaiveDate>,
    pub function_label: Option<String>,
    pub function_start: Option<NaiveDate>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl OfficialRecord {
    /// Typed records for every row. Columns the table lacks read as null.
    pub fn from_table(table: &Table) -> Vec<OfficialRecord> {
        (0..table.len())
            .map(|row| {
                let text = |column: &str| table.get(row, column).map(str::to_string);
                let date = |column: &str| table.get(row, column).and_then(parse_register_date);
                OfficialRecord {
                    territory_code: text(TERRITORY_CODE),
                    department_name: text(DEPARTMENT_NAME),
                    collectivity_name: text(COLLECTIVITY_NAME),
                    town_code: text(TOWN_CODE),
                    town_name: text(TOWN_NAME),
                    sector: text(SECTOR),
                    last_name: text(LAST_NAME),
                    first_name: text(FIRST_NAME),
                    gender_code: text(GENDER_CODE),
                    gender: table.get(row, GENDER_CODE).and_then(Gender::from_code),
                    birthdate: date(BIRTHDATE),
                    birthplace: text(BIRTHPLACE),
                    sociopro_code: text(SOCIOPRO_CODE),
                    sociopro_label: text(SOCIOPRO_LABEL),
                    mandate_start: date(MANDATE_START),
                    function_label: text(FUNCTION_LABEL),
                    function_start: date(FUNCTION_START),
                    latitude: table.float(row, LATITUDE),
                    longitude: table.float(row, LONGITUDE),
                }
            })
            .collect()
    }

    /// Department name, else collectivity name.
    pub fn territory_label(&self) -> Option<&str> {
        self.department_name
            .as_deref()
            .or(self.collectivity_name.as_deref())
    }

    /// Legend label of the gender, or the raw code when it is not `M`/`F`.
    pub fn gender_label(&self) -> Option<&str> {
        match self.gender {
            Some(gender) => Some(gender.label()),
            None => self.gender_code.as_deref(),
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
