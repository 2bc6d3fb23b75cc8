/// JSON document sent for one batch
use serde::Serialize;

use super::ReportError;
use crate::models::Reading;
use crate::utils::format_report_time;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload<'a> {
    pub device_address: &'a str,
    pub data: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub temperature: f32,
    pub humidity: f32,
    /// `YYYY-MM-DDTHH:MM:SSZ`
    pub time: String,
}

impl<'a> ReportPayload<'a> {
    /// One entry per reading, in capture order
    pub fn new(device_address: &'a str, readings: &[Reading]) -> Result<Self, ReportError> {
        let data = readings
            .iter()
            .map(|reading| -> Result<ReportEntry, ReportError> {
                Ok(ReportEntry {
                    temperature: reading.temperature,
                    humidity: reading.humidity,
                    time: format_report_time(&reading.timestamp)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            device_address,
            data,
        })
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string(self)?)
    }
}
